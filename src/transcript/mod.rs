//! Transcript assembly
//!
//! A reducer over the unbounded inbound message stream. Structured events
//! and heuristically classified text fold into one ordered, displayable
//! conversation log; status noise replaces itself instead of accumulating.

mod assembler;

pub use assembler::{
    ConversationEntry, EntryKind, FoldOutcome, Provenance, Speaker, TranscriptAssembler,
    TranscriptSnapshot,
};
