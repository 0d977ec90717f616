// Tests for the transcript assembler: fold order, the status-replacement
// rule, and error signalling.

use visit_scribe::transcript::{
    EntryKind, FoldOutcome, Provenance, Speaker, TranscriptAssembler,
};
use visit_scribe::transport::{parse_frame, Inbound, ServerEvent};

fn text(raw: &str) -> Inbound {
    parse_frame(raw).expect("non-empty frame")
}

fn turn_final(speaker: &str, line: &str) -> Inbound {
    Inbound::Event(ServerEvent::TurnFinal {
        speaker: Some(speaker.to_string()),
        text: line.to_string(),
        t0: None,
        t1: None,
        turn_id: None,
    })
}

#[test]
fn status_noise_is_replaced_then_superseded_by_speech() {
    let mut assembler = TranscriptAssembler::new(1);

    assert_eq!(
        assembler.fold(text("buffering audio...")),
        FoldOutcome::Appended
    );
    assert_eq!(assembler.entries().len(), 1);
    assert_eq!(assembler.entries()[0].kind, EntryKind::Status);

    assert_eq!(
        assembler.fold(text("transcribing...")),
        FoldOutcome::StatusReplaced
    );
    assert_eq!(assembler.entries().len(), 1);
    assert_eq!(assembler.entries()[0].text, "transcribing...");

    assert_eq!(
        assembler.fold(text("Hello, how are you?")),
        FoldOutcome::Appended
    );

    // Only the spoken line survives.
    assert_eq!(assembler.entries().len(), 1);
    assert_eq!(assembler.entries()[0].text, "Hello, how are you?");
    assert_eq!(assembler.entries()[0].kind, EntryKind::Utterance);
}

#[test]
fn at_most_one_status_entry_at_any_time() {
    let mut assembler = TranscriptAssembler::new(1);

    assembler.fold(turn_final("Doctor", "How can I help?"));
    for status in ["buffering 1", "buffering 2", "buffering 3"] {
        assembler.fold(text(status));
        let count = assembler
            .entries()
            .iter()
            .filter(|e| e.kind == EntryKind::Status)
            .count();
        assert_eq!(count, 1);
        assert_eq!(assembler.entries().last().unwrap().text, status);
    }
}

#[test]
fn error_text_raises_signal_without_an_entry() {
    let mut assembler = TranscriptAssembler::new(1);

    let outcome = assembler.fold(text("error: diarization failed"));
    assert_eq!(
        outcome,
        FoldOutcome::ErrorRaised("error: diarization failed".to_string())
    );
    assert!(assembler.entries().is_empty());
}

#[test]
fn ambiguous_error_and_status_text_is_an_error() {
    let mut assembler = TranscriptAssembler::new(1);

    let outcome = assembler.fold(text("error while processing audio"));
    assert!(matches!(outcome, FoldOutcome::ErrorRaised(_)));
    assert!(assembler.entries().is_empty());
}

#[test]
fn structured_error_raises_signal_without_an_entry() {
    let mut assembler = TranscriptAssembler::new(1);

    let outcome = assembler.fold(Inbound::Event(ServerEvent::Error {
        text: "session expired".to_string(),
    }));
    assert_eq!(outcome, FoldOutcome::ErrorRaised("session expired".to_string()));
    assert!(assembler.entries().is_empty());
}

#[test]
fn turn_final_appends_backend_entries_in_arrival_order() {
    let mut assembler = TranscriptAssembler::new(1);

    assembler.fold(turn_final("Doctor", "How can I help?"));
    assembler.fold(turn_final("Patient", "My back hurts."));
    assembler.fold(turn_final("Doctor", "How long has this been going on?"));

    let entries = assembler.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].speaker, Speaker::Doctor);
    assert_eq!(entries[1].speaker, Speaker::Patient);
    assert_eq!(entries[2].text, "How long has this been going on?");
    assert!(entries.iter().all(|e| e.provenance == Provenance::Backend));
}

#[test]
fn unknown_speaker_label_is_preserved_as_unknown() {
    let mut assembler = TranscriptAssembler::new(1);

    assembler.fold(turn_final("Narrator", "Meanwhile..."));
    assert_eq!(assembler.entries()[0].speaker, Speaker::Unknown);
}

#[test]
fn turn_update_is_interim_only() {
    let mut assembler = TranscriptAssembler::new(1);

    let outcome = assembler.fold(Inbound::Event(ServerEvent::TurnUpdate {
        speaker: Some("Patient".to_string()),
        text: "My ba".to_string(),
        turn_id: Some(4),
    }));

    assert_eq!(outcome, FoldOutcome::InterimUpdated);
    assert!(assembler.entries().is_empty());
    assert_eq!(assembler.interim().unwrap().text, "My ba");

    // The finalized turn retires the interim line.
    assembler.fold(turn_final("Patient", "My back hurts."));
    assert!(assembler.interim().is_none());
    assert_eq!(assembler.entries().len(), 1);
}

#[test]
fn structured_status_updates_ambient_state_without_an_entry() {
    let mut assembler = TranscriptAssembler::new(1);

    let outcome = assembler.fold(Inbound::Event(ServerEvent::Status {
        text: "diarizing speakers".to_string(),
    }));

    assert_eq!(outcome, FoldOutcome::AmbientStatus);
    assert!(assembler.entries().is_empty());
    assert_eq!(assembler.status(), Some("diarizing speakers"));
}

#[test]
fn rebinding_to_a_different_session_clears_the_log() {
    let mut assembler = TranscriptAssembler::new(1);
    assembler.fold(turn_final("Doctor", "How can I help?"));

    assembler.reset_for_session(2);
    assert!(assembler.entries().is_empty());
    assert_eq!(assembler.session_id(), 2);
}

#[test]
fn reconnecting_to_the_same_session_keeps_the_log() {
    let mut assembler = TranscriptAssembler::new(1);
    assembler.fold(turn_final("Doctor", "How can I help?"));

    assembler.reset_for_session(1);
    assert_eq!(assembler.entries().len(), 1);
}

#[test]
fn explicit_clear_wipes_everything() {
    let mut assembler = TranscriptAssembler::new(1);
    assembler.fold(turn_final("Doctor", "How can I help?"));
    assembler.fold(text("buffering..."));
    assembler.fold(Inbound::Event(ServerEvent::Status {
        text: "working".to_string(),
    }));

    assembler.clear();
    assert!(assembler.entries().is_empty());
    assert!(assembler.interim().is_none());
    assert!(assembler.status().is_none());
}
