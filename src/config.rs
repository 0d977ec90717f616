use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub transport: TransportSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// REST backend base URL; the socket URL is derived from it
    pub backend_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_frame_samples")]
    pub frame_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            frame_samples: default_frame_samples(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_capture_restart_delay_ms")]
    pub capture_restart_delay_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            capture_restart_delay_ms: default_capture_restart_delay_ms(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_frame_samples() -> usize {
    320
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_capture_restart_delay_ms() -> u64 {
    2000
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build a session configuration for one visit's participants.
    pub fn session_config(&self, session_id: i64, doctor_id: i64, patient_id: i64) -> SessionConfig {
        let mut session =
            SessionConfig::new(session_id, doctor_id, patient_id, &self.service.backend_url);
        session.sample_rate = self.audio.sample_rate;
        session.channels = self.audio.channels;
        session.frame_samples = self.audio.frame_samples;
        session.heartbeat_interval = Duration::from_secs(self.transport.heartbeat_secs);
        session.reconnect_delay = Duration::from_secs(self.transport.reconnect_delay_secs);
        session.capture_restart_delay =
            Duration::from_millis(self.transport.capture_restart_delay_ms);
        session
    }
}
