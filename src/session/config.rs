use std::time::Duration;

use crate::audio::AudioSource;
use crate::transport::TransportConfig;

/// Configuration for one visit session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server-assigned session identifier
    pub session_id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,

    /// REST backend base URL (https)
    pub base_url: String,

    /// Where audio comes from; the microphone in production
    pub audio_source: AudioSource,

    /// Sample rate for the wire format (the backend expects 16kHz)
    pub sample_rate: u32,
    /// Number of audio channels (the wire format is mono)
    pub channels: u16,
    /// Samples per outbound frame
    pub frame_samples: usize,

    /// Application heartbeat interval
    pub heartbeat_interval: Duration,
    /// Backoff before the single reconnect attempt
    pub reconnect_delay: Duration,
    /// Delay before restarting capture after a device hiccup
    pub capture_restart_delay: Duration,
}

impl SessionConfig {
    pub fn new(session_id: i64, doctor_id: i64, patient_id: i64, base_url: &str) -> Self {
        Self {
            session_id,
            doctor_id,
            patient_id,
            base_url: base_url.to_string(),
            audio_source: AudioSource::Microphone,
            sample_rate: 16000,
            channels: 1,
            frame_samples: 320,
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            capture_restart_delay: Duration::from_secs(2),
        }
    }

    /// Socket base derived from the REST base by scheme substitution
    /// (https -> wss, http -> ws).
    pub fn socket_base(&self) -> String {
        if let Some(rest) = self.base_url.strip_prefix("https") {
            format!("wss{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http") {
            format!("ws{}", rest)
        } else {
            self.base_url.clone()
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            socket_base: self.socket_base(),
            session_id: self.session_id,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            heartbeat_interval: self.heartbeat_interval,
            reconnect_delay: self.reconnect_delay,
        }
    }

    pub fn capture_config(&self) -> crate::audio::CaptureConfig {
        crate::audio::CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_samples: self.frame_samples,
            ..crate::audio::CaptureConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_base_swaps_scheme() {
        let config = SessionConfig::new(1, 2, 3, "https://backend.example.com");
        assert_eq!(config.socket_base(), "wss://backend.example.com");

        let config = SessionConfig::new(1, 2, 3, "http://localhost:8080");
        assert_eq!(config.socket_base(), "ws://localhost:8080");
    }
}
