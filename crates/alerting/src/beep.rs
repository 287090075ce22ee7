//! Audible beep on a detached thread

use std::f32::consts::PI;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sink::{AlertSignal, AlertSink};
use crate::AlertError;

/// Beep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Tone frequency (Hz)
    pub frequency_hz: u32,
    /// Tone length (milliseconds)
    pub duration_ms: u64,
    /// Raw PCM player fed on stdin (`aplay`-compatible arguments)
    pub player: String,
    /// PCM sample rate
    pub sample_rate: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1000,
            duration_ms: 200,
            player: "aplay".to_string(),
            sample_rate: 22050,
        }
    }
}

/// Mono signed 16-bit little-endian sine tone
pub fn tone_samples(frequency_hz: u32, duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let count = (sample_rate as u64 * duration_ms / 1000) as usize;
    let amplitude = i16::MAX as f32 * 0.3;
    let step = 2.0 * PI * frequency_hz as f32 / sample_rate.max(1) as f32;

    let mut pcm = Vec::with_capacity(count * 2);
    for n in 0..count {
        let sample = ((n as f32 * step).sin() * amplitude) as i16;
        pcm.extend_from_slice(&sample.to_le_bytes());
    }
    pcm
}

/// Plays a short tone per signal without ever blocking the caller.
///
/// Each signal gets its own detached thread. If the player is missing or
/// fails, the thread rings the terminal bell instead.
#[derive(Debug, Clone, Default)]
pub struct BeepSink {
    config: AlertConfig,
}

impl BeepSink {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }
}

impl AlertSink for BeepSink {
    fn name(&self) -> &'static str {
        "beep"
    }

    fn signal(&self, signal: AlertSignal) {
        let config = self.config.clone();
        debug!(
            "Collision alert: {} at {:.1}m",
            signal.label, signal.distance_m
        );

        let spawned = thread::Builder::new()
            .name("collision-beep".to_string())
            .spawn(move || {
                if let Err(e) = play_tone(&config) {
                    debug!("Tone playback unavailable ({}), ringing terminal bell", e);
                    ring_bell();
                }
            });

        if let Err(e) = spawned {
            warn!("Could not start alert thread: {}", e);
            ring_bell();
        }
    }
}

fn play_tone(config: &AlertConfig) -> Result<(), AlertError> {
    let pcm = tone_samples(config.frequency_hz, config.duration_ms, config.sample_rate);
    let rate = config.sample_rate.to_string();

    let mut player = Command::new(&config.player)
        .args(["-q", "-r", rate.as_str(), "-f", "S16_LE", "-t", "raw", "-c", "1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = player.stdin.take() {
        stdin.write_all(&pcm)?;
    }

    let status = player.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(AlertError::Player(format!("{} exited with {}", config.player, status)))
    }
}

fn ring_bell() {
    let mut stderr = io::stderr();
    let _ = stderr.write_all(b"\x07");
    let _ = stderr.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_tone_length() {
        let pcm = tone_samples(1000, 200, 22050);
        assert_eq!(pcm.len(), 4410 * 2);
        assert_eq!(&pcm[..2], &[0, 0]);
    }

    #[test]
    fn test_tone_is_not_silent() {
        let pcm = tone_samples(1000, 10, 22050);
        let peak = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
            .max()
            .unwrap();
        assert!(peak > 5000);
    }

    #[test]
    fn test_missing_player_does_not_block_or_panic() {
        let sink = BeepSink::new(AlertConfig {
            player: "/nonexistent/fog-detect-player".to_string(),
            ..Default::default()
        });

        let start = Instant::now();
        for _ in 0..4 {
            sink.signal(AlertSignal {
                label: "truck".into(),
                distance_m: 3.2,
            });
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_play_tone_reports_missing_player() {
        let config = AlertConfig {
            player: "/nonexistent/fog-detect-player".to_string(),
            ..Default::default()
        };
        assert!(matches!(play_tone(&config), Err(AlertError::Io(_))));
    }
}
