//! Emulator options

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Feed CPU cycles to the APU frame sequencer
    pub emulate_sound: bool,

    /// Frames per second the host should aim for
    pub preferred_frame_rate: u32,

    /// Audio output rate in Hz
    pub sample_rate: u32,

    /// How often the host should report the measured frame rate
    pub fps_interval_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            emulate_sound: false,
            preferred_frame_rate: 60,
            sample_rate: 44100,
            fps_interval_ms: 500,
        }
    }
}

impl Options {
    /// Host timer period between two frames
    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(1000 / self.preferred_frame_rate.max(1) as u64)
    }

    pub fn fps_interval(&self) -> Duration {
        Duration::from_millis(self.fps_interval_ms)
    }
}
