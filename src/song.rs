use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fallback tempo when a song declares none, matching the host's server tick rate.
pub const DEFAULT_TICKS_PER_SECOND: f32 = 20.0;

/// A single sound trigger at an absolute tick since song start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub tick: u32,
    /// Authoring lane; kept for fidelity, never used for audio decisions.
    pub layer: u32,
    pub instrument: u8,
    /// Absolute key in the source format's numbering. 0 means "no note" and
    /// never appears in a normalized song.
    pub key: u8,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default = "default_panning")]
    pub panning: u8,
    /// Fine pitch offset in fractional semitones.
    #[serde(default)]
    pub pitch: i16,
}

fn default_velocity() -> u8 {
    100
}

fn default_panning() -> u8 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Ticks per second.
    pub tempo: f32,
    /// Total length in ticks.
    #[serde(default)]
    pub length: u32,
    pub notes: Vec<NoteEvent>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Derived length in seconds; informational only.
    #[serde(default)]
    pub duration: f32,
}

impl Song {
    /// Normalizes a freshly constructed song: drops placeholder notes
    /// (`key == 0`), infers a missing length from the last note and
    /// recomputes the duration.
    pub fn normalize(&mut self) {
        self.notes.retain(|n| n.key != 0);
        if self.length == 0 {
            self.length = self.notes.iter().map(|n| n.tick).max().unwrap_or(0);
        }
        self.duration = if self.tempo > 0.0 {
            self.length as f32 / self.tempo
        } else {
            0.0
        };
    }

    /// Wall-clock duration of one tick at this song's tempo.
    pub fn tick_duration(&self) -> Duration {
        if self.tempo > 0.0 {
            // A degenerate hand-written tempo can push 1/tempo past what a
            // Duration can hold; treat it like a missing tempo.
            if let Ok(duration) = Duration::try_from_secs_f32(1.0 / self.tempo) {
                return duration;
            }
        }
        Duration::from_secs_f32(1.0 / DEFAULT_TICKS_PER_SECOND)
    }
}
