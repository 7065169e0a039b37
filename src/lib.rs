//! Note block song loading and per-listener playback.

pub mod format;
pub mod instrument;
pub mod player;
pub mod song;

pub use format::{LoadError, decode, load_song};
pub use instrument::{Instrument, KEY_PITCH_BASE, PALETTE};
pub use player::{Host, Note, Player};
pub use song::{DEFAULT_TICKS_PER_SECOND, NoteEvent, Song};
