use serde::{Deserialize, Serialize};

/// The host's reference pitch index (F#3 on Bedrock note blocks). Output
/// pitch is the note key minus this base. Host-specific configuration, not
/// derived from the file format.
pub const KEY_PITCH_BASE: i16 = 33;

/// The fixed note block timbre palette, in file-format index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    Harp,
    BassDrum,
    Snare,
    Hat,
    Bass,
    Flute,
    Bell,
    Guitar,
    Chime,
    Xylophone,
    IronXylophone,
    CowBell,
    Didgeridoo,
    Bit,
    Banjo,
    Pling,
}

pub const PALETTE: [Instrument; 16] = [
    Instrument::Harp,
    Instrument::BassDrum,
    Instrument::Snare,
    Instrument::Hat,
    Instrument::Bass,
    Instrument::Flute,
    Instrument::Bell,
    Instrument::Guitar,
    Instrument::Chime,
    Instrument::Xylophone,
    Instrument::IronXylophone,
    Instrument::CowBell,
    Instrument::Didgeridoo,
    Instrument::Bit,
    Instrument::Banjo,
    Instrument::Pling,
];

impl Instrument {
    /// Maps a file-format instrument index to the palette. Out-of-range
    /// indices fall back to the first entry.
    pub fn from_index(index: u8) -> Self {
        PALETTE.get(index as usize).copied().unwrap_or(PALETTE[0])
    }
}
