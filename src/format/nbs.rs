//! Decoder for the binary NBS note block song format.
//!
//! The file is a flat little-endian token stream read front to back: a fixed
//! header, a handful of editor metadata fields, then the note blocks as a
//! nested run-length encoding. The outer level stores tick jumps, the inner
//! level layer jumps, both as cumulative offsets from -1 with a zero sentinel
//! terminating each level.

use std::io::{self, Read};

use tracing::debug;

use crate::format::LoadError;
use crate::song::{NoteEvent, Song};

fn read_bytes<const N: usize>(r: &mut impl Read) -> Result<[u8; N], LoadError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => LoadError::TruncatedInput,
        _ => LoadError::Io(e),
    })?;
    Ok(buf)
}

fn read_u8(r: &mut impl Read) -> Result<u8, LoadError> {
    let buf: [u8; 1] = read_bytes(r)?;
    Ok(buf[0])
}

fn read_u16(r: &mut impl Read) -> Result<u16, LoadError> {
    Ok(u16::from_le_bytes(read_bytes(r)?))
}

fn read_i16(r: &mut impl Read) -> Result<i16, LoadError> {
    Ok(i16::from_le_bytes(read_bytes(r)?))
}

fn read_u32(r: &mut impl Read) -> Result<u32, LoadError> {
    Ok(u32::from_le_bytes(read_bytes(r)?))
}

/// Reads a u32-length-prefixed string, strips NUL padding and trims
/// surrounding whitespace.
fn read_string(r: &mut impl Read) -> Result<String, LoadError> {
    let length = read_u32(r)? as usize;
    if length == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; length];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => LoadError::TruncatedInput,
        _ => LoadError::Io(e),
    })?;
    let text: String = String::from_utf8_lossy(&buf)
        .chars()
        .filter(|&c| c != '\0')
        .collect();
    Ok(text.trim().to_string())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Decodes an NBS byte stream into a normalized [`Song`].
///
/// Unknown version numbers are tolerated; the only version-sensitive part is
/// the per-note velocity/panning/pitch extension introduced in version 4.
pub fn decode(mut r: impl Read) -> Result<Song, LoadError> {
    let declared_length = read_u16(&mut r)?;
    let version = read_u8(&mut r)?;
    let _vanilla_instrument_count = read_u8(&mut r)?;
    let _layer_count = read_u16(&mut r)?;
    let _custom_instrument_count = read_u16(&mut r)?;

    let title = read_string(&mut r)?;
    let author = read_string(&mut r)?;
    let _original_author = read_string(&mut r)?;
    let _description = read_string(&mut r)?;

    // Tempo is stored in centi-ticks-per-second.
    let tempo_raw = read_u16(&mut r)?;
    let tempo = tempo_raw as f32 / 100.0;

    // Editor state: auto-save flag, auto-save interval, time signature.
    for _ in 0..3 {
        read_u8(&mut r)?;
    }
    // Editor stats: minutes spent, left/right clicks, blocks added/removed.
    for _ in 0..5 {
        read_u32(&mut r)?;
    }
    let _import_name = read_string(&mut r)?;
    // Loop flag, max loop count, loop start tick.
    read_u8(&mut r)?;
    read_u8(&mut r)?;
    read_u16(&mut r)?;

    let mut notes = Vec::new();
    // 64-bit accumulators: the jumps are unbounded in number, so a narrower
    // sum can overflow on a crafted stream.
    let mut tick: i64 = -1;
    loop {
        let jump_ticks = read_u16(&mut r)?;
        if jump_ticks == 0 {
            break;
        }
        tick += i64::from(jump_ticks);

        let mut layer: i64 = -1;
        loop {
            let jump_layers = read_u16(&mut r)?;
            if jump_layers == 0 {
                break;
            }
            layer += i64::from(jump_layers);

            let instrument = read_u8(&mut r)?;
            let key = read_u8(&mut r)?;
            let (velocity, panning, pitch) = if version >= 4 {
                (read_u8(&mut r)?, read_u8(&mut r)?, read_i16(&mut r)?)
            } else {
                (100, 100, 0)
            };

            // key 0 is the format's empty-slot placeholder, not the lowest note.
            if key == 0 {
                continue;
            }
            notes.push(NoteEvent {
                tick: u32::try_from(tick).unwrap_or(u32::MAX),
                layer: u32::try_from(layer).unwrap_or(u32::MAX),
                instrument,
                key,
                velocity,
                panning,
                pitch,
            });
        }
    }

    let mut song = Song {
        tempo,
        length: declared_length as u32,
        notes,
        title: non_empty(title),
        author: non_empty(author),
        duration: 0.0,
    };
    song.normalize();

    debug!(
        version,
        length = song.length,
        notes = song.notes.len(),
        tempo = song.tempo,
        "decoded nbs song"
    );
    Ok(song)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_string(buf: &mut Vec<u8>, s: &str) {
        buf.extend((s.len() as u32).to_le_bytes());
        buf.extend(s.as_bytes());
    }

    /// Builds everything up to (and excluding) the note block stream.
    fn header(length: u16, version: u8, tempo_raw: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(length.to_le_bytes());
        buf.push(version);
        buf.push(16); // vanilla instrument count
        buf.extend(2u16.to_le_bytes()); // layer count
        buf.extend(0u16.to_le_bytes()); // custom instrument count
        push_string(&mut buf, "Test Song\0");
        push_string(&mut buf, " someone ");
        push_string(&mut buf, "");
        push_string(&mut buf, "");
        buf.extend(tempo_raw.to_le_bytes());
        buf.extend([0u8; 3]); // auto-save flag + interval, time signature
        buf.extend([0u8; 20]); // five u32 editor counters
        push_string(&mut buf, ""); // import name
        buf.extend([0u8; 2]); // loop flag, max loop count
        buf.extend(0u16.to_le_bytes()); // loop start tick
        buf
    }

    fn push_note_v3(buf: &mut Vec<u8>, instrument: u8, key: u8) {
        buf.push(instrument);
        buf.push(key);
    }

    #[test]
    fn delta_stream_accumulates_from_minus_one() {
        let mut buf = header(10, 3, 1000);
        buf.extend(3u16.to_le_bytes()); // tick -1 + 3 = 2
        buf.extend(1u16.to_le_bytes()); // layer -1 + 1 = 0
        push_note_v3(&mut buf, 0, 45);
        buf.extend(0u16.to_le_bytes()); // end of layers
        buf.extend(2u16.to_le_bytes()); // tick 2 + 2 = 4
        buf.extend(1u16.to_le_bytes());
        push_note_v3(&mut buf, 1, 50);
        buf.extend(0u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes()); // end of stream

        let song = decode(buf.as_slice()).unwrap();
        assert_eq!(song.notes.len(), 2);
        assert_eq!((song.notes[0].tick, song.notes[0].layer), (2, 0));
        assert_eq!((song.notes[1].tick, song.notes[1].layer), (4, 0));
        assert_eq!(song.notes[1].key, 50);
    }

    #[test]
    fn placeholder_keys_are_discarded_but_advance_the_layer() {
        let mut buf = header(10, 3, 1000);
        buf.extend(1u16.to_le_bytes());
        buf.extend(1u16.to_le_bytes()); // layer 0: placeholder
        push_note_v3(&mut buf, 0, 0);
        buf.extend(1u16.to_le_bytes()); // layer 1: real note
        push_note_v3(&mut buf, 0, 40);
        buf.extend(0u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        assert_eq!(song.notes.len(), 1);
        assert_eq!(song.notes[0].key, 40);
        assert_eq!(song.notes[0].layer, 1);
    }

    #[test]
    fn version_3_notes_use_default_extras() {
        let mut buf = header(1, 3, 1000);
        buf.extend(1u16.to_le_bytes());
        buf.extend(1u16.to_le_bytes());
        push_note_v3(&mut buf, 2, 33);
        buf.extend(0u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        let note = &song.notes[0];
        assert_eq!((note.velocity, note.panning, note.pitch), (100, 100, 0));
    }

    #[test]
    fn version_4_notes_read_extras_from_the_stream() {
        let mut buf = header(1, 4, 1000);
        buf.extend(1u16.to_le_bytes());
        buf.extend(1u16.to_le_bytes());
        buf.push(2); // instrument
        buf.push(33); // key
        buf.push(80); // velocity
        buf.push(150); // panning
        buf.extend((-25i16).to_le_bytes()); // fine pitch
        buf.extend(0u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        let note = &song.notes[0];
        assert_eq!((note.velocity, note.panning, note.pitch), (80, 150, -25));
    }

    #[test]
    fn zero_length_is_inferred_from_the_last_tick() {
        let mut buf = header(0, 3, 1000);
        for jump in [6u16, 2, 5] {
            // ticks 5, 7, 12
            buf.extend(jump.to_le_bytes());
            buf.extend(1u16.to_le_bytes());
            push_note_v3(&mut buf, 0, 45);
            buf.extend(0u16.to_le_bytes());
        }
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        assert_eq!(song.length, 12);
    }

    #[test]
    fn tempo_is_centi_ticks_per_second() {
        let mut buf = header(20, 3, 1050);
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        assert!((song.tempo - 10.5).abs() < 1e-6);
        assert!((song.duration - 20.0 / 10.5).abs() < 1e-4);
    }

    #[test]
    fn header_strings_are_cleaned_and_kept() {
        let mut buf = header(1, 3, 1000);
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        assert_eq!(song.title.as_deref(), Some("Test Song"));
        assert_eq!(song.author.as_deref(), Some("someone"));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let mut buf = header(10, 4, 1000);
        buf.extend(1u16.to_le_bytes());
        buf.extend(1u16.to_le_bytes());
        buf.push(0); // instrument, then the stream ends mid-note

        let err = decode(buf.as_slice()).unwrap_err();
        assert!(matches!(err, LoadError::TruncatedInput));

        let err = decode(&b"\x01"[..]).unwrap_err();
        assert!(matches!(err, LoadError::TruncatedInput));
    }

    #[test]
    fn huge_jump_totals_do_not_overflow() {
        // 40k maximum jumps sum past i32::MAX; only the last tick has a note.
        let jumps = 40_000u32;
        let mut buf = header(0, 3, 1000);
        for i in 0..jumps {
            buf.extend(u16::MAX.to_le_bytes());
            if i == jumps - 1 {
                buf.extend(1u16.to_le_bytes());
                push_note_v3(&mut buf, 0, 45);
            }
            buf.extend(0u16.to_le_bytes());
        }
        buf.extend(0u16.to_le_bytes());

        let song = decode(buf.as_slice()).unwrap();
        assert_eq!(song.notes.len(), 1);
        assert_eq!(song.notes[0].tick, jumps * u16::MAX as u32 - 1);
        assert_eq!(song.length, song.notes[0].tick);
    }

    #[test]
    fn decoding_is_deterministic() {
        let mut buf = header(0, 4, 2000);
        buf.extend(4u16.to_le_bytes());
        buf.extend(2u16.to_le_bytes());
        buf.extend([3, 52, 90, 110]);
        buf.extend(12i16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());

        let first = decode(buf.as_slice()).unwrap();
        let second = decode(buf.as_slice()).unwrap();
        assert_eq!(first, second);
    }
}
