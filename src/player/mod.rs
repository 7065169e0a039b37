//! Tick-scheduled, cancellable song playback.
//!
//! Each `play` call runs one background thread that walks the song's ticks in
//! order, sleeping out the gaps between occupied ticks and delivering every
//! note through the [`Host`] seam. Cancellation is cooperative: the playback
//! thread polls a single-slot signal at each tick boundary and its gap sleeps
//! wake early when the signal arrives.

mod registry;

pub use registry::{SessionId, SessionRegistry};

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use tracing::{debug, trace};

use crate::format::{LoadError, load_song};
use crate::instrument::{Instrument, KEY_PITCH_BASE};
use crate::song::{NoteEvent, Song};

/// One sound trigger, already mapped onto the host's palette and pitch scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub instrument: Instrument,
    /// Key relative to the host's reference pitch.
    pub pitch: i16,
    /// Loudness hint; hosts without volume support may ignore it.
    pub velocity: u8,
    /// Stereo position hint, 100 is neutral.
    pub panning: u8,
}

/// The environment that owns listeners and actually produces sound. The
/// player never touches listener internals; it resolves a position and hands
/// over a mapped note, both best-effort.
pub trait Host: Send + Sync + 'static {
    /// Opaque stable listener handle, used only as a map key.
    type Listener: Clone + Eq + Hash + Send + Sync + 'static;

    /// Current position of the listener, or `None` once they are gone.
    fn position(&self, listener: &Self::Listener) -> Option<[f32; 3]>;

    /// Delivers a single note at a position. Failures stay inside the host;
    /// a dropped note never aborts the rest of the schedule.
    fn play_note(&self, listener: &Self::Listener, position: [f32; 3], note: Note);

    /// Called once when a song runs to completion. Not called on stop or
    /// preemption.
    fn song_finished(&self, listener: &Self::Listener);
}

pub struct Player<H: Host> {
    host: Arc<H>,
    registry: Arc<SessionRegistry<H::Listener>>,
    pitch_base: i16,
}

impl<H: Host> Player<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            registry: Arc::new(SessionRegistry::new()),
            pitch_base: KEY_PITCH_BASE,
        }
    }

    /// Overrides the host reference pitch used for key mapping.
    pub fn with_pitch_base(mut self, pitch_base: i16) -> Self {
        self.pitch_base = pitch_base;
        self
    }

    /// Starts asynchronous playback of `song` for `listener`. A song already
    /// playing for this listener is preempted, not queued.
    pub fn play(&self, listener: H::Listener, song: Arc<Song>) {
        let (cancel_tx, cancel_rx) = bounded(1);
        let session = self.registry.register(listener.clone(), cancel_tx);
        debug!(
            session,
            length = song.length,
            notes = song.notes.len(),
            tempo = song.tempo,
            "starting playback"
        );

        let host = Arc::clone(&self.host);
        let registry = Arc::clone(&self.registry);
        let pitch_base = self.pitch_base;
        thread::spawn(move || {
            if run_session(host.as_ref(), &listener, &song, &cancel_rx, pitch_base) {
                debug!(session, "playback finished");
                host.song_finished(&listener);
            } else {
                debug!(session, "playback cancelled");
            }
            registry.remove_if(&listener, session);
        });
    }

    /// Loads a song by name and starts playback: the one-call path for a
    /// command layer. Load failures are returned to the caller and leave any
    /// current playback for this listener untouched.
    pub fn play_file(&self, listener: H::Listener, dir: &Path, name: &str) -> Result<(), LoadError> {
        let song = load_song(dir, name)?;
        self.play(listener, Arc::new(song));
        Ok(())
    }

    /// Requests cancellation of the listener's playback. Returns whether a
    /// session was actually active; never errors.
    pub fn stop(&self, listener: &H::Listener) -> bool {
        self.registry.stop(listener)
    }

    pub fn is_playing(&self, listener: &H::Listener) -> bool {
        self.registry.contains(listener)
    }
}

/// Runs one playback session to its end. Returns `true` when the song
/// completed naturally, `false` when the cancellation signal cut it short.
fn run_session<H: Host>(
    host: &H,
    listener: &H::Listener,
    song: &Song,
    cancel: &Receiver<()>,
    pitch_base: i16,
) -> bool {
    let tick_duration = song.tick_duration();

    // Group events by tick, preserving decode order within each tick.
    let mut by_tick: HashMap<u32, Vec<&NoteEvent>> = HashMap::new();
    for note in &song.notes {
        by_tick.entry(note.tick).or_default().push(note);
    }
    let mut ticks: Vec<u32> = by_tick.keys().copied().filter(|&t| t <= song.length).collect();
    ticks.sort_unstable();

    let mut previous = 0u32;
    for &tick in &ticks {
        // A disconnected channel means the registry itself is gone; give up
        // the same way a signal would end us.
        if !matches!(cancel.try_recv(), Err(TryRecvError::Empty)) {
            return false;
        }
        if tick > previous {
            // One accumulated wait for the whole silent gap. Waiting on the
            // cancellation slot means a stop request wakes us immediately.
            match cancel.recv_timeout(tick_duration.saturating_mul(tick - previous)) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => return false,
            }
            previous = tick;
        }
        for note in &by_tick[&tick] {
            let Some(position) = host.position(listener) else {
                // Listener gone; drop this event and keep the schedule alive.
                continue;
            };
            trace!(tick, layer = note.layer, key = note.key, "note");
            host.play_note(listener, position, Note {
                instrument: Instrument::from_index(note.instrument),
                pitch: note.key as i16 - pitch_base,
                velocity: note.velocity,
                panning: note.panning,
            });
        }
    }

    // Hold through any trailing silence so the song keeps its declared length.
    if song.length > previous {
        match cancel.recv_timeout(tick_duration.saturating_mul(song.length - previous)) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => return false,
        }
    }
    true
}
