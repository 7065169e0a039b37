use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use crossbeam::channel::{Sender, bounded};
use noteplay::{Host, Note, Player, load_song};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Host that just logs each delivered note, with one fixed listener at the
/// origin. Stands in for a real sound-emitting environment.
struct ConsoleHost {
    done: Sender<()>,
}

impl Host for ConsoleHost {
    type Listener = String;

    fn position(&self, _listener: &String) -> Option<[f32; 3]> {
        Some([0.0, 0.0, 0.0])
    }

    fn play_note(&self, listener: &String, _position: [f32; 3], note: Note) {
        info!(
            %listener,
            instrument = ?note.instrument,
            pitch = note.pitch,
            velocity = note.velocity,
            panning = note.panning,
            "note"
        );
    }

    fn song_finished(&self, listener: &String) {
        info!(%listener, "song finished");
        let _ = self.done.try_send(());
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(dir), Some(name)) = (args.next(), args.next()) else {
        eprintln!("usage: noteplay <song-dir> <song-name>");
        process::exit(1);
    };

    let song = match load_song(&PathBuf::from(dir), &name) {
        Ok(song) => Arc::new(song),
        Err(e) => {
            eprintln!("failed to load {name}: {e}");
            process::exit(1);
        }
    };
    info!(
        title = song.title.as_deref().unwrap_or("untitled"),
        length = song.length,
        tempo = song.tempo,
        seconds = song.duration,
        "playing"
    );

    let (done_tx, done_rx) = bounded(1);
    let player = Player::new(Arc::new(ConsoleHost { done: done_tx }));
    player.play("console".to_string(), song);

    let _ = done_rx.recv();
}
