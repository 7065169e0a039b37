use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::format::{LoadError, nbs};
use crate::song::Song;

/// Loads a song by name from `dir`, trying the binary `.nbs` form first and
/// the structured `.ron` form second. A trailing extension on `name` is
/// ignored so callers can pass either `"song"` or `"song.nbs"`.
pub fn load_song(dir: &Path, name: &str) -> Result<Song, LoadError> {
    let base = name
        .strip_suffix(".ron")
        .or_else(|| name.strip_suffix(".nbs"))
        .unwrap_or(name);

    let nbs_path = dir.join(format!("{base}.nbs"));
    if nbs_path.is_file() {
        debug!(path = %nbs_path.display(), "loading binary song");
        let file = File::open(&nbs_path)?;
        return nbs::decode(BufReader::new(file));
    }

    let ron_path = dir.join(format!("{base}.ron"));
    if ron_path.is_file() {
        debug!(path = %ron_path.display(), "loading structured song");
        let text = fs::read_to_string(&ron_path)?;
        let mut song: Song =
            ron::from_str(&text).map_err(|e| LoadError::MalformedStructured(e.to_string()))?;
        // Hand-written files get the same cleanup as decoded ones.
        song.normalize();
        return Ok(song);
    }

    Err(LoadError::NotFound(name.to_string()))
}
