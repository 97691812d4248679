//! The one-line toggle pointer file naming the active slot.
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::layout::Slot;

/// Slot assumed when the pointer is missing or unreadable.
pub const DEFAULT_SLOT: Slot = Slot::B;

/// Parses the pointer contents. Anything other than a case-insensitive
/// `A` or `B` (surrounding whitespace ignored) is rejected.
pub fn parse_slot(contents: &str) -> Option<Slot> {
    match contents.trim() {
        s if s.eq_ignore_ascii_case("a") => Some(Slot::A),
        s if s.eq_ignore_ascii_case("b") => Some(Slot::B),
        _ => None,
    }
}

/// Reads the pointer without ever writing it. Missing, empty and corrupt
/// pointers all resolve to [`DEFAULT_SLOT`].
pub fn read_pointer(path: &Path) -> Slot {
    match fs::read_to_string(path) {
        Ok(contents) => parse_slot(&contents).unwrap_or_else(|| {
            warn!(path = %path.display(), "unrecognized toggle pointer, assuming {DEFAULT_SLOT}");
            DEFAULT_SLOT
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "toggle pointer missing, assuming {DEFAULT_SLOT}");
            DEFAULT_SLOT
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "toggle pointer unreadable, assuming {DEFAULT_SLOT}");
            DEFAULT_SLOT
        }
    }
}

/// Like [`read_pointer`] but reports whether the file held a valid value.
pub fn try_read_pointer(path: &Path) -> Option<Slot> {
    fs::read_to_string(path).ok().and_then(|c| parse_slot(&c))
}

/// Replaces the pointer atomically: the value goes to a sibling temp file
/// which is synced and renamed over the pointer, so concurrent readers see
/// either the old or the new value.
pub fn write_pointer(path: &Path, slot: Slot) -> io::Result<()> {
    let tmp_path = path.with_extension("txt.tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(slot.as_str().as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        if let Err(e) = sync_dir(parent) {
            warn!(dir = %parent.display(), error = %e, "could not sync pointer directory");
        }
    }
    debug!(path = %path.display(), %slot, "toggle pointer written");
    Ok(())
}

/// Makes a rename inside `dir` durable.
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
