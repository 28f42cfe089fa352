//! Output path handling, atomic writes and progress display.

use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use bcdecrypt_core::Progress;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Number of cells in the progress bar; one cell per 5%.
const PROGRESS_CELLS: u8 = 20;

/// Default output path: the input with its last extension removed.
///
/// Returns `None` when the input has no extension to strip.
pub fn default_output_path(input: &Path) -> Option<PathBuf> {
    input.extension()?;
    Some(input.with_extension(""))
}

/// Log a warning when `path` does not end in `.{expected}`.
pub fn warn_on_extension_mismatch(path: &Path, expected: &str) {
    if path.extension() != Some(OsStr::new(expected)) {
        warn!(
            "'{}' does not have the expected '.{expected}' extension",
            path.display()
        );
    }
}

/// Write `data` to `target` through a temporary file in the same directory.
///
/// The target only appears once every byte is on disk. Without `overwrite`,
/// an existing target is left untouched and `AlreadyExists` is returned.
pub fn write_atomic(target: &Path, data: &[u8], overwrite: bool) -> io::Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    debug!(tmp = %tmp.path().display(), "Plaintext staged");

    let persisted = if overwrite {
        tmp.persist(target)
    } else {
        tmp.persist_noclobber(target)
    };
    persisted.map(|_| ()).map_err(|e| e.error)
}

/// Prints a progress line to stderr each time another 5% is completed.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    last_cell: AtomicU8,
}

impl ProgressPrinter {
    pub fn report(&self, progress: Progress) {
        let cell = progress.percent() / 5;
        // Block callbacks may arrive out of order from worker threads.
        let previous = self.last_cell.fetch_max(cell, Ordering::Relaxed);
        if cell > previous {
            eprintln!("{}", render(cell, progress));
        }
    }
}

fn render(cell: u8, progress: Progress) -> String {
    let cell = cell.min(PROGRESS_CELLS);
    format!(
        "Progress: [{}{}] ({} / {} bytes)",
        "#".repeat(usize::from(cell)),
        " ".repeat(usize::from(PROGRESS_CELLS - cell)),
        progress.bytes_processed,
        progress.total_bytes
    )
}
