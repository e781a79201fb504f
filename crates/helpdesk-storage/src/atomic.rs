//! Atomic file replacement.

use std::io::{BufWriter, Write};
use std::path::Path;

use helpdesk_core::error::{HelpdeskError, Result};
use tempfile::NamedTempFile;

/// Write `path` by filling a temporary file in the same directory and
/// renaming it into place.
pub(crate) fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| HelpdeskError::Io(e.error))?;
    Ok(())
}
