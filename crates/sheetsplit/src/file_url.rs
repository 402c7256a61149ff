//! Local paths as the `file://` URLs the office process expects.

use std::io;
use std::path::{Path, PathBuf};

use url::Url;

/// `path` resolved against the current directory.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Absolute, percent-encoded `file://` URL for `path`.
pub fn file_url(path: &Path) -> io::Result<Url> {
    let abs = absolute(path)?;
    Url::from_file_path(&abs).map_err(|()| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} cannot be expressed as a file URL", abs.display()),
        )
    })
}
