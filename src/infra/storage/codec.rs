//! JSON encoding of content files with atomic whole-file replacement.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;

use super::error::StoreError;

/// Reads and decodes `path`. `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| StoreError::corrupt(path, err))
}

/// Writes `value` to a temp file beside `path`, then renames it over `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|err| StoreError::io(path, err.into()))?;
        writer.flush().map_err(|err| StoreError::io(path, err))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|err| StoreError::io(path, err))?;
    temp.persist(path)
        .map_err(|err| StoreError::persist(path, err.error))?;
    Ok(())
}
