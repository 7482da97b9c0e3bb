//! Crash-safe file replacement.
//!
//! Enrichment caches and trace outputs are rewritten in full at the end of a
//! run. Both go through the temp-file-then-rename pattern:
//!
//! 1. Data is written to `<path>.tmp` (extension appended, not replaced)
//! 2. The temporary file is flushed and synced
//! 3. The temporary file is renamed over the target path
//!
//! On POSIX systems a rename within one filesystem is atomic, so a crash at
//! any step leaves either the previous file or the new one, never a torn mix.
//! A failed write removes the temporary file on a best-effort basis.

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Atomically writes values to a JSONL file, one value per line.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, a
/// value fails to serialize, or the final rename fails. The target file is
/// left untouched in every failure case.
///
/// # Examples
///
/// ```no_run
/// use uplink_jsonl::write_jsonl_atomic;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rows = vec![serde_json::json!({"root_key": "MGTT-1", "upper_key": "ITPT-7"})];
/// write_jsonl_atomic("trace.jsonl", &rows).await?;
/// # Ok(())
/// # }
/// ```
pub async fn write_jsonl_atomic<T, I, P>(path: P, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    let result = async {
        let file = File::create(&temp_path).await?;
        let mut writer = JsonlWriter::new(file);
        writer.write_all(values).await?;
        writer.flush().await?;
        writer.into_inner().into_inner().sync_all().await?;
        Ok::<(), crate::Error>(())
    }
    .await;

    commit(path, &temp_path, result).await
}

/// Atomically writes one value as a pretty-printed JSON document.
///
/// Used for key/value cache files, which are small and meant to be readable.
///
/// # Errors
///
/// See [`write_jsonl_atomic`].
pub async fn write_json_atomic<T, P>(path: P, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    let result = async {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        let mut file = File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok::<(), crate::Error>(())
    }
    .await;

    commit(path, &temp_path, result).await
}

/// Renames the temp file into place, or removes it if writing failed.
async fn commit(path: &Path, temp_path: &Path, written: Result<()>) -> Result<()> {
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(temp_path, path).await {
        let _ = tokio::fs::remove_file(temp_path).await;
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), "replaced file atomically");
    Ok(())
}

/// Builds the temporary path by appending `.tmp` to the file name.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}
