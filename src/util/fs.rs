use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes `content` to `dst` via write-to-temp-then-rename so readers never
/// observe a partially written file.
///
/// The temp file lives next to `dst` (same filesystem, so the rename is
/// atomic on POSIX) and carries a time-derived suffix; it is created with
/// `create_new` so a pre-existing path is never followed.
pub fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let result = (|| {
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        temp_file.write_all(content)?;
        temp_file.sync_all()?;
        drop(temp_file);

        // On Windows, rename fails if destination exists, so remove it first
        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }

        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

/// [`atomic_write`] on the blocking thread pool, for use from async code.
pub async fn atomic_write_async(dst: PathBuf, content: Vec<u8>) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || atomic_write(&dst, &content))
        .await
        .map_err(std::io::Error::other)?
}
