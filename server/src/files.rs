use anyhow::Result;
use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::fs;

const RANDOM_LEN: usize = 16;
const MAX_EXT_LEN: usize = 10;

/// Generate a fresh storage filename: `<unix millis>-<random>[.<ext>]`.
///
/// Only the extension is taken from `original_name`, and only when it is
/// short and ASCII alphanumeric, so the result never contains path
/// separators.
pub fn storage_filename(original_name: &str, now_millis: i64) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    match extension(original_name) {
        Some(ext) => format!("{now_millis}-{random}.{ext}"),
        None => format!("{now_millis}-{random}"),
    }
}

fn extension(original_name: &str) -> Option<String> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXT_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether `name` has the shape `storage_filename` produces.
pub fn is_storage_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
}

/// Determine the on-disk path for a storage filename.
pub fn file_path<P: AsRef<Path>>(base: P, name: &str) -> PathBuf {
    base.as_ref().join(name)
}

/// Write `data` under `name`, creating the directory when needed.
pub async fn save_file<P: AsRef<Path>>(base: P, name: &str, data: &Bytes) -> Result<PathBuf> {
    fs::create_dir_all(base.as_ref()).await?;
    let path = file_path(base, name);
    fs::write(&path, data).await?;
    Ok(path)
}

/// Remove files not listed in `keep` whose last modification is older than `grace`.
/// Returns the number of removed files.
pub async fn cleanup_orphans<P: AsRef<Path>>(
    base: P,
    keep: &HashSet<String>,
    grace: Duration,
) -> Result<usize> {
    let mut entries = match fs::read_dir(base.as_ref()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if keep.contains(&name) {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }
        fs::remove_file(entry.path()).await?;
        removed += 1;
    }
    Ok(removed)
}
