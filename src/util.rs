use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Error bodies are clipped to this many bytes in messages.
const ERROR_BODY_BYTES: usize = 300;

/// Replace `dest` with `bytes` so readers only ever see a complete file.
///
/// The bytes land in a temp file beside `dest` (same filesystem) and are
/// synced before the rename.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid destination {}", dest.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("create temp file for {}", dest.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write temp file for {}", dest.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file for {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    sync_dir(parent)?;
    Ok(())
}

/// Flush a directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|handle| handle.sync_all())
        .with_context(|| format!("sync directory {}", dir.display()))
}

/// Directories cannot be opened as files here; the rename is still atomic.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: serde::Serialize>(dest: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    bytes.push(b'\n');
    write_atomic(dest, &bytes)
}

/// Read a JSON reply body, surfacing the body text when the status is not 2xx.
///
/// Agents must be built with `http_status_as_error(false)` so error bodies
/// reach this point.
pub fn read_json_reply<T: serde::de::DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
    url: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .with_context(|| format!("read reply from {url}"))?;
    if !status.is_success() {
        return Err(anyhow!(
            "{url} returned {status}: {}",
            truncate_string(body.trim(), ERROR_BODY_BYTES)
        ));
    }
    serde_json::from_str(&body).with_context(|| {
        format!(
            "parse reply from {url} as JSON; first 200 bytes: {}",
            truncate_string(&body, 200)
        )
    })
}

/// Clip `text` to at most `max_bytes` without splitting a character.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    let end = text
        .char_indices()
        .map(|(idx, ch)| idx + ch.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    text[..end].to_string()
}

/// Current epoch time in milliseconds for artifact timestamps.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
