use std::{io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use tokio::{
    fs::{self, File},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

/// Reads a text file line by line. A missing file is reported as `None` so callers can decide
/// whether absence means "empty" or "not found".
///
/// Files are edited by hand, so a line that is not valid UTF-8 does not fail the read. Invalid
/// bytes are replaced with U+FFFD and the line is kept in place.
pub async fn read_lines(path: &Path) -> Result<Option<Vec<String>>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {path:?}")),
    };

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut result = vec![];
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?;
        if read == 0 {
            break;
        }

        let line = buffer.strip_suffix(b"\n").unwrap_or(&buffer[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = match std::str::from_utf8(line) {
            Ok(v) => v.to_string(),
            Err(e) => {
                warn!(
                    "Line {} of {path:?} is not valid UTF-8: {e}",
                    result.len() + 1
                );
                String::from_utf8_lossy(line).into_owned()
            }
        };
        result.push(line);
    }
    Ok(Some(result))
}

/// Reads a whole text file. A missing file is `None`, like in [read_lines].
pub async fn read_text(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
    }
}

/// Replaces the content of `path` with `lines`, each terminated by a newline.
pub async fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let mut buffer = String::new();
    for line in lines {
        buffer.push_str(line.as_ref());
        buffer.push('\n');
    }
    debug!("Writing {} lines to {path:?}", lines.len());
    write_text(path, &buffer).await
}

/// Replaces the content of `path` with `content`.
///
/// Data is written into a sibling temporary file first and then renamed over the target, so a
/// crash in the middle of writing leaves the previous content intact. Parent directories are
/// created when missing.
pub async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {parent:?}"))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .await
        .with_context(|| format!("Failed to create {temp_path:?}"))?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to replace {path:?}"))?;
    Ok(())
}
