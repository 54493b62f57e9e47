/// Dataset archive download.
///
/// Fetches the embedded-articles archive over HTTP with a progress bar,
/// writing to a `.part` sibling first so an interrupted transfer never
/// looks like a finished one.
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::{DatasetError, Result};

/// Sibling path used while a download is in flight.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download `url` into `dest`, creating parent directories as needed.
pub fn download_file(url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    info!("Downloading {url}");
    let resp = reqwest::blocking::get(url).map_err(|source| DatasetError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DatasetError::BadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = resp.content_length().unwrap_or(0);
    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let part = partial_path(dest);
    let file = fs::File::create(&part)?;
    let mut writer = BufWriter::new(file);
    let mut reader = pb.wrap_read(resp);
    let written = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    drop(writer);
    pb.finish_and_clear();

    fs::rename(&part, dest)?;
    info!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}
