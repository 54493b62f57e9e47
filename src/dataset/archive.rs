use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use super::Result;
use super::download::partial_path;

/// Entries that zip tools on macOS add and that never hold data.
fn is_junk(name: &Path) -> bool {
    name.components()
        .next()
        .is_some_and(|c| c.as_os_str() == "__MACOSX")
}

/// Extract every file of the zip at `archive` into `dest_dir`.
///
/// Entry names that would escape `dest_dir` are skipped. Each entry is
/// written to a `.part` sibling and renamed once complete. Returns the paths
/// written, in archive order.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    info!("Extracting {} into {}", archive.display(), dest_dir.display());
    fs::create_dir_all(dest_dir)?;

    let file = fs::File::open(archive)?;
    let mut zip = ZipArchive::new(io::BufReader::new(file))?;
    let mut written = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(name) = entry.enclosed_name() else {
            debug!("Skipping unsafe entry {:?}", entry.name());
            continue;
        };
        if is_junk(&name) {
            continue;
        }

        let out = dest_dir.join(&name);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }

        // Only a fully written entry ever appears under its real name
        let part = partial_path(&out);
        let mut target = fs::File::create(&part)?;
        io::copy(&mut entry, &mut target)?;
        target.sync_all()?;
        drop(target);
        fs::rename(&part, &out)?;
        debug!("Extracted {}", out.display());
        written.push(out);
    }

    info!("Extracted {} file(s)", written.len());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        write_zip(
            &archive,
            &[
                ("articles.csv", "id,url\n1,https://a\n"),
                ("nested/readme.txt", "hi"),
            ],
        );

        let out_dir = dir.path().join("out");
        let written = extract_archive(&archive, &out_dir).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(out_dir.join("articles.csv")).unwrap(),
            "id,url\n1,https://a\n"
        );
        assert!(out_dir.join("nested/readme.txt").exists());
    }

    #[test]
    fn test_extract_skips_macos_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        write_zip(
            &archive,
            &[("articles.csv", "x"), ("__MACOSX/._articles.csv", "junk")],
        );

        let written = extract_archive(&archive, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("articles.csv")]);
        assert!(!dir.path().join("__MACOSX").exists());
    }

    #[test]
    fn test_extract_replaces_stale_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        write_zip(&archive, &[("articles.csv", "id,url\n1,a\n2,b\n")]);
        let out = dir.path().join("articles.csv");
        fs::write(partial_path(&out), "id,url\n1,a\n").unwrap();

        extract_archive(&archive, dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "id,url\n1,a\n2,b\n");
        assert!(!partial_path(&out).exists());
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bogus.zip");
        fs::write(&archive, "definitely not a zip").unwrap();
        assert!(extract_archive(&archive, dir.path()).is_err());
    }
}
