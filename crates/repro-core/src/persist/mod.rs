//! Atomic file persistence.
//!
//! All provenance documents and published files are written with the same
//! protocol: write to a `NamedTempFile` in the destination directory, sync,
//! then rename over the final path. A crash mid-write leaves either the old
//! file or the new one, never a torn document.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Atomically replace `path` with `bytes`, creating parent directories.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let mut file = temp.as_file();
    file.write_all(bytes)?;
    file.sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Atomically copy `src` over `dst`, creating parent directories.
///
/// The copy lands in a temp file next to `dst` first, so a failure part way
/// through never leaves a truncated destination.
pub(crate) fn atomic_copy(src: &Path, dst: &Path) -> std::io::Result<()> {
    let parent = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut reader = fs::File::open(src)?;
    let temp = NamedTempFile::new_in(parent)?;
    let mut file = temp.as_file();
    std::io::copy(&mut reader, &mut file)?;
    file.sync_all()?;
    temp.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested/deep/doc.yml");

        atomic_write(&path, b"first").expect("write");
        assert_eq!(fs::read(&path).expect("read"), b"first");

        atomic_write(&path, b"second").expect("write");
        assert_eq!(fs::read(&path).expect("read"), b"second");
    }

    #[test]
    fn atomic_copy_round_trips_content() {
        let dir = TempDir::new().expect("temp dir");
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("out/dst.bin");
        fs::write(&src, b"payload").expect("write");

        atomic_copy(&src, &dst).expect("copy");
        assert_eq!(fs::read(&dst).expect("read"), b"payload");
    }
}
