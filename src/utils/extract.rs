//! Zip and gzip+tar extraction.
//!
//! Both extractors report the top-level folder of the *first* entry they
//! enumerate. The install step renames that folder, so entry order matters
//! and is taken as-is from the archive.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{ArchiveErrorKind as Kind, Error, Result};
use crate::utils::mirror::ArchiveKind;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn extract_archive(kind: ArchiveKind, archive_path: &Path, extract_dir: &Path) -> Result<Option<String>> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, extract_dir),
        ArchiveKind::Tgz => extract_tar_gz(archive_path, extract_dir),
    }
}

/// Top-level segment of an archive path, `npm-3.8.5/bin/npm` -> `npm-3.8.5`.
fn root_segment(name: &str) -> Option<String> {
    name.trim_start_matches("./")
        .split('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Keeps only normal components so entries cannot escape `extract_dir`.
fn enclosed(name: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::archive(Kind::WriteFailed, parent, e))?;
    }
    Ok(())
}

fn write_entry<R: Read>(reader: &mut R, out: &Path, mode: Option<u32>) -> Result<()> {
    create_parent(out)?;
    let mut file = File::create(out).map_err(|e| Error::archive(Kind::WriteFailed, out, e))?;
    io::copy(reader, &mut file).map_err(|e| Error::archive(Kind::CopyFailed, out, e))?;
    set_mode(out, mode);
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)) {
            debug!(path = %path.display(), error = %e, "could not apply archive mode");
        }
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) {}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<Option<String>> {
    let file = File::open(archive_path).map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;

    let mut root = None;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::archive(Kind::EntryOpenFailed, archive_path, e))?;
        let name = entry.name().to_string();
        if i == 0 {
            root = root_segment(&name);
        }

        let rel = enclosed(Path::new(&name))
            .ok_or_else(|| Error::archive(Kind::EntryOpenFailed, &name, "entry path leaves the archive root"))?;
        let outpath = extract_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| Error::archive(Kind::WriteFailed, &outpath, e))?;
        } else {
            let mode = entry.unix_mode();
            write_entry(&mut entry, &outpath, mode)?;
        }
    }

    debug!(entries = archive.len(), root = ?root, "zip extracted");
    Ok(root)
}

fn extract_tar_gz(archive_path: &Path, extract_dir: &Path) -> Result<Option<String>> {
    let mut file = File::open(archive_path).map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;

    let mut magic = [0u8; 2];
    file.read_exact(&mut magic)
        .map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;
    if magic != GZIP_MAGIC {
        return Err(Error::archive(Kind::OpenFailed, archive_path, "not a gzip stream"));
    }
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;

    let decompressed = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decompressed);
    let entries = archive
        .entries()
        .map_err(|e| Error::archive(Kind::OpenFailed, archive_path, e))?;

    let mut root = None;
    let mut count = 0usize;
    for (idx, entry) in entries.enumerate() {
        let mut entry = entry.map_err(|e| Error::archive(Kind::EntryOpenFailed, archive_path, e))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if idx == 0 {
            root = root_segment(&name);
        }
        count += 1;

        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() && !entry_type.is_dir() {
            debug!(%name, "skipping non-regular tar entry");
            continue;
        }

        let rel = enclosed(Path::new(&name))
            .ok_or_else(|| Error::archive(Kind::EntryOpenFailed, &name, "entry path leaves the archive root"))?;
        let outpath = extract_dir.join(rel);

        if entry_type.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| Error::archive(Kind::WriteFailed, &outpath, e))?;
        } else {
            let mode = entry.header().mode().ok();
            write_entry(&mut entry, &outpath, mode)?;
        }
    }

    debug!(entries = count, root = ?root, "tarball extracted");
    Ok(root)
}
