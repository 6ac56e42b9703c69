//! In-memory archive extraction
//!
//! Release archives are small, so they are decoded straight from the verified
//! download buffer. Only the selected executable leaves this module.

use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

use crate::types::ArtifactFormat;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid path in archive: {0}")]
    UnsafePath(String),

    #[error("No executable named '{binary_name}' in archive")]
    NoExecutable { binary_name: String },

    #[error("Archive holds several executables: {}", .0.join(", "))]
    MultipleExecutables(Vec<String>),
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        Self::Archive(err.to_string())
    }
}

/// A regular file read out of an archive.
#[derive(Debug, Clone)]
struct ArchiveFile {
    path: PathBuf,
    is_executable: bool,
    data: Vec<u8>,
}

impl ArchiveFile {
    fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Pull the one executable out of `bytes`.
///
/// A file named `binary_name` (or `binary_name.exe`) wins; without one, the
/// regular files carrying an executable mode bit are the candidates. Exactly
/// one candidate must remain.
///
/// # Errors
///
/// Fails on undecodable archives, entries escaping the archive root, and
/// zero or several candidates.
pub fn extract_executable(
    bytes: &[u8],
    format: ArtifactFormat,
    binary_name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let files = match format {
        ArtifactFormat::Binary => {
            if bytes.is_empty() {
                return Err(ExtractError::NoExecutable {
                    binary_name: binary_name.to_string(),
                });
            }
            return Ok(bytes.to_vec());
        }
        ArtifactFormat::TarGz => read_tar(flate2::read::GzDecoder::new(Cursor::new(bytes)))?,
        ArtifactFormat::Tar => read_tar(Cursor::new(bytes))?,
        ArtifactFormat::Zip => read_zip(bytes)?,
    };

    select_executable(files, binary_name)
}

fn select_executable(
    files: Vec<ArchiveFile>,
    binary_name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let exe_name = format!("{binary_name}.exe");
    let (named, rest): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| {
        f.file_name()
            .is_some_and(|n| n == binary_name || n == exe_name)
    });

    let mut candidates = if named.is_empty() {
        rest.into_iter().filter(|f| f.is_executable).collect()
    } else {
        named
    };

    match candidates.len() {
        0 => Err(ExtractError::NoExecutable {
            binary_name: binary_name.to_string(),
        }),
        1 => {
            let file = candidates.remove(0);
            tracing::debug!(path = %file.path.display(), size = file.data.len(), "selected executable");
            Ok(file.data)
        }
        _ => Err(ExtractError::MultipleExecutables(
            candidates
                .iter()
                .map(|f| f.path.display().to_string())
                .collect(),
        )),
    }
}

fn read_tar<R: Read>(reader: R) -> Result<Vec<ArchiveFile>, ExtractError> {
    let mut archive = tar::Archive::new(reader);
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        check_path(&path)?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let is_executable = entry.header().mode().is_ok_and(|m| m & 0o111 != 0);
        let declared = entry.size();
        let data = read_entry(&mut entry, declared, &path)?;

        files.push(ArchiveFile {
            path,
            is_executable,
            data,
        });
    }

    Ok(files)
}

fn read_zip(bytes: &[u8]) -> Result<Vec<ArchiveFile>, ExtractError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Archive(e.to_string()))?;
    let mut files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(path) = file.enclosed_name() else {
            return Err(ExtractError::UnsafePath(file.name().to_string()));
        };
        if file.is_dir() {
            continue;
        }

        let is_executable = file.unix_mode().is_some_and(|m| m & 0o111 != 0);
        let declared = file.size();
        let data = read_entry(&mut file, declared, &path)?;

        files.push(ArchiveFile {
            path,
            is_executable,
            data,
        });
    }

    Ok(files)
}

/// Read an entry whose header claims `declared` bytes. The header is not
/// trusted for allocation; a short entry is an archive error.
fn read_entry<R: Read>(
    reader: &mut R,
    declared: u64,
    path: &Path,
) -> Result<Vec<u8>, ExtractError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if data.len() as u64 != declared {
        return Err(ExtractError::Archive(format!(
            "{} is truncated: header declares {declared} bytes, found {}",
            path.display(),
            data.len()
        )));
    }
    Ok(data)
}

fn check_path(path: &Path) -> Result<(), ExtractError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        Err(ExtractError::UnsafePath(path.display().to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Build a gzipped tarball of `(path, mode, contents)` entries.
    pub(crate) fn tar_gz(entries: &[(&str, u32, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, mode, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn release_archive() -> Vec<u8> {
        tar_gz(&[
            ("LICENSE", 0o644, b"MIT"),
            ("README.md", 0o644, b"# netfetch"),
            ("netfetch", 0o755, b"\x7fELF binary"),
        ])
    }

    #[test]
    fn picks_named_binary_from_release_layout() {
        let exe = extract_executable(&release_archive(), ArtifactFormat::TarGz, "netfetch").unwrap();
        assert_eq!(exe, b"\x7fELF binary");
    }

    #[test]
    fn named_binary_wins_over_other_executables() {
        let archive = tar_gz(&[
            ("netfetch-1.0/install.sh", 0o755, b"#!/bin/sh"),
            ("netfetch-1.0/netfetch", 0o755, b"binary"),
        ]);
        let exe = extract_executable(&archive, ArtifactFormat::TarGz, "netfetch").unwrap();
        assert_eq!(exe, b"binary");
    }

    #[test]
    fn falls_back_to_single_executable() {
        let archive = tar_gz(&[
            ("README.md", 0o644, b"docs"),
            ("nf", 0o755, b"binary"),
        ]);
        let exe = extract_executable(&archive, ArtifactFormat::TarGz, "netfetch").unwrap();
        assert_eq!(exe, b"binary");
    }

    #[test]
    fn several_executables_are_ambiguous() {
        let archive = tar_gz(&[("a", 0o755, b"a"), ("b", 0o755, b"b")]);
        let err = extract_executable(&archive, ArtifactFormat::TarGz, "netfetch").unwrap_err();
        assert!(matches!(err, ExtractError::MultipleExecutables(ref p) if p.len() == 2));
    }

    #[test]
    fn archive_without_executable() {
        let archive = tar_gz(&[("README.md", 0o644, b"docs")]);
        let err = extract_executable(&archive, ArtifactFormat::TarGz, "netfetch").unwrap_err();
        assert!(matches!(err, ExtractError::NoExecutable { .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        let err =
            extract_executable(b"not an archive", ArtifactFormat::TarGz, "netfetch").unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[test]
    fn rejects_parent_dir_entries() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_old();
        let name = b"../netfetch";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(3);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, &b"bad"[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let err = extract_executable(&archive, ArtifactFormat::Tar, "netfetch").unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath(_)));
    }

    #[test]
    fn oversized_entry_header_is_malformed() {
        let mut header = tar::Header::new_gnu();
        header.set_path("netfetch").unwrap();
        header.set_size(1 << 40);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        let mut archive = header.as_bytes().to_vec();
        archive.extend_from_slice(&[0u8; 1024]);

        let err = extract_executable(&archive, ArtifactFormat::Tar, "netfetch").unwrap_err();
        assert!(matches!(err, ExtractError::Archive(ref msg) if msg.contains("truncated")));
    }

    #[test]
    fn zip_with_named_binary() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer.start_file("netfetch.exe", opts).unwrap();
        writer.write_all(b"MZ").unwrap();
        writer
            .start_file(
                "README.md",
                zip::write::SimpleFileOptions::default().unix_permissions(0o644),
            )
            .unwrap();
        writer.write_all(b"docs").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let exe = extract_executable(&archive, ArtifactFormat::Zip, "netfetch").unwrap();
        assert_eq!(exe, b"MZ");
    }

    #[test]
    fn bare_binary_passes_through() {
        let exe = extract_executable(b"binary", ArtifactFormat::Binary, "netfetch").unwrap();
        assert_eq!(exe, b"binary");
    }
}
