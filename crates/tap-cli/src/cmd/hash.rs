//! Hash command

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tap_core::Sha256Digest;

/// Print the SHA-256 of each file, in the form formula revisions expect.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = compute_file_hash(file)
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{digest} {}", file.display());
    }
    Ok(())
}

/// Compute SHA256 hash of a file (streaming)
fn compute_file_hash(path: &Path) -> Result<Sha256Digest> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Sha256Digest::from_hasher(hasher))
}
