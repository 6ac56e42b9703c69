use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Returns the tap home directory, or None if the user's home cannot be resolved.
pub fn try_tap_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("TAP_HOME") {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".tap"))
}

/// Returns the tap home directory (`~/.tap` or `$TAP_HOME`), falling back to
/// `./.tap` when no home directory exists (e.g. minimal containers).
pub fn tap_home() -> PathBuf {
    try_tap_home().unwrap_or_else(|| PathBuf::from(".tap"))
}

/// Default binary installation target: ~/.tap/bin
pub fn bin_path() -> PathBuf {
    tap_home().join("bin")
}

/// User formula overlay directory: ~/.tap/formula
pub fn formula_dir() -> PathBuf {
    tap_home().join("formula")
}

/// Optional settings file: ~/.tap/config.toml
pub fn config_path() -> PathBuf {
    tap_home().join("config.toml")
}

/// Advisory lock file guarding an install target.
pub fn lock_path_for(target: &Path) -> PathBuf {
    sibling_with_suffix(target, ".lock")
}

/// Backup slot for the binary being replaced by an install.
pub fn backup_path_for(target: &Path) -> PathBuf {
    sibling_with_suffix(target, ".tap-backup")
}

fn sibling_with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths_keep_directory() {
        let target = Path::new("/opt/tap/bin/netfetch");
        assert_eq!(
            lock_path_for(target),
            PathBuf::from("/opt/tap/bin/netfetch.lock")
        );
        assert_eq!(
            backup_path_for(target),
            PathBuf::from("/opt/tap/bin/netfetch.tap-backup")
        );
    }
}
