//! Operating system and CPU architecture identifiers.
//!
//! Release assets use Go-style naming (`darwin`, `amd64`), while Rust and
//! vendors use other spellings (`macos`, `x86_64`, `aarch64`). Parsing accepts
//! all of them; display always uses the release-asset spelling.
//!
//! # Example
//!
//! ```
//! use tap_schema::{Arch, Os, Platform};
//!
//! let p: Platform = "linux/x86_64".parse().unwrap();
//! assert_eq!(p, Platform::new(Os::Linux, Arch::Amd64));
//! assert_eq!(p.asset_suffix(), "linux_amd64");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing platform identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The operating system name is not one of the known spellings.
    #[error("Unknown operating system: {0}")]
    UnknownOs(String),

    /// The architecture name is not one of the known spellings.
    #[error("Unknown architecture: {0}")]
    UnknownArch(String),

    /// A combined platform string was not of the form `os/arch`.
    #[error("Invalid platform '{0}': expected <os>/<arch>")]
    Malformed(String),
}

/// Operating system a release artifact targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Apple macOS (`darwin` in release asset names).
    #[serde(alias = "macos", alias = "mac", alias = "osx")]
    Darwin,
    /// Linux-based operating systems.
    Linux,
    /// Microsoft Windows.
    Windows,
}

impl Os {
    /// Name used in release asset file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// File suffix executables carry on this operating system.
    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Darwin | Self::Linux => "",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" | "mac" | "osx" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            "windows" | "win" => Ok(Self::Windows),
            _ => Err(PlatformError::UnknownOs(s.to_string())),
        }
    }
}

/// CPU architecture a release artifact targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// Intel/AMD 64-bit (`x86_64`).
    #[serde(alias = "x86_64")]
    Amd64,
    /// ARM 64-bit (`aarch64`, Apple Silicon).
    #[serde(alias = "aarch64")]
    Arm64,
}

impl Arch {
    /// Name used in release asset file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Self::Amd64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(PlatformError::UnknownArch(s.to_string())),
        }
    }
}

/// An (operating system, architecture) pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Platform {
    /// Target operating system.
    pub os: Os,
    /// Target CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Build a platform from its parts.
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this process runs on.
    ///
    /// # Errors
    ///
    /// Returns an error when the host OS or architecture has no release
    /// artifacts (e.g. `freebsd` or `riscv64`).
    pub fn current() -> Result<Self, PlatformError> {
        Ok(Self {
            os: std::env::consts::OS.parse()?,
            arch: std::env::consts::ARCH.parse()?,
        })
    }

    /// Suffix used in release asset names, e.g. `linux_amd64`.
    pub fn asset_suffix(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl std::str::FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once(['/', '_', '-'])
            .ok_or_else(|| PlatformError::Malformed(s.to_string()))?;
        Ok(Self {
            os: os.parse()?,
            arch: arch.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_aliases_parse() {
        for alias in ["darwin", "macos", "MacOS", "osx", "mac"] {
            assert_eq!(alias.parse::<Os>().unwrap(), Os::Darwin);
        }
        assert_eq!("linux".parse::<Os>().unwrap(), Os::Linux);
        assert!(matches!(
            "plan9".parse::<Os>(),
            Err(PlatformError::UnknownOs(_))
        ));
    }

    #[test]
    fn arch_aliases_parse() {
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::Amd64);
        assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::Amd64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert!("riscv64".parse::<Arch>().is_err());
    }

    #[test]
    fn platform_display_and_parse() {
        let p = Platform::new(Os::Darwin, Arch::Arm64);
        assert_eq!(p.to_string(), "darwin/arm64");
        assert_eq!("darwin/arm64".parse::<Platform>().unwrap(), p);
        assert_eq!("macos_aarch64".parse::<Platform>().unwrap(), p);
        assert!(matches!(
            "darwin".parse::<Platform>(),
            Err(PlatformError::Malformed(_))
        ));
    }

    #[test]
    fn asset_suffix_uses_release_spelling() {
        let p: Platform = "linux/x86_64".parse().unwrap();
        assert_eq!(p.asset_suffix(), "linux_amd64");
    }

    #[test]
    fn executable_suffix_only_on_windows() {
        assert_eq!(Os::Windows.executable_suffix(), ".exe");
        assert_eq!(Os::Linux.executable_suffix(), "");
        assert_eq!(Os::Darwin.executable_suffix(), "");
    }

    #[test]
    fn current_platform_matches_build_target() {
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(
            Platform::current().unwrap(),
            Platform::new(Os::Linux, Arch::Amd64)
        );

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert_eq!(
            Platform::current().unwrap(),
            Platform::new(Os::Darwin, Arch::Arm64)
        );
    }
}
