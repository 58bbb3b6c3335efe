//! Platform identification: (OS, architecture) pairs and their target triples.
//!
//! The detected platform is derived once from `std::env::consts` and is the
//! key for every release table lookup. Users may override it with a triple or
//! an `os/arch` pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Os {
    MacOs,
    Linux,
    Windows,
    FreeBsd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    X86,
    Armv7,
}

impl Os {
    pub fn as_str(self) -> &'static str {
        match self {
            Os::MacOs => "macos",
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::FreeBsd => "freebsd",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" | "apple" => Some(Os::MacOs),
            "linux" => Some(Os::Linux),
            "windows" | "win" | "win32" | "win64" => Some(Os::Windows),
            "freebsd" => Some(Os::FreeBsd),
            _ => None,
        }
    }
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::X86 => "x86",
            Arch::Armv7 => "armv7",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Arch::X86_64),
            "aarch64" | "arm64" => Some(Arch::Aarch64),
            "x86" | "i686" | "i386" | "386" => Some(Arch::X86),
            "armv7" | "arm" | "armhf" | "armv7l" => Some(Arch::Armv7),
            _ => None,
        }
    }
}

/// Canonical (OS, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

/// Every pair with a known target triple.
pub const SUPPORTED: &[Platform] = &[
    Platform::new(Os::MacOs, Arch::X86_64),
    Platform::new(Os::MacOs, Arch::Aarch64),
    Platform::new(Os::Linux, Arch::X86_64),
    Platform::new(Os::Linux, Arch::Aarch64),
    Platform::new(Os::Linux, Arch::X86),
    Platform::new(Os::Linux, Arch::Armv7),
    Platform::new(Os::Windows, Arch::X86_64),
    Platform::new(Os::Windows, Arch::Aarch64),
    Platform::new(Os::Windows, Arch::X86),
    Platform::new(Os::FreeBsd, Arch::X86_64),
];

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Target triple release archives are named after, or `None` for pairs
    /// nobody publishes (e.g. 32-bit macOS).
    pub fn target_triple(&self) -> Option<&'static str> {
        let triple = match (self.os, self.arch) {
            (Os::MacOs, Arch::X86_64) => "x86_64-apple-darwin",
            (Os::MacOs, Arch::Aarch64) => "aarch64-apple-darwin",
            (Os::Linux, Arch::X86_64) => "x86_64-unknown-linux-musl",
            (Os::Linux, Arch::Aarch64) => "aarch64-unknown-linux-musl",
            (Os::Linux, Arch::X86) => "i686-unknown-linux-musl",
            (Os::Linux, Arch::Armv7) => "armv7-unknown-linux-musleabihf",
            (Os::Windows, Arch::X86_64) => "x86_64-pc-windows-msvc",
            (Os::Windows, Arch::Aarch64) => "aarch64-pc-windows-msvc",
            (Os::Windows, Arch::X86) => "i686-pc-windows-msvc",
            (Os::FreeBsd, Arch::X86_64) => "x86_64-unknown-freebsd",
            _ => return None,
        };
        Some(triple)
    }

    /// Executable file name for `binary` on this platform.
    pub fn executable_name(&self, binary: &str) -> String {
        if self.os == Os::Windows && !binary.to_ascii_lowercase().ends_with(".exe") {
            format!("{}.exe", binary)
        } else {
            binary.to_string()
        }
    }

    /// Parse a target triple. Both the musl and gnu Linux variants map to the
    /// same platform; the table keeps whichever triple it was written with.
    fn from_triple(s: &str) -> Option<Self> {
        let mut parts = s.split('-');
        let arch = Arch::parse(parts.next()?)?;
        let rest: Vec<&str> = parts.collect();
        let os = if rest.contains(&"darwin") {
            Os::MacOs
        } else if rest.contains(&"linux") {
            Os::Linux
        } else if rest.contains(&"windows") {
            Os::Windows
        } else if rest.contains(&"freebsd") {
            Os::FreeBsd
        } else {
            return None;
        };
        Some(Platform::new(os, arch))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os.as_str(), self.arch.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    /// Accepts `x86_64-unknown-linux-musl`, `linux/x86_64`, `darwin-arm64`, ...
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let unsupported = || Error::UnsupportedPlatform(s.to_string());
        if let Some(p) = Platform::from_triple(s) {
            return Ok(p);
        }
        let (os, arch) = s
            .split_once('/')
            .or_else(|| s.split_once('-'))
            .ok_or_else(unsupported)?;
        let os = Os::parse(os).ok_or_else(unsupported)?;
        let arch = Arch::parse(arch).ok_or_else(unsupported)?;
        Ok(Platform::new(os, arch))
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.target_triple() {
            Some(t) => serializer.serialize_str(t),
            None => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Map `std::env::consts::{OS, ARCH}`-style strings to a platform.
pub fn identify_from(os: &str, arch: &str) -> Result<Platform> {
    let unsupported = || Error::UnsupportedPlatform(format!("{}/{}", os, arch));
    let os = match os {
        "macos" => Os::MacOs,
        "linux" => Os::Linux,
        "windows" => Os::Windows,
        "freebsd" => Os::FreeBsd,
        _ => return Err(unsupported()),
    };
    let arch = match arch {
        "x86_64" => Arch::X86_64,
        "aarch64" => Arch::Aarch64,
        "x86" => Arch::X86,
        "arm" => Arch::Armv7,
        _ => return Err(unsupported()),
    };
    let platform = Platform::new(os, arch);
    if platform.target_triple().is_none() {
        return Err(unsupported());
    }
    Ok(platform)
}

/// Platform of the running process.
pub fn identify() -> Result<Platform> {
    let platform = identify_from(std::env::consts::OS, std::env::consts::ARCH)?;
    tracing::debug!(%platform, "identified host platform");
    Ok(platform)
}
