//! Host and toolchain facts the flag configuration depends on.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operating system family of the build host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    Linux,
    Darwin,
    FreeBsd,
    /// OpenBSD, NetBSD, DragonFly, ...
    OtherBsd(String),
    Other(String),
}

impl HostOs {
    pub fn is_bsd(&self) -> bool {
        matches!(self, Self::FreeBsd | Self::OtherBsd(_))
    }
}

/// The machine the build runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub os: HostOs,
    pub is_64bit: bool,
    /// Machine name as reported by the OS (`x86_64`, `riscv64`, ...).
    pub machine: String,
}

impl Host {
    /// Describe the current process's host.
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::Darwin,
            "freebsd" => HostOs::FreeBsd,
            bsd @ ("openbsd" | "netbsd" | "dragonfly") => HostOs::OtherBsd(bsd.to_string()),
            other => HostOs::Other(other.to_string()),
        };

        Self {
            os,
            is_64bit: cfg!(target_pointer_width = "64"),
            machine: std::env::consts::ARCH.to_string(),
        }
    }
}

/// A `major.minor.patch` compiler version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompilerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CompilerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// C/C++ compiler names plus what is known about their version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub cc: String,
    pub cxx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<CompilerVersion>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cc: "gcc".into(),
            cxx: "g++".into(),
            version: None,
        }
    }
}

impl Toolchain {
    /// Whether the C compiler is GCC, judged by its file name.
    pub fn is_gcc(&self) -> bool {
        program_name(&self.cc).contains("gcc")
    }

    /// Run `<cxx> --version` and record the parsed version.
    pub fn probe_version(mut self) -> Self {
        self.version = detect_compiler_version(&self.cxx);
        self
    }
}

/// File name part of a compiler command (`/usr/bin/clang++-17` → `clang++-17`).
pub fn program_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program)
}

/// Extract the version from `--version` output of GCC or Clang.
///
/// Looks for the first `X.Y` or `X.Y.Z` token; a missing patch is `0`.
pub fn parse_compiler_version(text: &str) -> Option<CompilerVersion> {
    static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?:^|[\s(])(\d+)\.(\d+)(?:\.(\d+))?(?:[\s)\-~+]|$)").expect("valid regex")
    });

    let first_line = text.lines().next()?;
    let caps = VERSION_RE.captures(first_line)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .map_or(Some(0), |m| m.as_str().parse().ok())?;

    Some(CompilerVersion::new(major, minor, patch))
}

/// Ask the compiler for its version. `None` if it cannot be run or parsed.
pub fn detect_compiler_version(compiler: &str) -> Option<CompilerVersion> {
    let output = Command::new(compiler).arg("--version").output().ok()?;
    if !output.status.success() {
        debug!(compiler, "compiler --version failed");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let version = parse_compiler_version(&text);
    debug!(compiler, ?version, "detected compiler version");
    version
}

/// Filesystem checks made while configuring, behind a trait so tests can fake the host.
pub trait HostProbe {
    fn file_exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
pub struct FsProbe;

impl HostProbe for FsProbe {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
