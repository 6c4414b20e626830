//! Build profile knobs for the server platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Knob enums
// ---------------------------------------------------------------------------

/// Build target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Release,
    ReleaseDebug,
    #[default]
    Debug,
}

/// Optimization preference for release targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimize {
    #[default]
    Speed,
    Size,
}

/// Linker program passed through `-fuse-ld`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linker {
    #[default]
    Default,
    Bfd,
    Gold,
    Lld,
    Mold,
}

/// Link-time optimization mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lto {
    #[default]
    None,
    Thin,
    Full,
}

/// Compiler sanitizers. Declaration order is the order flags are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanitizer {
    Ubsan,
    Asan,
    Lsan,
    Tsan,
    Msan,
}

impl Sanitizer {
    /// Value for `-fsanitize=`.
    pub fn flag_name(self) -> &'static str {
        match self {
            Self::Ubsan => "undefined",
            Self::Asan => "address",
            Self::Lsan => "leak",
            Self::Tsan => "thread",
            Self::Msan => "memory",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Release => "release",
            Self::ReleaseDebug => "release_debug",
            Self::Debug => "debug",
        })
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(Self::Release),
            "release_debug" => Ok(Self::ReleaseDebug),
            "debug" => Ok(Self::Debug),
            other => Err(format!(
                "unknown target '{other}': expected 'release', 'release_debug', or 'debug'"
            )),
        }
    }
}

impl FromStr for Optimize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(Self::Speed),
            "size" => Ok(Self::Size),
            other => Err(format!("unknown optimize '{other}': expected 'speed' or 'size'")),
        }
    }
}

impl fmt::Display for Linker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Bfd => "bfd",
            Self::Gold => "gold",
            Self::Lld => "lld",
            Self::Mold => "mold",
        })
    }
}

impl FromStr for Linker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "bfd" => Ok(Self::Bfd),
            "gold" => Ok(Self::Gold),
            "lld" => Ok(Self::Lld),
            "mold" => Ok(Self::Mold),
            other => Err(format!(
                "unknown linker '{other}': expected default, bfd, gold, lld, or mold"
            )),
        }
    }
}

impl FromStr for Lto {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "thin" => Ok(Self::Thin),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown lto '{other}': expected none, thin, or full")),
        }
    }
}

impl FromStr for Sanitizer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ubsan" | "undefined" => Ok(Self::Ubsan),
            "asan" | "address" => Ok(Self::Asan),
            "lsan" | "leak" => Ok(Self::Lsan),
            "tsan" | "thread" => Ok(Self::Tsan),
            "msan" | "memory" => Ok(Self::Msan),
            other => Err(format!(
                "unknown sanitizer '{other}': expected ubsan, asan, lsan, tsan, or msan"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildProfile
// ---------------------------------------------------------------------------

/// Every user-facing option that influences server platform flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildProfile {
    pub target: Target,
    pub optimize: Optimize,
    /// Emit debug info in release builds too.
    pub debug_symbols: bool,
    /// `None` picks the host word size.
    pub bits: Option<u32>,
    /// Explicit architecture; empty means autodetect.
    pub arch: String,
    pub use_llvm: bool,
    pub linker: Linker,
    /// Link libgcc and libstdc++ statically.
    pub use_static_cpp: bool,
    pub use_coverage: bool,
    pub sanitizers: Vec<Sanitizer>,
    pub lto: Lto,
    /// Parallel build jobs, used for GCC's `-flto=<n>`.
    pub num_jobs: usize,
    /// Link libexecinfo (needed where glibc is missing).
    pub execinfo: bool,
    pub builtin_enet: bool,
    pub builtin_mbedtls: bool,
    pub builtin_pcre2: bool,
}

impl Default for BuildProfile {
    fn default() -> Self {
        Self {
            target: Target::default(),
            optimize: Optimize::default(),
            debug_symbols: true,
            bits: None,
            arch: String::new(),
            use_llvm: false,
            linker: Linker::default(),
            use_static_cpp: true,
            use_coverage: false,
            sanitizers: Vec::new(),
            lto: Lto::default(),
            num_jobs: 1,
            execinfo: false,
            builtin_enet: true,
            builtin_mbedtls: true,
            builtin_pcre2: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_knobs() {
        assert_eq!("release_debug".parse::<Target>(), Ok(Target::ReleaseDebug));
        assert_eq!("size".parse::<Optimize>(), Ok(Optimize::Size));
        assert_eq!("mold".parse::<Linker>(), Ok(Linker::Mold));
        assert_eq!("thin".parse::<Lto>(), Ok(Lto::Thin));
        assert_eq!("address".parse::<Sanitizer>(), Ok(Sanitizer::Asan));
        assert!("fast".parse::<Optimize>().unwrap_err().contains("'fast'"));
    }

    #[test]
    fn sanitizer_order_follows_declaration() {
        let mut list = vec![Sanitizer::Msan, Sanitizer::Ubsan, Sanitizer::Tsan];
        list.sort();
        assert_eq!(list, [Sanitizer::Ubsan, Sanitizer::Tsan, Sanitizer::Msan]);
    }

    #[test]
    fn profile_defaults_from_partial_json() {
        let profile: BuildProfile =
            serde_json::from_str(r#"{"target": "release", "linker": "lld"}"#).expect("parse");
        assert_eq!(profile.target, Target::Release);
        assert_eq!(profile.linker, Linker::Lld);
        assert!(profile.debug_symbols);
        assert!(profile.use_static_cpp);
        assert_eq!(profile.num_jobs, 1);
    }
}
