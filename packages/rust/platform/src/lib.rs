//! Compiler and linker flag configuration for the headless server platform.
//!
//! [`configure`] is a pure function of the [`BuildProfile`], the [`Host`] and
//! the [`Toolchain`]; the only outside lookup (the mold wrapper search) goes
//! through a [`HostProbe`].

mod host;
mod profile;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use scubuild_shared::{Result, ScuBuildError};

pub use host::{
    CompilerVersion, FsProbe, Host, HostOs, HostProbe, Toolchain, detect_compiler_version,
    parse_compiler_version, program_name,
};
pub use profile::{BuildProfile, Linker, Lto, Optimize, Sanitizer, Target};

/// Oldest GCC that understands `-fuse-ld=mold`.
const GCC_MOLD_MIN: CompilerVersion = CompilerVersion::new(12, 1, 0);

/// Prefixes searched for `mold/ld` when GCC needs the `-B` wrapper.
const MOLD_WRAPPER_PREFIXES: [&str; 4] =
    ["/usr/libexec", "/usr/local/libexec", "/usr/lib", "/usr/local/lib"];

/// Include path prepended for the platform's own headers.
const PLATFORM_INCLUDE: &str = "#platform/server";

// ---------------------------------------------------------------------------
// FlagSet
// ---------------------------------------------------------------------------

/// Resolved build environment for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    pub cc: String,
    pub cxx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranlib: Option<String>,
    pub bits: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libs: Vec<String>,
    pub cppdefines: Vec<String>,
    pub cpppath: Vec<String>,
    /// pkg-config packages whose `--cflags --libs` must be merged in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pkg_config: Vec<String>,
    /// Arguments appended after everything else on the link command line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_trailer: Vec<String>,
    /// Suffix inserted into the output binary name (`.llvm`, `s`, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra_suffix: String,
}

impl FlagSet {
    /// Render as `NAME='value'` lines that a shell can `eval`.
    pub fn to_shell(&self) -> String {
        let mut lines = vec![
            shell_var("CC", &self.cc),
            shell_var("CXX", &self.cxx),
        ];
        if let Some(ar) = &self.ar {
            lines.push(shell_var("AR", ar));
        }
        if let Some(ranlib) = &self.ranlib {
            lines.push(shell_var("RANLIB", ranlib));
        }
        lines.push(shell_var("BITS", &self.bits.to_string()));
        if !self.arch.is_empty() {
            lines.push(shell_var("ARCH", &self.arch));
        }
        lines.push(shell_var("CCFLAGS", &self.ccflags.join(" ")));
        lines.push(shell_var("LINKFLAGS", &self.linkflags.join(" ")));
        lines.push(shell_var("LIBS", &self.libs.join(" ")));
        lines.push(shell_var("CPPDEFINES", &self.cppdefines.join(" ")));
        lines.push(shell_var("CPPPATH", &self.cpppath.join(" ")));
        if !self.pkg_config.is_empty() {
            lines.push(shell_var("PKG_CONFIG_PACKAGES", &self.pkg_config.join(" ")));
        }
        if !self.link_trailer.is_empty() {
            lines.push(shell_var("LINK_TRAILER", &self.link_trailer.join(" ")));
        }
        lines.push(shell_var("EXTRA_SUFFIX", &self.extra_suffix));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

fn shell_var(name: &str, value: &str) -> String {
    format!("{name}='{}'", value.replace('\'', r"'\''"))
}

fn append(list: &mut Vec<String>, items: &[&str]) {
    list.extend(items.iter().map(|s| (*s).to_string()));
}

fn prepend(list: &mut Vec<String>, items: &[&str]) {
    for (idx, item) in items.iter().enumerate() {
        list.insert(idx, (*item).to_string());
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Compute the server platform's compiler and linker settings.
///
/// Fails when the profile asks for something the toolchain cannot do:
/// ThinLTO without LLVM, or mold with an old GCC and no wrapper installed.
#[instrument(skip_all, fields(target = %profile.target, linker = %profile.linker))]
pub fn configure(
    profile: &BuildProfile,
    host: &Host,
    toolchain: &Toolchain,
    probe: &dyn HostProbe,
) -> Result<FlagSet> {
    let mut flags = FlagSet {
        cc: toolchain.cc.clone(),
        cxx: toolchain.cxx.clone(),
        ..FlagSet::default()
    };

    // Build type
    match profile.target {
        Target::Release | Target::ReleaseDebug => {
            let opt = match (profile.target, profile.optimize) {
                (_, Optimize::Size) => "-Os",
                (Target::Release, Optimize::Speed) => "-O3",
                _ => "-O2",
            };
            prepend(&mut flags.ccflags, &[opt]);
            if profile.debug_symbols {
                prepend(&mut flags.ccflags, &["-g2"]);
            }
        }
        Target::Debug => {
            prepend(&mut flags.ccflags, &["-g3"]);
            append(&mut flags.linkflags, &["-rdynamic"]);
        }
    }

    if profile.debug_symbols {
        // dwarf-4 keeps addr2line working on clang builds
        append(&mut flags.ccflags, &["-gdwarf-4"]);
    }

    // Architecture
    flags.bits = profile
        .bits
        .unwrap_or(if host.is_64bit { 64 } else { 32 });

    flags.arch = profile.arch.clone();
    if flags.arch.is_empty() && host.machine == "riscv64" {
        flags.arch = "rv64".into();
    }
    if flags.arch == "rv64" {
        append(&mut flags.ccflags, &["-march=rv64gc"]);
    }

    // Compiler
    let use_llvm = profile.use_llvm || program_name(&toolchain.cxx).contains("clang");
    if use_llvm {
        if !program_name(&toolchain.cxx).contains("clang++") {
            flags.cc = "clang".into();
            flags.cxx = "clang++".into();
        }
        flags.extra_suffix = format!(".llvm{}", flags.extra_suffix);
        append(&mut flags.libs, &["atomic"]);
    }

    // Linker
    if profile.linker != Linker::Default {
        info!(linker = %profile.linker, "using linker program");
        let effective = Toolchain {
            cc: flags.cc.clone(),
            cxx: flags.cxx.clone(),
            version: toolchain.version,
        };
        let old_gcc = effective.is_gcc()
            && effective.version.is_some_and(|v| v < GCC_MOLD_MIN);

        if profile.linker == Linker::Mold && old_gcc {
            let prefix = MOLD_WRAPPER_PREFIXES
                .iter()
                .find(|p| probe.file_exists(&Path::new(p).join("mold").join("ld")))
                .ok_or_else(|| {
                    ScuBuildError::platform(
                        "couldn't locate mold installation path; make sure it's installed in /usr or /usr/local",
                    )
                })?;
            flags.linkflags.push(format!("-B{prefix}/mold"));
        } else {
            flags.linkflags.push(format!("-fuse-ld={}", profile.linker));
        }
    }

    if profile.use_coverage {
        append(&mut flags.ccflags, &["-ftest-coverage", "-fprofile-arcs"]);
        append(&mut flags.linkflags, &["-ftest-coverage", "-fprofile-arcs"]);
    }

    // Sanitizers
    if !profile.sanitizers.is_empty() {
        flags.extra_suffix.push('s');

        let mut sanitizers = profile.sanitizers.clone();
        sanitizers.sort();
        sanitizers.dedup();
        for sanitizer in sanitizers {
            let flag = format!("-fsanitize={}", sanitizer.flag_name());
            flags.ccflags.push(flag.clone());
            flags.linkflags.push(flag);
        }
    }

    // LTO
    match profile.lto {
        Lto::None => {}
        Lto::Thin => {
            if !use_llvm {
                return Err(ScuBuildError::platform(
                    "ThinLTO is only compatible with LLVM, use use_llvm or lto=full",
                ));
            }
            append(&mut flags.ccflags, &["-flto=thin"]);
            append(&mut flags.linkflags, &["-flto=thin"]);
        }
        Lto::Full => {
            append(&mut flags.ccflags, &["-flto"]);
            if !use_llvm && profile.num_jobs > 1 {
                flags.linkflags.push(format!("-flto={}", profile.num_jobs));
            } else {
                append(&mut flags.linkflags, &["-flto"]);
            }
        }
    }
    if profile.lto != Lto::None && !use_llvm {
        flags.ranlib = Some("gcc-ranlib".into());
        flags.ar = Some("gcc-ar".into());
    }

    append(&mut flags.ccflags, &["-pipe"]);

    // Dependencies
    if !profile.builtin_enet {
        flags.pkg_config.push("libenet".into());
    }
    if !profile.builtin_mbedtls {
        // mbedTLS ships no pkg-config file
        append(&mut flags.libs, &["mbedtls", "mbedcrypto", "mbedx509"]);
    }
    if !profile.builtin_pcre2 {
        flags.pkg_config.push("libpcre2-32".into());
    }

    // Platform
    prepend(&mut flags.cpppath, &[PLATFORM_INCLUDE]);
    append(&mut flags.cppdefines, &["SERVER_ENABLED", "UNIX_ENABLED"]);

    if host.os == HostOs::Darwin {
        append(
            &mut flags.linkflags,
            &["-framework", "Cocoa", "-framework", "Carbon", "-lz", "-framework", "IOKit"],
        );
    }

    append(&mut flags.libs, &["pthread"]);
    if host.os == HostOs::Linux {
        append(&mut flags.libs, &["dl"]);
    }

    if profile.execinfo || host.os.is_bsd() {
        append(&mut flags.libs, &["execinfo"]);
    }

    if host.os != HostOs::Darwin {
        let wants_atomic = use_llvm && host.os != HostOs::FreeBsd;
        if profile.use_static_cpp {
            append(&mut flags.linkflags, &["-static-libgcc", "-static-libstdc++"]);
            if wants_atomic {
                append(&mut flags.link_trailer, &["-latomic"]);
            }
        } else if wants_atomic {
            append(&mut flags.libs, &["atomic"]);
        }
    }

    debug!(
        ccflags = flags.ccflags.len(),
        linkflags = flags.linkflags.len(),
        libs = flags.libs.len(),
        "platform flags configured"
    );

    Ok(flags)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    struct FakeProbe(Vec<PathBuf>);

    impl HostProbe for FakeProbe {
        fn file_exists(&self, path: &Path) -> bool {
            self.0.iter().any(|p| p == path)
        }
    }

    fn linux() -> Host {
        Host {
            os: HostOs::Linux,
            is_64bit: true,
            machine: "x86_64".into(),
        }
    }

    fn gcc(version: Option<CompilerVersion>) -> Toolchain {
        Toolchain {
            cc: "gcc".into(),
            cxx: "g++".into(),
            version,
        }
    }

    fn run(profile: &BuildProfile) -> Result<FlagSet> {
        configure(profile, &linux(), &gcc(None), &FakeProbe(vec![]))
    }

    #[test]
    fn debug_defaults_on_linux() {
        let flags = run(&BuildProfile::default()).unwrap();
        assert_eq!(flags.ccflags, ["-g3", "-gdwarf-4", "-pipe"]);
        assert_eq!(
            flags.linkflags,
            ["-rdynamic", "-static-libgcc", "-static-libstdc++"]
        );
        assert_eq!(flags.libs, ["pthread", "dl"]);
        assert_eq!(flags.cppdefines, ["SERVER_ENABLED", "UNIX_ENABLED"]);
        assert_eq!(flags.cpppath, ["#platform/server"]);
        assert_eq!(flags.bits, 64);
        assert_eq!(flags.cc, "gcc");
        assert!(flags.extra_suffix.is_empty());
    }

    #[test]
    fn release_optimization_levels() {
        let mut profile = BuildProfile {
            target: Target::Release,
            ..BuildProfile::default()
        };
        assert_eq!(run(&profile).unwrap().ccflags[..3], ["-g2", "-O3", "-gdwarf-4"]);

        profile.optimize = Optimize::Size;
        profile.debug_symbols = false;
        assert_eq!(run(&profile).unwrap().ccflags, ["-Os", "-pipe"]);

        profile.target = Target::ReleaseDebug;
        profile.optimize = Optimize::Speed;
        assert_eq!(run(&profile).unwrap().ccflags, ["-O2", "-pipe"]);
    }

    #[test]
    fn riscv_host_sets_arch() {
        let host = Host {
            machine: "riscv64".into(),
            ..linux()
        };
        let flags =
            configure(&BuildProfile::default(), &host, &gcc(None), &FakeProbe(vec![])).unwrap();
        assert_eq!(flags.arch, "rv64");
        assert!(flags.ccflags.contains(&"-march=rv64gc".to_string()));
    }

    #[test]
    fn explicit_bits_override_host() {
        let profile = BuildProfile {
            bits: Some(32),
            ..BuildProfile::default()
        };
        assert_eq!(run(&profile).unwrap().bits, 32);
    }

    #[test]
    fn llvm_switches_compilers_and_links_atomic() {
        let profile = BuildProfile {
            use_llvm: true,
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert_eq!(flags.cc, "clang");
        assert_eq!(flags.cxx, "clang++");
        assert_eq!(flags.extra_suffix, ".llvm");
        assert_eq!(flags.libs, ["atomic", "pthread", "dl"]);
        assert_eq!(flags.link_trailer, ["-latomic"]);
    }

    #[test]
    fn clang_cxx_implies_llvm() {
        let tc = Toolchain {
            cc: "clang-17".into(),
            cxx: "/usr/bin/clang++-17".into(),
            version: None,
        };
        let flags = configure(&BuildProfile::default(), &linux(), &tc, &FakeProbe(vec![])).unwrap();
        assert_eq!(flags.cxx, "/usr/bin/clang++-17");
        assert_eq!(flags.extra_suffix, ".llvm");
    }

    #[test]
    fn linker_selection() {
        let profile = BuildProfile {
            linker: Linker::Lld,
            ..BuildProfile::default()
        };
        assert!(run(&profile).unwrap().linkflags.contains(&"-fuse-ld=lld".to_string()));
    }

    #[test]
    fn mold_with_old_gcc_uses_wrapper() {
        let profile = BuildProfile {
            linker: Linker::Mold,
            ..BuildProfile::default()
        };
        let old = gcc(Some(CompilerVersion::new(11, 4, 0)));

        let probe = FakeProbe(vec![PathBuf::from("/usr/local/libexec/mold/ld")]);
        let flags = configure(&profile, &linux(), &old, &probe).unwrap();
        assert!(flags.linkflags.contains(&"-B/usr/local/libexec/mold".to_string()));

        let err = configure(&profile, &linux(), &old, &FakeProbe(vec![])).unwrap_err();
        assert!(err.to_string().contains("mold"));

        let new = gcc(Some(CompilerVersion::new(12, 1, 0)));
        let flags = configure(&profile, &linux(), &new, &FakeProbe(vec![])).unwrap();
        assert!(flags.linkflags.contains(&"-fuse-ld=mold".to_string()));
    }

    #[test]
    fn sanitizers_add_suffix_and_flags_in_fixed_order() {
        let profile = BuildProfile {
            sanitizers: vec![Sanitizer::Tsan, Sanitizer::Ubsan, Sanitizer::Tsan],
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert_eq!(flags.extra_suffix, "s");
        let sanitize: Vec<_> = flags
            .ccflags
            .iter()
            .filter(|f| f.starts_with("-fsanitize="))
            .collect();
        assert_eq!(sanitize, ["-fsanitize=undefined", "-fsanitize=thread"]);
        assert!(flags.linkflags.contains(&"-fsanitize=thread".to_string()));
    }

    #[test]
    fn thin_lto_requires_llvm() {
        let profile = BuildProfile {
            lto: Lto::Thin,
            ..BuildProfile::default()
        };
        assert!(matches!(run(&profile), Err(ScuBuildError::Platform(_))));

        let profile = BuildProfile {
            lto: Lto::Thin,
            use_llvm: true,
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert!(flags.linkflags.contains(&"-flto=thin".to_string()));
        assert_eq!(flags.ar, None);
    }

    #[test]
    fn full_lto_with_gcc_uses_jobs_and_gcc_ar() {
        let profile = BuildProfile {
            lto: Lto::Full,
            num_jobs: 8,
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert!(flags.ccflags.contains(&"-flto".to_string()));
        assert!(flags.linkflags.contains(&"-flto=8".to_string()));
        assert_eq!(flags.ar.as_deref(), Some("gcc-ar"));
        assert_eq!(flags.ranlib.as_deref(), Some("gcc-ranlib"));
    }

    #[test]
    fn coverage_flags() {
        let profile = BuildProfile {
            use_coverage: true,
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert!(flags.ccflags.contains(&"-fprofile-arcs".to_string()));
        assert!(flags.linkflags.contains(&"-ftest-coverage".to_string()));
    }

    #[test]
    fn system_libraries() {
        let profile = BuildProfile {
            builtin_mbedtls: false,
            builtin_enet: false,
            builtin_pcre2: false,
            ..BuildProfile::default()
        };
        let flags = run(&profile).unwrap();
        assert_eq!(flags.libs, ["mbedtls", "mbedcrypto", "mbedx509", "pthread", "dl"]);
        assert_eq!(flags.pkg_config, ["libenet", "libpcre2-32"]);
    }

    #[test]
    fn darwin_frameworks_and_no_static_cpp() {
        let host = Host {
            os: HostOs::Darwin,
            is_64bit: true,
            machine: "arm64".into(),
        };
        let flags =
            configure(&BuildProfile::default(), &host, &gcc(None), &FakeProbe(vec![])).unwrap();
        assert!(flags.linkflags.contains(&"Cocoa".to_string()));
        assert!(!flags.linkflags.contains(&"-static-libgcc".to_string()));
        assert_eq!(flags.libs, ["pthread"]);
    }

    #[test]
    fn bsd_links_execinfo() {
        let host = Host {
            os: HostOs::FreeBsd,
            is_64bit: true,
            machine: "amd64".into(),
        };
        let profile = BuildProfile {
            use_llvm: true,
            use_static_cpp: false,
            ..BuildProfile::default()
        };
        let flags = configure(&profile, &host, &gcc(None), &FakeProbe(vec![])).unwrap();
        assert_eq!(flags.libs, ["atomic", "pthread", "execinfo"]);
    }

    #[test]
    fn shell_rendering_quotes_values() {
        let flags = run(&BuildProfile::default()).unwrap();
        let shell = flags.to_shell();
        assert!(shell.contains("CCFLAGS='-g3 -gdwarf-4 -pipe'\n"));
        assert!(shell.contains("LIBS='pthread dl'\n"));
        assert_eq!(shell_var("X", "it's"), r"X='it'\''s'");
    }

    #[test]
    fn flag_set_serializes() {
        let flags = run(&BuildProfile::default()).unwrap();
        let json = serde_json::to_string(&flags).unwrap();
        assert!(json.contains("\"ccflags\""));
        assert!(!json.contains("\"ar\""));
    }
}
