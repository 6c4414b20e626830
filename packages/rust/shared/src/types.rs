//! Core domain types for SCU generation: the module table, include entries,
//! and the per-run generation report.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version for the generation report format.
pub const CURRENT_REPORT_VERSION: u32 = 1;

/// Top-level directories that must exist under the engine root.
pub const DEFAULT_REQUIRED_DIRS: [&str; 3] = ["core", "platform", "scene"];

// ---------------------------------------------------------------------------
// IncludeEntry
// ---------------------------------------------------------------------------

/// A root-relative include path such as `scene/gui/button.cpp`.
///
/// Always uses `/` separators so generated units are identical across hosts.
/// Ordering is plain lexicographic ordering of the path string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludeEntry(String);

impl IncludeEntry {
    /// Host separators become `/`. Other characters, including `\` on Unix, are kept.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if std::path::MAIN_SEPARATOR == '/' {
            Self(path)
        } else {
            Self(path.replace(std::path::MAIN_SEPARATOR, "/"))
        }
    }

    /// Whether the path can be written inside a quoted `#include`.
    pub fn is_includable(path: &str) -> bool {
        !path.contains(['"', '\n', '\r'])
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// File name without its final extension (`gui/button.cpp` → `button`).
    pub fn stem(&self) -> &str {
        let file_name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match file_name.rfind('.') {
            Some(0) | None => file_name,
            Some(idx) => &file_name[..idx],
        }
    }

    /// The `#include` directive written into a generated unit.
    pub fn include_line(&self) -> String {
        format!("#include \"{}\"", self.0)
    }
}

impl std::fmt::Display for IncludeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ModuleSpec / ModuleTable
// ---------------------------------------------------------------------------

/// One `[[modules]]` entry of the module table.
///
/// `dirs[0]` is the main folder, relative to the engine root; every other entry
/// is a sub-folder relative to the main folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub dirs: Vec<String>,

    /// Source extensions without the dot. The first one names the outputs.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File stems that must be compiled in their own unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<String>,

    /// Upper bound of includes per grouped unit; `0` means a single unit.
    #[serde(default)]
    pub max_per_unit: usize,

    /// Only process this module when the named build feature is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_if: Option<String>,

    /// Skip this module when the named build feature is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_if: Option<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["cpp".into()]
}

impl ModuleSpec {
    /// A `cpp` module over the given directories with no exceptions.
    pub fn new<S: AsRef<str>>(dirs: &[S]) -> Self {
        Self {
            dirs: dirs.iter().map(|d| d.as_ref().to_string()).collect(),
            extensions: default_extensions(),
            exceptions: Vec::new(),
            max_per_unit: 0,
            enabled_if: None,
            disabled_if: None,
        }
    }

    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    pub fn with_exceptions<S: AsRef<str>>(mut self, stems: &[S]) -> Self {
        self.exceptions = stems.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_max_per_unit(mut self, max: usize) -> Self {
        self.max_per_unit = max;
        self
    }

    pub fn main_folder(&self) -> Option<&str> {
        self.dirs.first().map(String::as_str)
    }

    pub fn sub_folders(&self) -> &[String] {
        self.dirs.get(1..).unwrap_or(&[])
    }

    /// Extension used for the generated file names.
    pub fn primary_extension(&self) -> &str {
        self.extensions.first().map(String::as_str).unwrap_or("cpp")
    }

    /// Evaluate the feature gates against the active feature set.
    pub fn is_enabled(&self, features: &BTreeSet<String>) -> bool {
        if let Some(required) = &self.enabled_if {
            if !features.contains(required) {
                return false;
            }
        }
        if let Some(blocking) = &self.disabled_if {
            if features.contains(blocking) {
                return false;
            }
        }
        true
    }

    /// The feature responsible for gating this module out, if any.
    pub fn gating_feature(&self, features: &BTreeSet<String>) -> Option<&str> {
        match (&self.enabled_if, &self.disabled_if) {
            (Some(req), _) if !features.contains(req) => Some(req),
            (_, Some(block)) if features.contains(block) => Some(block),
            _ => None,
        }
    }
}

/// The hand-maintained table of SCU modules for an engine tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTable {
    /// Top-level folders whose absence means the root is wrong.
    #[serde(default = "default_required_dirs")]
    pub required_dirs: Vec<String>,

    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

fn default_required_dirs() -> Vec<String> {
    DEFAULT_REQUIRED_DIRS.iter().map(|d| (*d).to_string()).collect()
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self {
            required_dirs: default_required_dirs(),
            modules: Vec::new(),
        }
    }
}

impl ModuleTable {
    /// A small table covering the engine's top-level folders, written by `scubuild init`.
    pub fn starter() -> Self {
        Self {
            required_dirs: default_required_dirs(),
            modules: vec![
                ModuleSpec::new(&["main"]),
                ModuleSpec::new(&["platform"]),
                ModuleSpec::new(&["drivers", "png", "png/libpng"]),
                ModuleSpec::new(&["drivers", "png", "png/libpng"]).with_extensions(&["c"]),
                ModuleSpec::new(&[
                    "scene",
                    "audio",
                    "2d",
                    "animation",
                    "gui",
                    "main",
                    "resources",
                ]),
                ModuleSpec::new(&["servers", "rendering", "physics_2d", "audio", "audio/effects"]),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// ScuFolders
// ---------------------------------------------------------------------------

/// Main folders handled by a generation pass.
///
/// The build driver uses this to decide whether a folder's sources should be
/// replaced by its generated units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScuFolders(BTreeSet<String>);

impl ScuFolders {
    pub fn insert(&mut self, folder: impl Into<String>) -> bool {
        self.0.insert(folder.into())
    }

    pub fn contains(&self, folder: &str) -> bool {
        self.0.contains(folder)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// GenerationReport
// ---------------------------------------------------------------------------

/// Whether a unit aggregates many files or isolates one exception file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Grouped,
    Exception,
}

/// One generated unit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// File name inside the module's `.scu` directory.
    pub file_name: String,
    pub kind: UnitKind,
    /// Number of `#include` lines in the unit.
    pub entries: usize,
    /// SHA-256 of the file contents.
    pub sha256: String,
}

/// What happened to a single module during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutcome {
    /// Units were written.
    Generated {
        units: Vec<UnitRecord>,
        removed_stale: usize,
    },
    /// No matching sources were found; only stale units were cleared.
    Empty { removed_stale: usize },
    /// The module could not be processed (missing main folder, unwritable output).
    Skipped { reason: String },
    /// Excluded by an `enabled_if` / `disabled_if` gate.
    Gated { feature: String },
}

/// Per-module entry in the generation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    /// Output prefix stem, e.g. `scene_3d`.
    pub section: String,
    pub main_folder: String,
    pub extension: String,
    pub outcome: ModuleOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a whole generation pass, optionally written as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub report_version: u32,
    pub root: String,
    pub generated_at: DateTime<Utc>,
    pub release: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    pub modules: Vec<ModuleReport>,
    pub scu_folders: ScuFolders,
}

impl GenerationReport {
    /// Total number of unit files written across all modules.
    pub fn unit_count(&self) -> usize {
        self.modules
            .iter()
            .map(|m| match &m.outcome {
                ModuleOutcome::Generated { units, .. } => units.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn warning_count(&self) -> usize {
        self.modules.iter().map(|m| m.warnings.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| matches!(m.outcome, ModuleOutcome::Skipped { .. }))
            .count()
    }
}
