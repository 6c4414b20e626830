//! The `generate` pass: module table → discovery → partition → unit files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use scubuild_grouper as grouper;
use scubuild_shared::{
    CURRENT_REPORT_VERSION, GenerationReport, ModuleOutcome, ModuleReport, ModuleSpec,
    ModuleTable, Result, ScuBuildError, ScuFolders,
};

/// Configuration for a [`generate`] run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Engine root. Every module folder is resolved against it.
    pub root: PathBuf,
    pub table: ModuleTable,
    /// Active build features, matched against `enabled_if` / `disabled_if`.
    pub features: BTreeSet<String>,
    /// Apply `release_max_per_unit` to modules that set no cap of their own.
    pub release: bool,
    pub release_max_per_unit: usize,
}

impl GenerateConfig {
    pub fn new(root: impl Into<PathBuf>, table: ModuleTable) -> Self {
        Self {
            root: root.into(),
            table,
            features: BTreeSet::new(),
            release: false,
            release_max_per_unit: 8,
        }
    }

    /// Cap used for a module, after the release override.
    pub fn effective_max(&self, module: &ModuleSpec) -> usize {
        if module.max_per_unit == 0 && self.release {
            self.release_max_per_unit
        } else {
            module.max_per_unit
        }
    }
}

/// Progress callback for reporting generation status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a module is processed.
    fn module_started(&self, main_folder: &str, current: usize, total: usize);
    /// Called after a module is processed, whatever its outcome.
    fn module_finished(&self, report: &ModuleReport);
    /// Called when the pass completes.
    fn done(&self, report: &GenerationReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn module_started(&self, _main_folder: &str, _current: usize, _total: usize) {}
    fn module_finished(&self, _report: &ModuleReport) {}
    fn done(&self, _report: &GenerationReport) {}
}

/// Run a full generation pass over every module of `config.table`.
///
/// Only a wrong root (missing required folders) fails the pass; problems with
/// individual modules become warnings and `Skipped` outcomes in the report.
#[instrument(skip_all, fields(root = %config.root.display(), modules = config.table.modules.len()))]
pub fn generate(config: &GenerateConfig, progress: &dyn ProgressReporter) -> Result<GenerationReport> {
    let start = Instant::now();

    progress.phase("Checking engine root");
    check_required_dirs(&config.root, &config.table.required_dirs)?;

    progress.phase("Generating units");
    let total = config.table.modules.len();
    let mut scu_folders = ScuFolders::default();
    let mut modules = Vec::with_capacity(total);

    for (i, module) in config.table.modules.iter().enumerate() {
        let main = module.main_folder().unwrap_or_default();
        progress.module_started(main, i + 1, total);

        let report = generate_module(config, module, &mut scu_folders);
        progress.module_finished(&report);
        modules.push(report);
    }

    let report = GenerationReport {
        report_version: CURRENT_REPORT_VERSION,
        root: config.root.display().to_string(),
        generated_at: Utc::now(),
        release: config.release,
        features: config.features.iter().cloned().collect(),
        modules,
        scu_folders,
    };

    progress.done(&report);

    info!(
        units = report.unit_count(),
        folders = report.scu_folders.len(),
        warnings = report.warning_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "generation complete"
    );

    Ok(report)
}

/// Fail unless every required top-level folder exists under `root`.
pub fn check_required_dirs(root: &Path, required: &[String]) -> Result<()> {
    if !root.is_dir() {
        return Err(ScuBuildError::validation(format!(
            "engine root {} is not a directory",
            root.display()
        )));
    }

    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|dir| !root.join(dir).is_dir())
        .collect();

    if !missing.is_empty() {
        return Err(ScuBuildError::validation(format!(
            "{} does not look like an engine root: missing {}",
            root.display(),
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Process a single module. Never fails; errors are folded into the report.
fn generate_module(
    config: &GenerateConfig,
    module: &ModuleSpec,
    scu_folders: &mut ScuFolders,
) -> ModuleReport {
    let main = module
        .main_folder()
        .unwrap_or_default()
        .trim_end_matches(['/', '\\'])
        .to_string();
    let extension = module.primary_extension().to_string();
    let mut report = ModuleReport {
        section: grouper::section_name(&main),
        main_folder: main.clone(),
        extension: extension.clone(),
        outcome: ModuleOutcome::Empty { removed_stale: 0 },
        warnings: Vec::new(),
    };

    if let Some(feature) = module.gating_feature(&config.features) {
        debug!(main = %main, feature, "module gated out");
        report.outcome = ModuleOutcome::Gated {
            feature: feature.to_string(),
        };
        return report;
    }

    scu_folders.insert(main.as_str());

    let main_abs = config.root.join(&main);
    if !main_abs.is_dir() {
        warn!(folder = %main_abs.display(), "main folder not found, skipping module");
        let reason = format!("main folder {} not found", main_abs.display());
        report.warnings.push(reason.clone());
        report.outcome = ModuleOutcome::Skipped { reason };
        return report;
    }

    let discovery = match grouper::discover_module(&config.root, module) {
        Ok(d) => d,
        Err(e) => {
            warn!(main = %main, error = %e, "discovery failed, skipping module");
            report.outcome = ModuleOutcome::Skipped {
                reason: e.to_string(),
            };
            return report;
        }
    };
    report.warnings.extend(
        discovery
            .missing_dirs
            .iter()
            .map(|dir| format!("{} not found", dir.display())),
    );

    let out_dir = grouper::output_dir(&config.root, &main);

    if discovery.is_empty() {
        match grouper::clear_stale_units(&out_dir, &extension) {
            Ok(removed_stale) => report.outcome = ModuleOutcome::Empty { removed_stale },
            Err(e) => {
                warn!(main = %main, error = %e, "could not clear stale units");
                report.warnings.push(e.to_string());
            }
        }
        return report;
    }

    let chunks = grouper::partition(&discovery.entries, config.effective_max(module));
    let prefix = grouper::unit_prefix(&main);

    match grouper::emit(&chunks, &discovery.exceptions, &out_dir, &prefix, &extension) {
        Ok(summary) => {
            info!(
                main = %main,
                extension = %extension,
                files = discovery.len(),
                units = summary.units.len(),
                "module generated"
            );
            report.outcome = ModuleOutcome::Generated {
                units: summary.units,
                removed_stale: summary.removed_stale,
            };
        }
        Err(e) => {
            warn!(main = %main, error = %e, "could not write units, skipping module");
            report.warnings.push(e.to_string());
            report.outcome = ModuleOutcome::Skipped {
                reason: format!("output folder {} is not writable", out_dir.display()),
            };
        }
    }

    report
}
