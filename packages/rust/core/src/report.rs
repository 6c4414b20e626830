//! Persisting and summarising generation reports.

use std::path::Path;

use tracing::debug;

use scubuild_shared::{GenerationReport, ModuleOutcome, Result, ScuBuildError};

/// Write `report` as pretty-printed JSON, creating parent directories.
pub fn write_report(path: &Path, report: &GenerationReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ScuBuildError::validation(format!("JSON serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ScuBuildError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| ScuBuildError::io(path, e))?;
    debug!(path = %path.display(), "wrote report");
    Ok(())
}

/// Read a report previously written by [`write_report`].
pub fn load_report(path: &Path) -> Result<GenerationReport> {
    let content = std::fs::read_to_string(path).map_err(|e| ScuBuildError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ScuBuildError::validation(format!("invalid report {}: {e}", path.display()))
    })
}

/// One line per module, suitable for terminal output.
pub fn summary_lines(report: &GenerationReport) -> Vec<String> {
    report
        .modules
        .iter()
        .map(|m| {
            let label = format!("{} [{}]", m.main_folder, m.extension);
            match &m.outcome {
                ModuleOutcome::Generated {
                    units,
                    removed_stale,
                } => {
                    let files: usize = units.iter().map(|u| u.entries).sum();
                    let mut line = format!("{label}: {files} files in {} units", units.len());
                    if *removed_stale > 0 {
                        line.push_str(&format!(" ({removed_stale} stale removed)"));
                    }
                    line
                }
                ModuleOutcome::Empty { .. } => format!("{label}: no sources"),
                ModuleOutcome::Skipped { reason } => format!("{label}: skipped, {reason}"),
                ModuleOutcome::Gated { feature } => format!("{label}: gated by {feature}"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;
    use scubuild_shared::{
        CURRENT_REPORT_VERSION, ModuleReport, ScuFolders, UnitKind, UnitRecord,
    };

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scub-report-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn module(main: &str, outcome: ModuleOutcome) -> ModuleReport {
        ModuleReport {
            section: main.replace('/', "_"),
            main_folder: main.into(),
            extension: "cpp".into(),
            outcome,
            warnings: vec![],
        }
    }

    fn sample() -> GenerationReport {
        let unit = |name: &str, kind, entries| UnitRecord {
            file_name: name.into(),
            kind,
            entries,
            sha256: "0".repeat(64),
        };
        let mut folders = ScuFolders::default();
        folders.insert("scene");

        GenerationReport {
            report_version: CURRENT_REPORT_VERSION,
            root: "/engine".into(),
            generated_at: Utc::now(),
            release: true,
            features: vec!["module_mbedtls_enabled".into()],
            modules: vec![
                module(
                    "scene",
                    ModuleOutcome::Generated {
                        units: vec![
                            unit("scu_scene.gen.cpp", UnitKind::Grouped, 8),
                            unit("scu_scene_1.gen.cpp", UnitKind::Grouped, 7),
                            unit("scu_scene_exception.gen.cpp", UnitKind::Exception, 1),
                        ],
                        removed_stale: 2,
                    },
                ),
                module("modules/minimp3", ModuleOutcome::Empty { removed_stale: 0 }),
                module(
                    "modules/bmp",
                    ModuleOutcome::Skipped {
                        reason: "main folder /engine/modules/bmp not found".into(),
                    },
                ),
                module(
                    "core",
                    ModuleOutcome::Gated {
                        feature: "module_mbedtls_enabled".into(),
                    },
                ),
            ],
            scu_folders: folders,
        }
    }

    #[test]
    fn write_then_load_report() {
        let tmp = temp_dir();
        let path = tmp.join("reports/scu.json");
        let report = sample();

        write_report(&path, &report).unwrap();
        let loaded = load_report(&path).unwrap();

        assert_eq!(loaded.modules, report.modules);
        assert_eq!(loaded.unit_count(), 3);
        assert!(loaded.scu_folders.contains("scene"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn load_rejects_garbage() {
        let tmp = temp_dir();
        let path = tmp.join("scu.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_report(&path).unwrap_err();
        assert!(matches!(err, ScuBuildError::Validation { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn summary_lines_per_outcome() {
        let lines = summary_lines(&sample());
        assert_eq!(
            lines,
            [
                "scene [cpp]: 16 files in 3 units (2 stale removed)",
                "modules/minimp3 [cpp]: no sources",
                "modules/bmp [cpp]: skipped, main folder /engine/modules/bmp not found",
                "core [cpp]: gated by module_mbedtls_enabled",
            ]
        );
    }
}
