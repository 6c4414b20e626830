//! Unit file output.
//!
//! Units are written atomically (temp file, then rename) so an interrupted run
//! never leaves a half-written translation unit for the build tool to pick up.

use std::collections::BTreeSet;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use scubuild_shared::{IncludeEntry, Result, ScuBuildError, UnitKind, UnitRecord};

use crate::GENERATED_MARKER;

/// Files written and removed by a single [`emit`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitSummary {
    /// Grouped units first, then exception units, in write order.
    pub units: Vec<UnitRecord>,
    /// Generated files deleted before writing whose names were not written again.
    pub removed_stale: usize,
}

/// `scu_core.gen.cpp`, `scu_core_1.gen.cpp`, ...
pub fn grouped_unit_name(prefix: &str, index: usize, extension: &str) -> String {
    format!("{prefix}{}{GENERATED_MARKER}.{extension}", index_suffix(index))
}

/// `scu_core_exception.gen.cpp`, `scu_core_exception_1.gen.cpp`, ...
pub fn exception_unit_name(prefix: &str, index: usize, extension: &str) -> String {
    format!(
        "{prefix}_exception{}{GENERATED_MARKER}.{extension}",
        index_suffix(index)
    )
}

fn index_suffix(index: usize) -> String {
    if index == 0 {
        String::new()
    } else {
        format!("_{index}")
    }
}

/// Text of a unit: one `#include` line per entry, each newline-terminated.
pub fn render_unit(entries: &[IncludeEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.include_line());
        text.push('\n');
    }
    text
}

/// Write grouped and exception units into `output_dir`.
///
/// The directory is created if needed. Every `*.gen.<extension>` file already
/// in it is removed first, so units for since-deleted sources never linger.
#[instrument(skip_all, fields(dir = %output_dir.display(), prefix = %prefix, extension = %extension))]
pub fn emit(
    chunks: &[Vec<IncludeEntry>],
    exceptions: &[IncludeEntry],
    output_dir: &Path,
    prefix: &str,
    extension: &str,
) -> Result<EmitSummary> {
    if !output_dir.is_dir() {
        std::fs::create_dir_all(output_dir).map_err(|e| ScuBuildError::io(output_dir, e))?;
        info!(path = %output_dir.display(), "created output folder");
    }

    let removed = remove_units(output_dir, extension)?;
    let mut units = Vec::with_capacity(chunks.len() + exceptions.len());

    for (index, chunk) in chunks.iter().enumerate() {
        let name = grouped_unit_name(prefix, index, extension);
        units.push(write_unit(output_dir, &name, UnitKind::Grouped, chunk)?);
    }

    for (index, entry) in exceptions.iter().enumerate() {
        let name = exception_unit_name(prefix, index, extension);
        units.push(write_unit(
            output_dir,
            &name,
            UnitKind::Exception,
            std::slice::from_ref(entry),
        )?);
    }

    let written: BTreeSet<&str> = units.iter().map(|u| u.file_name.as_str()).collect();
    let removed_stale = removed
        .iter()
        .filter(|name| !written.contains(name.as_str()))
        .count();

    Ok(EmitSummary {
        units,
        removed_stale,
    })
}

/// Delete generated units of `extension` from `output_dir`.
///
/// A missing directory is not an error and removes nothing.
pub fn clear_stale_units(output_dir: &Path, extension: &str) -> Result<usize> {
    Ok(remove_units(output_dir, extension)?.len())
}

/// Delete generated units of `extension`, returning the removed file names.
fn remove_units(output_dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let suffix = format!("{GENERATED_MARKER}.{extension}");
    let read = std::fs::read_dir(output_dir).map_err(|e| ScuBuildError::io(output_dir, e))?;
    let mut removed = Vec::new();

    for item in read {
        let item = item.map_err(|e| ScuBuildError::io(output_dir, e))?;
        let path = item.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(&suffix) && path.is_file() {
            let name = name.to_string();
            std::fs::remove_file(&path).map_err(|e| ScuBuildError::io(&path, e))?;
            debug!(path = %path.display(), "removed generated unit");
            removed.push(name);
        }
    }

    Ok(removed)
}

fn write_unit(
    dir: &Path,
    name: &str,
    kind: UnitKind,
    entries: &[IncludeEntry],
) -> Result<UnitRecord> {
    let text = render_unit(entries);
    let target = dir.join(name);
    let temp = dir.join(format!(".{name}.tmp"));

    std::fs::write(&temp, &text).map_err(|e| ScuBuildError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, &target) {
        let _ = std::fs::remove_file(&temp);
        return Err(ScuBuildError::io(&target, e));
    }

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(file = %name, entries = entries.len(), "generated unit");

    Ok(UnitRecord {
        file_name: name.to_string(),
        kind,
        entries: entries.len(),
        sha256,
    })
}
