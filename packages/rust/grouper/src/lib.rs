//! Unit grouper: turns a module's source folders into generated SCU units.
//!
//! The three steps are kept separate so each can be tested on its own:
//! [`discover`] scans folders, [`partition`] splits the sorted entry list,
//! and [`emit`] writes the unit files into the module's `.scu` directory.

mod emit;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use scubuild_shared::{IncludeEntry, ModuleSpec, Result, ScuBuildError};

pub use emit::{
    EmitSummary, clear_stale_units, emit, exception_unit_name, grouped_unit_name, render_unit,
};

/// Directory (inside each main folder) that receives generated units.
pub const SCU_DIR_NAME: &str = ".scu";

/// Marker placed before the extension of every generated file.
pub const GENERATED_MARKER: &str = ".gen";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Sources found for one module, already split and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Entries to be grouped, in lexicographic order.
    pub entries: Vec<IncludeEntry>,
    /// Entries whose stem is in the exception set, in lexicographic order.
    pub exceptions: Vec<IncludeEntry>,
    /// Folders listed by the module that do not exist on disk.
    pub missing_dirs: Vec<PathBuf>,
}

impl Discovery {
    /// Total number of discovered files.
    pub fn len(&self) -> usize {
        self.entries.len() + self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exceptions.is_empty()
    }
}

/// Discover all sources of a module, across every extension it lists.
pub fn discover_module(root: &Path, module: &ModuleSpec) -> Result<Discovery> {
    discover(root, &module.dirs, &module.extensions, &module.exceptions)
}

/// Scan `dirs` (main folder first, then sub-folders of it) for files with one
/// of `extensions`.
///
/// Scanning is not recursive. Hidden files and previously generated
/// `*.gen.<ext>` files are ignored. Missing folders are reported in
/// [`Discovery::missing_dirs`] instead of failing.
#[instrument(skip_all, fields(main = dirs.first().map(AsRef::as_ref).unwrap_or("")))]
pub fn discover<S: AsRef<str>>(
    root: &Path,
    dirs: &[S],
    extensions: &[S],
    exceptions: &[S],
) -> Result<Discovery> {
    let Some(main) = dirs.first() else {
        return Err(ScuBuildError::validation("module lists no folders"));
    };
    let main = trim_folder(main.as_ref());

    let exception_stems: BTreeSet<&str> = exceptions.iter().map(AsRef::as_ref).collect();
    let mut grouped = BTreeSet::new();
    let mut isolated = BTreeSet::new();
    let mut missing_dirs = Vec::new();

    let mut folders = vec![main.to_string()];
    folders.extend(
        dirs[1..]
            .iter()
            .map(|sub| format!("{main}/{}", trim_folder(sub.as_ref()))),
    );

    for folder in &folders {
        let abs = root.join(folder);
        if !abs.is_dir() {
            warn!(folder = %abs.display(), "source folder not found");
            missing_dirs.push(abs);
            continue;
        }

        for file_name in list_sources(&abs, extensions)? {
            let entry = IncludeEntry::new(format!("{folder}/{file_name}"));
            if exception_stems.contains(entry.stem()) {
                isolated.insert(entry);
            } else {
                grouped.insert(entry);
            }
        }
    }

    let discovery = Discovery {
        entries: grouped.into_iter().collect(),
        exceptions: isolated.into_iter().collect(),
        missing_dirs,
    };

    debug!(
        entries = discovery.entries.len(),
        exceptions = discovery.exceptions.len(),
        missing = discovery.missing_dirs.len(),
        "discovery complete"
    );

    Ok(discovery)
}

/// File names in `dir` that match one of the extensions.
fn list_sources<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Result<Vec<String>> {
    let read = std::fs::read_dir(dir).map_err(|e| ScuBuildError::io(dir, e))?;
    let mut names = Vec::new();

    for item in read {
        let item = item.map_err(|e| ScuBuildError::io(dir, e))?;
        let path = item.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if !IncludeEntry::is_includable(name) {
            warn!(path = %path.display(), "skipping file name that cannot be #included");
            continue;
        }
        if extensions.iter().any(|ext| is_source_of(name, ext.as_ref())) {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// `name` has extension `ext` and is not itself a generated unit.
fn is_source_of(name: &str, ext: &str) -> bool {
    let Some(base) = name
        .strip_suffix(ext)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    !base.is_empty() && !base.ends_with(GENERATED_MARKER)
}

fn trim_folder(folder: &str) -> &str {
    folder.trim_end_matches(['/', '\\'])
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Split sorted entries into units of at most `max_per_unit` includes.
///
/// `0` yields a single unit. Otherwise the number of units is
/// `ceil(len / max_per_unit)` and entries are spread evenly over them, the
/// final unit taking whatever remains. Empty input yields no units.
pub fn partition(entries: &[IncludeEntry], max_per_unit: usize) -> Vec<Vec<IncludeEntry>> {
    if entries.is_empty() {
        return Vec::new();
    }

    let unit_count = if max_per_unit == 0 {
        1
    } else {
        entries.len().div_ceil(max_per_unit).max(1)
    };
    let per_unit = entries.len().div_ceil(unit_count).max(1);

    entries.chunks(per_unit).map(<[IncludeEntry]>::to_vec).collect()
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Section name derived from a main folder: `scene/3d` → `scene_3d`.
pub fn section_name(main_folder: &str) -> String {
    main_folder
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("_")
}

/// File name prefix for a main folder's units: `scu_<section>`.
pub fn unit_prefix(main_folder: &str) -> String {
    format!("scu_{}", section_name(main_folder))
}

/// Absolute `.scu` output directory of a main folder.
pub fn output_dir(root: &Path, main_folder: &str) -> PathBuf {
    root.join(trim_folder(main_folder)).join(SCU_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scub-grouper-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "// source\n").unwrap();
    }

    fn entries(paths: &[&str]) -> Vec<IncludeEntry> {
        paths.iter().map(|p| IncludeEntry::new(*p)).collect()
    }

    fn paths(entries: &[IncludeEntry]) -> Vec<&str> {
        entries.iter().map(IncludeEntry::path).collect()
    }

    #[test]
    fn discover_collects_sorted_entries_from_main_and_sub_folders() {
        let tmp = temp_dir();
        touch(&tmp, "scene/node.cpp");
        touch(&tmp, "scene/main/viewport.cpp");
        touch(&tmp, "scene/2d/sprite.cpp");
        touch(&tmp, "scene/2d/sprite.h");
        touch(&tmp, "scene/2d/deep/ignored.cpp");

        let found = discover(&tmp, &["scene", "main", "2d"], &["cpp"], &[]).unwrap();

        assert_eq!(
            paths(&found.entries),
            ["scene/2d/sprite.cpp", "scene/main/viewport.cpp", "scene/node.cpp"]
        );
        assert!(found.exceptions.is_empty());
        assert!(found.missing_dirs.is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_skips_generated_and_hidden_files() {
        let tmp = temp_dir();
        touch(&tmp, "main/main.cpp");
        touch(&tmp, "main/scu_main.gen.cpp");
        touch(&tmp, "main/.scratch.cpp");
        touch(&tmp, "main/notes.cpp.txt");

        let found = discover(&tmp, &["main"], &["cpp"], &[]).unwrap();
        assert_eq!(paths(&found.entries), ["main/main.cpp"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[cfg(unix)]
    #[test]
    fn discover_skips_names_that_break_include_lines() {
        let tmp = temp_dir();
        touch(&tmp, "core/object.cpp");
        touch(&tmp, "core/say\"hi\".cpp");
        touch(&tmp, "core/back\\slash.cpp");

        let found = discover(&tmp, &["core"], &["cpp"], &[]).unwrap();
        assert_eq!(
            paths(&found.entries),
            ["core/back\\slash.cpp", "core/object.cpp"]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_separates_exceptions_by_stem() {
        let tmp = temp_dir();
        touch(&tmp, "servers/audio_server.cpp");
        touch(&tmp, "servers/rendering/rasterizer.cpp");
        touch(&tmp, "servers/rendering/shader_language.cpp");

        let found = discover(
            &tmp,
            &["servers", "rendering"],
            &["cpp"],
            &["shader_language"],
        )
        .unwrap();

        assert_eq!(
            paths(&found.entries),
            ["servers/audio_server.cpp", "servers/rendering/rasterizer.cpp"]
        );
        assert_eq!(
            paths(&found.exceptions),
            ["servers/rendering/shader_language.cpp"]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_merges_extensions() {
        let tmp = temp_dir();
        touch(&tmp, "modules/enet/enet_socket.cpp");
        touch(&tmp, "modules/enet/enet/host.c");

        let found = discover(&tmp, &["modules/enet", "enet"], &["cpp", "c"], &[]).unwrap();
        assert_eq!(
            paths(&found.entries),
            ["modules/enet/enet/host.c", "modules/enet/enet_socket.cpp"]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_reports_missing_sub_folder_and_keeps_going() {
        let tmp = temp_dir();
        touch(&tmp, "drivers/png/image_loader_png.cpp");

        let found = discover(&tmp, &["drivers", "png", "alsa"], &["cpp"], &[]).unwrap();
        assert_eq!(paths(&found.entries), ["drivers/png/image_loader_png.cpp"]);
        assert_eq!(found.missing_dirs, vec![tmp.join("drivers/alsa")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_missing_main_folder_is_empty() {
        let tmp = temp_dir();
        let found = discover(&tmp, &["modules/bmp"], &["cpp"], &[]).unwrap();
        assert!(found.is_empty());
        assert_eq!(found.missing_dirs, vec![tmp.join("modules/bmp")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_dedups_repeated_sub_folders() {
        let tmp = temp_dir();
        touch(&tmp, "modules/opensimplex/thirdparty/open-simplex-noise.c");

        let found = discover(
            &tmp,
            &["modules/opensimplex", "thirdparty", "thirdparty/"],
            &["c"],
            &[],
        )
        .unwrap();
        assert_eq!(found.len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partition_zero_max_is_single_unit() {
        let list = entries(&["a.cpp", "b.cpp", "c.cpp"]);
        let units = partition(&list, 0);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0], list);
    }

    #[test]
    fn partition_spreads_evenly() {
        let list: Vec<_> = (0..10).map(|i| IncludeEntry::new(format!("f{i:02}.cpp"))).collect();

        let sizes: Vec<_> = partition(&list, 4).iter().map(Vec::len).collect();
        assert_eq!(sizes, [4, 4, 2]);

        let sizes: Vec<_> = partition(&list[..9], 4).iter().map(Vec::len).collect();
        assert_eq!(sizes, [3, 3, 3]);

        let sizes: Vec<_> = partition(&list, 10).iter().map(Vec::len).collect();
        assert_eq!(sizes, [10]);

        let sizes: Vec<_> = partition(&list, 1).iter().map(Vec::len).collect();
        assert_eq!(sizes, [1; 10]);
    }

    #[test]
    fn partition_preserves_every_entry_once() {
        let list: Vec<_> = (0..23).map(|i| IncludeEntry::new(format!("f{i:02}.cpp"))).collect();
        for max in 0..30 {
            let flat: Vec<_> = partition(&list, max).into_iter().flatten().collect();
            assert_eq!(flat, list, "max_per_unit = {max}");
        }
    }

    #[test]
    fn partition_empty_input() {
        assert!(partition(&[], 0).is_empty());
        assert!(partition(&[], 8).is_empty());
    }

    #[test]
    fn section_names() {
        assert_eq!(section_name("scene"), "scene");
        assert_eq!(section_name("scene/3d"), "scene_3d");
        assert_eq!(section_name("modules/freetype/"), "modules_freetype");
        assert_eq!(unit_prefix("modules/bmp"), "scu_modules_bmp");
    }

    #[test]
    fn output_dir_is_inside_main_folder() {
        let root = Path::new("/engine");
        assert_eq!(output_dir(root, "modules/bmp/"), root.join("modules/bmp/.scu"));
    }
}
