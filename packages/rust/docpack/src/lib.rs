//! Packs class reference XML into a C header the engine compiles in.
//!
//! The XML sources are concatenated, zlib-compressed and emitted as an
//! `unsigned char` array together with the compressed and uncompressed sizes,
//! which the editor uses to inflate the docs at startup.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use tracing::{debug, info, instrument, warn};

use scubuild_shared::{Result, ScuBuildError};

/// Extension of documentation sources; anything else handed to [`pack_docs`] is ignored.
pub const DOC_EXTENSION: &str = "xml";

/// Identifiers used in the generated header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    /// Include guard macro.
    pub guard: String,
    /// Symbol prefix; `<prefix>_compressed`, `<prefix>_compressed_size`, ...
    pub symbol: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            guard: "_DOC_DATA_RAW_H".into(),
            symbol: "_doc_data".into(),
        }
    }
}

/// Outcome of a [`pack_docs`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPackSummary {
    pub target: PathBuf,
    /// Number of XML files that were packed.
    pub files: usize,
    pub uncompressed_size: usize,
    pub compressed_size: usize,
}

/// All `*.xml` files directly inside each of `dirs`, sorted by path.
///
/// Missing folders are skipped with a warning.
pub fn collect_doc_sources(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "doc folder not found");
            continue;
        }
        let read = std::fs::read_dir(dir).map_err(|e| ScuBuildError::io(dir, e))?;
        for item in read {
            let path = item.map_err(|e| ScuBuildError::io(dir, e))?.path();
            if path.is_file() && is_doc_source(&path) {
                sources.push(path);
            }
        }
    }

    sources.sort();
    sources.dedup();
    Ok(sources)
}

fn is_doc_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DOC_EXTENSION)
}

/// Concatenate the XML `sources` (in the given order), compress them and write
/// the header to `target`.
#[instrument(skip_all, fields(target = %target.display(), sources = sources.len()))]
pub fn pack_docs(sources: &[PathBuf], target: &Path, names: &HeaderNames) -> Result<DocPackSummary> {
    let mut buf = Vec::new();
    let mut files = 0;

    for src in sources {
        if !is_doc_source(src) {
            debug!(path = %src.display(), "ignoring non-xml source");
            continue;
        }
        let content = std::fs::read_to_string(src).map_err(|e| ScuBuildError::io(src, e))?;
        buf.extend_from_slice(content.as_bytes());
        files += 1;
    }

    let compressed = compress(&buf)?;
    let header = render_header(&compressed, buf.len(), names);

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ScuBuildError::io(parent, e))?;
    }
    std::fs::write(target, header).map_err(|e| ScuBuildError::io(target, e))?;

    info!(
        files,
        uncompressed = buf.len(),
        compressed = compressed.len(),
        "doc header written"
    );

    Ok(DocPackSummary {
        target: target.to_path_buf(),
        files,
        uncompressed_size: buf.len(),
        compressed_size: compressed.len(),
    })
}

/// zlib-compress at the default level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ScuBuildError::pack(format!("zlib compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ScuBuildError::pack(format!("zlib finalization failed: {e}")))
}

/// Header text for already-compressed data. No newline follows the closing `#endif`.
pub fn render_header(compressed: &[u8], uncompressed_size: usize, names: &HeaderNames) -> String {
    let HeaderNames { guard, symbol } = names;
    let mut out = String::with_capacity(256 + compressed.len() * 6);

    out.push_str("/* THIS FILE IS GENERATED DO NOT EDIT */\n");
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");
    let _ = writeln!(
        out,
        "static const int {symbol}_compressed_size = {};",
        compressed.len()
    );
    let _ = writeln!(
        out,
        "static const int {symbol}_uncompressed_size = {uncompressed_size};"
    );
    let _ = writeln!(out, "static const unsigned char {symbol}_compressed[] = {{");
    for byte in compressed {
        let _ = writeln!(out, "\t{byte},");
    }
    out.push_str("};\n");
    out.push_str("#endif");

    out
}
