//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use scubuild_core::pipeline::{self, GenerateConfig, ProgressReporter};
use scubuild_core::report;
use scubuild_docpack::HeaderNames;
use scubuild_platform::{
    BuildProfile, FsProbe, Host, Linker, Lto, Optimize, Sanitizer, Target, Toolchain,
};
use scubuild_shared::{
    AppConfig, GenerationReport, ModuleOutcome, ModuleReport, ModuleTable, init_config,
    load_config, load_module_table, write_module_table,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// scubuild: unity build generation for the engine tree.
#[derive(Parser)]
#[command(
    name = "scubuild",
    version,
    about = "Generate SCU (unity build) source files, doc headers and platform flags.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format of the `flags` command.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum FlagsFormat {
    Shell,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate SCU units for every module of the module table.
    Generate {
        /// Engine root folder.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Module table (defaults to `<root>/<defaults.table_file>`).
        #[arg(long)]
        table: Option<PathBuf>,

        /// Active build feature, matched against module gates (repeatable).
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Cap uncapped modules at `defaults.release_max_per_unit` includes per unit.
        #[arg(long)]
        release: bool,

        /// Write the generation report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Pack class reference XML into a compressed C header.
    PackDocs {
        /// Header file to write.
        #[arg(long)]
        out: PathBuf,

        /// Folder whose `*.xml` files are packed (repeatable).
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        /// Include guard of the generated header.
        #[arg(long)]
        guard: Option<String>,

        /// Symbol prefix of the generated arrays.
        #[arg(long)]
        symbol: Option<String>,

        /// Individual XML files, packed before the folder contents.
        files: Vec<PathBuf>,
    },

    /// Print compiler and linker flags for the server platform.
    Flags {
        #[arg(long, default_value = "debug")]
        target: Target,

        #[arg(long, default_value = "speed")]
        optimize: Optimize,

        #[arg(long, default_value = "default")]
        linker: Linker,

        #[arg(long, default_value = "none")]
        lto: Lto,

        /// Sanitizer to enable (repeatable).
        #[arg(long = "sanitize")]
        sanitizers: Vec<Sanitizer>,

        /// Use clang/LLVM instead of GCC.
        #[arg(long)]
        use_llvm: bool,

        /// 32 or 64; defaults to the host word size.
        #[arg(long)]
        bits: Option<u32>,

        /// Target architecture (empty autodetects).
        #[arg(long, default_value = "")]
        arch: String,

        /// Omit debug info from release builds.
        #[arg(long)]
        no_debug_symbols: bool,

        /// Link libgcc and libstdc++ dynamically.
        #[arg(long)]
        no_static_cpp: bool,

        #[arg(long)]
        coverage: bool,

        /// Link libexecinfo.
        #[arg(long)]
        execinfo: bool,

        /// Parallel jobs, used for GCC's `-flto=<n>`.
        #[arg(short = 'j', long, default_value_t = 1)]
        jobs: usize,

        /// Use the system mbedtls instead of the bundled one.
        #[arg(long)]
        system_mbedtls: bool,

        #[arg(long, env = "CC", default_value = "gcc")]
        cc: String,

        #[arg(long, env = "CXX", default_value = "g++")]
        cxx: String,

        /// Output format.
        #[arg(long, default_value = "shell")]
        format: FlagsFormat,
    },

    /// Write a starter module table into an engine root.
    Init {
        /// Engine root folder.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "scubuild=info",
        1 => "scubuild=debug",
        _ => "scubuild=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose > 0;
    match cli.command {
        Command::Generate {
            root,
            table,
            features,
            release,
            report,
        } => cmd_generate(&root, table.as_deref(), features, release, report.as_deref(), verbose),
        Command::PackDocs {
            out,
            dirs,
            guard,
            symbol,
            files,
        } => cmd_pack_docs(&out, &dirs, guard, symbol, files),
        Command::Flags {
            target,
            optimize,
            linker,
            lto,
            sanitizers,
            use_llvm,
            bits,
            arch,
            no_debug_symbols,
            no_static_cpp,
            coverage,
            execinfo,
            jobs,
            system_mbedtls,
            cc,
            cxx,
            format,
        } => {
            let profile = BuildProfile {
                target,
                optimize,
                debug_symbols: !no_debug_symbols,
                bits,
                arch,
                use_llvm,
                linker,
                use_static_cpp: !no_static_cpp,
                use_coverage: coverage,
                sanitizers,
                lto,
                num_jobs: jobs,
                execinfo,
                builtin_mbedtls: !system_mbedtls,
                ..BuildProfile::default()
            };
            cmd_flags(&profile, Toolchain { cc, cxx, version: None }, &format)
        }
        Command::Init { root } => cmd_init(&root),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_generate(
    root: &Path,
    table: Option<&Path>,
    features: Vec<String>,
    release: bool,
    report_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let config = load_config()?;
    let root = std::path::absolute(root)
        .map_err(|e| eyre!("cannot resolve root '{}': {e}", root.display()))?;

    let table_path = match table {
        Some(path) => path.to_path_buf(),
        None => root.join(&config.defaults.table_file),
    };
    if !table_path.is_file() {
        return Err(eyre!(
            "no module table at '{}' (run `scubuild init` to create one)",
            table_path.display()
        ));
    }
    let table = load_module_table(&table_path)?;

    info!(root = %root.display(), table = %table_path.display(), "starting generation");

    let gen_config = GenerateConfig {
        root,
        table,
        features: features.into_iter().collect::<BTreeSet<_>>(),
        release,
        release_max_per_unit: config.defaults.release_max_per_unit,
    };

    let progress = CliProgress::new();
    let result = match pipeline::generate(&gen_config, &progress) {
        Ok(result) => result,
        Err(e) => {
            progress.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    if let Some(path) = report_path {
        report::write_report(path, &result)?;
    }

    print_generation(&result, verbose || config.defaults.verbose);
    if let Some(path) = report_path {
        println!("  Report:   {}", path.display());
    }
    println!();

    Ok(())
}

fn print_generation(result: &GenerationReport, list_units: bool) {
    println!();
    println!("  SCU generation complete.");
    println!("  Modules:  {}", result.modules.len());
    println!("  Units:    {}", result.unit_count());
    println!("  Folders:  {}", result.scu_folders.len());
    println!("  Skipped:  {}", result.skipped_count());
    println!("  Warnings: {}", result.warning_count());

    if list_units {
        println!();
        for line in report::summary_lines(result) {
            println!("  {line}");
        }
        for module in &result.modules {
            if let ModuleOutcome::Generated { units, .. } = &module.outcome {
                for unit in units {
                    println!("    {}/.scu/{}", module.main_folder, unit.file_name);
                }
            }
        }
    }

    for module in &result.modules {
        for warning in &module.warnings {
            println!("  warning: {}: {warning}", module.main_folder);
        }
    }
}

fn cmd_pack_docs(
    out: &Path,
    dirs: &[PathBuf],
    guard: Option<String>,
    symbol: Option<String>,
    files: Vec<PathBuf>,
) -> Result<()> {
    let mut sources = files;
    sources.extend(scubuild_docpack::collect_doc_sources(dirs)?);
    if sources.is_empty() {
        return Err(eyre!("no documentation sources given (pass files or --dir)"));
    }

    let defaults = HeaderNames::default();
    let names = HeaderNames {
        guard: guard.unwrap_or(defaults.guard),
        symbol: symbol.unwrap_or(defaults.symbol),
    };

    let summary = scubuild_docpack::pack_docs(&sources, out, &names)?;

    println!();
    println!("  Doc header written.");
    println!("  Files:        {}", summary.files);
    println!("  Uncompressed: {} bytes", summary.uncompressed_size);
    println!("  Compressed:   {} bytes", summary.compressed_size);
    println!("  Path:         {}", summary.target.display());
    println!();

    Ok(())
}

fn cmd_flags(profile: &BuildProfile, toolchain: Toolchain, format: &FlagsFormat) -> Result<()> {
    let host = Host::detect();
    let toolchain = toolchain.probe_version();
    let flags = scubuild_platform::configure(profile, &host, &toolchain, &FsProbe)?;

    match format {
        FlagsFormat::Shell => print!("{}", flags.to_shell()),
        FlagsFormat::Json => println!("{}", serde_json::to_string_pretty(&flags)?),
    }
    Ok(())
}

fn cmd_init(root: &Path) -> Result<()> {
    let config = load_config()?;
    let path = root.join(&config.defaults.table_file);
    write_module_table(&path, &ModuleTable::starter())?;
    println!("Module table written to: {}", path.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn module_started(&self, main_folder: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {main_folder}"));
    }

    fn module_finished(&self, _report: &ModuleReport) {}

    fn done(&self, _report: &GenerationReport) {
        self.spinner.finish_and_clear();
    }
}
