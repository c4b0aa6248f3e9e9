// Command-line front end for jarpatch.
//
// Parses arguments with clap, builds a `PipelineConfig`, runs the pipeline
// with a `LogReporter`, and maps the outcome to an exit code. This is the
// only place the process is terminated.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, CommandFactory, Parser, ValueEnum, ValueHint};

use crate::backend::{ArchiveBackend, DiffBackend};
use crate::config::{DEFAULT_ARCHIVE_TOOL, DEFAULT_DELTA_BUNDLE, DEFAULT_DIFF_TOOL, PatchSet, PipelineConfig};
use crate::error::{ErrorCategory, EXIT_MISSING_INPUT, EXIT_OK, PatchError};
use crate::pipeline::Pipeline;
use crate::report::LogReporter;

// ---------------------------------------------------------------------------
// Banner and notice
// ---------------------------------------------------------------------------

const NOTICE: &str = "\
Notice:
Please do not automate downloading the Forge installer - please direct your users to manually download it instead.
Forge is a free open source project that relies on Patreon and adfocus download links, automated downloads hurt
this revenue which makes it harder to pay for server hosting costs and development time as a result.

Forge installer downloads: https://files.minecraftforge.net | Patreon: https://www.patreon.com/LexManos
";

const AFTER_HELP: &str = "\
Examples:
  jarpatch -i forge-installer.jar -o patched-installer.jar -V
  jarpatch --input forge-installer.jar --output patched-installer.jar --archive-backend zip

Exit codes:
  0 - OK
  1 - Missing required arg(s)
  2 - Patching error";

fn banner() -> String {
    let title = format!("jarpatch v{}", env!("CARGO_PKG_VERSION"));
    let rule = "-".repeat(title.len());
    format!("{title}\n{rule}")
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Patch members of a jar archive with binary deltas.
#[derive(Parser, Debug)]
#[command(
    name = "jarpatch",
    version,
    about = "Patch members of a jar archive with binary deltas",
    disable_version_flag = true,
    after_help = AFTER_HELP
)]
struct Cli {
    /// Jar archive to patch.
    #[arg(short = 'i', long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Path of the patched jar to create.
    #[arg(short = 'o', long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Tar bundle holding one delta per member.
    #[arg(long, value_hint = ValueHint::FilePath, default_value = DEFAULT_DELTA_BUNDLE)]
    patches: PathBuf,

    /// JSON member list (default: the built-in Forge installer set).
    #[arg(long, value_hint = ValueHint::FilePath)]
    members: Option<PathBuf>,

    /// Directory for extracted and patched files; also searched for tools.
    #[arg(long = "work-dir", value_hint = ValueHint::DirPath, default_value = ".")]
    work_dir: PathBuf,

    /// Archive implementation.
    #[arg(long = "archive-backend", value_enum, default_value_t = ArchiveArg::Jar)]
    archive_backend: ArchiveArg,

    /// Delta decoder implementation.
    #[arg(long = "diff-backend", value_enum, default_value_t = DiffArg::Xdelta3)]
    diff_backend: DiffArg,

    /// Archive tool executable for the jar backend.
    #[arg(long = "archive-tool", default_value = DEFAULT_ARCHIVE_TOOL)]
    archive_tool: String,

    /// Diff tool executable for the xdelta3 backend.
    #[arg(long = "diff-tool", default_value = DEFAULT_DIFF_TOOL)]
    diff_tool: String,

    /// Leave extracted and patched files in the working directory.
    #[arg(long = "keep-work-files")]
    keep_work_files: bool,

    /// Print progress details (use twice for debug output).
    #[arg(short = 'V', long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only print errors.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ArchiveArg {
    Jar,
    Zip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiffArg {
    Xdelta3,
    Vcdiff,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Options {
    input: PathBuf,
    output: PathBuf,
    patches: PathBuf,
    members: Option<PathBuf>,
    work_dir: PathBuf,
    archive_backend: ArchiveArg,
    diff_backend: DiffArg,
    archive_tool: String,
    diff_tool: String,
    keep_work_files: bool,
    quiet: bool,
    verbose: u8,
}

fn resolve_options(cli: Cli) -> Result<Options, &'static str> {
    let input = cli
        .input
        .ok_or("Missing an input, please specify an -i or --input argument.")?;
    let output = cli
        .output
        .ok_or("Missing an output, please specify an -o or --output argument.")?;

    Ok(Options {
        input,
        output,
        patches: cli.patches,
        members: cli.members,
        work_dir: cli.work_dir,
        archive_backend: cli.archive_backend,
        diff_backend: cli.diff_backend,
        archive_tool: cli.archive_tool,
        diff_tool: cli.diff_tool,
        keep_work_files: cli.keep_work_files,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
    })
}

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn archive_backend(opts: &Options) -> Result<ArchiveBackend, String> {
    match opts.archive_backend {
        ArchiveArg::Jar => Ok(ArchiveBackend::Jar {
            tool: opts.archive_tool.clone(),
        }),
        #[cfg(feature = "embedded-archive")]
        ArchiveArg::Zip => Ok(ArchiveBackend::Zip),
        #[cfg(not(feature = "embedded-archive"))]
        ArchiveArg::Zip => Err("the zip archive backend needs the `embedded-archive` feature".into()),
    }
}

fn diff_backend(opts: &Options) -> Result<DiffBackend, String> {
    match opts.diff_backend {
        DiffArg::Xdelta3 => Ok(DiffBackend::Xdelta3 {
            tool: opts.diff_tool.clone(),
        }),
        #[cfg(feature = "embedded-diff")]
        DiffArg::Vcdiff => Ok(DiffBackend::Vcdiff),
        #[cfg(not(feature = "embedded-diff"))]
        DiffArg::Vcdiff => Err("the vcdiff diff backend needs the `embedded-diff` feature".into()),
    }
}

/// Backends are argument errors (exit 1); a bad member list is a pipeline
/// prerequisite failure (exit 2).
enum ConfigError {
    Usage(String),
    Patch(PatchError),
}

fn build_config(opts: &Options) -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::new(&opts.input, &opts.output);
    config.delta_bundle = opts.patches.clone();
    config.work_dir = opts.work_dir.clone();
    config.keep_work_files = opts.keep_work_files;
    config.archive = archive_backend(opts).map_err(ConfigError::Usage)?;
    config.diff = diff_backend(opts).map_err(ConfigError::Usage)?;
    if let Some(path) = &opts.members {
        config.patch_set = PatchSet::load(path).map_err(ConfigError::Patch)?;
    }
    Ok(config)
}

/// What to check next, by failure class.
fn failure_hint(e: &PatchError) -> &'static str {
    match e.category() {
        ErrorCategory::MissingPrerequisite => {
            "Check that the input jar, the delta bundle and the required tools are present."
        }
        ErrorCategory::ToolFailure => {
            "Make sure the delta bundle was built for this exact input jar."
        }
        ErrorCategory::Io => "Check permissions and free space in the output and working directories.",
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn print_help() {
    let mut cmd = Cli::command();
    // Help goes to stdout; nothing useful to do if that fails.
    let _ = cmd.print_help();
    println!();
    println!("{NOTICE}");
}

/// Main CLI entry point. Parses arguments, runs the pipeline, exits.
pub fn run() -> ! {
    if std::env::args_os().len() <= 1 {
        print_help();
        process::exit(EXIT_OK);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_MISSING_INPUT } else { EXIT_OK };
            let _ = e.print();
            process::exit(code);
        }
    };

    let opts = match resolve_options(cli) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("jarpatch: {msg}");
            process::exit(EXIT_MISSING_INPUT);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if !opts.quiet {
        println!("{}", banner());
        println!("{NOTICE}");
    }

    let config = match build_config(&opts) {
        Ok(config) => config,
        Err(ConfigError::Usage(msg)) => {
            eprintln!("jarpatch: {msg}");
            process::exit(EXIT_MISSING_INPUT);
        }
        Err(ConfigError::Patch(e)) => {
            eprintln!("jarpatch: {e}");
            if !opts.quiet {
                eprintln!("{}", failure_hint(&e));
            }
            process::exit(e.exit_code());
        }
    };

    if !opts.quiet {
        println!(
            "Creating patched jar \"{}\" based on \"{}\"...",
            opts.output.display(),
            opts.input.display()
        );
    }

    let reporter = LogReporter;
    match Pipeline::new(config, &reporter).run() {
        Ok(report) => {
            if !opts.quiet {
                println!(
                    "Success! You can find your patched jar at \"{}\"",
                    report.output.display()
                );
            }
            process::exit(EXIT_OK);
        }
        Err(e) => {
            // Already logged by the reporter; repeat it when logging is off.
            if !log::log_enabled!(log::Level::Error) {
                eprintln!("jarpatch: {e}");
            }
            if !opts.quiet {
                eprintln!("{}", failure_hint(&e.source));
            }
            process::exit(e.exit_code());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
