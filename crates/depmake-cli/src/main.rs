#![forbid(unsafe_code)]

mod output;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, ValueEnum};
use depmake_core::config::{self, Overrides};
use depmake_core::emit::write_makefile;
use depmake_core::graph::ResolutionStrategy;
use depmake_core::plan::LinkScope;
use output::{CliError, OutputMode, PlanOutput, render, render_error, render_plan_text};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "depmake: generate a Makefile from local #include dependencies",
    long_about = "Scan a C/C++ source tree, follow its quoted #include directives, \
                  and write a Makefile with one object rule per compilation unit.",
    after_help = "EXAMPLES:\n    # Write ./Makefile for a program whose main() is in main.cpp\n    depmake main.cpp\n\n    # Same, naming the entry point with a flag\n    depmake -x main.cpp\n\n    # Print the Makefile instead of writing it\n    depmake main.cpp --stdout\n\n    # Inspect the plan as JSON\n    depmake main.cpp --plan json"
)]
struct Cli {
    /// File containing the program's main() function.
    #[arg(value_name = "ENTRY", conflicts_with = "entry_flag")]
    entry: Option<String>,

    /// Entry point, as an alternative to the positional argument.
    #[arg(short = 'x', long = "entry", value_name = "ENTRY")]
    entry_flag: Option<String>,

    /// Project root to scan.
    #[arg(short = 'C', long = "root", value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Build file to write, relative to the project root.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the Makefile to stdout instead of writing it.
    #[arg(long, conflicts_with = "plan")]
    stdout: bool,

    /// Print the build plan instead of writing the Makefile.
    #[arg(long, value_enum, value_name = "FORMAT")]
    plan: Option<OutputMode>,

    /// Compiler command (`CC`).
    #[arg(long, value_name = "CMD")]
    compiler: Option<String>,

    /// Object file directory (`ODIR`).
    #[arg(long = "obj-dir", value_name = "DIR")]
    obj_dir: Option<String>,

    /// Compiler flags (`CXXFLAGS`).
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    flags: Option<String>,

    /// How a basename shared by several files is resolved.
    #[arg(long, value_enum)]
    resolution: Option<ResolutionArg>,

    /// Which compilation units are built and linked.
    #[arg(long, value_enum)]
    link: Option<LinkArg>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResolutionArg {
    /// First file with a matching name, in sorted directory order.
    FirstMatch,
    /// A file next to the includer first, then first-match.
    RelativeFirst,
}

impl From<ResolutionArg> for ResolutionStrategy {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::FirstMatch => Self::FirstMatch,
            ResolutionArg::RelativeFirst => Self::RelativeFirst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LinkArg {
    /// Every compilation unit in the tree.
    All,
    /// The entry point and units paired with headers it reaches.
    Reachable,
}

impl From<LinkArg> for LinkScope {
    fn from(arg: LinkArg) -> Self {
        match arg {
            LinkArg::All => Self::All,
            LinkArg::Reachable => Self::Reachable,
        }
    }
}

impl Cli {
    /// The entry point from either the positional argument or `-x`.
    fn entry_point(&self) -> Option<&str> {
        self.entry
            .as_deref()
            .or(self.entry_flag.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    /// Mode for everything printed besides the Makefile itself.
    fn output_mode(&self) -> OutputMode {
        self.plan.unwrap_or(OutputMode::Text)
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            compiler: self.compiler.clone(),
            flags: self.flags.clone(),
            object_dir: self.obj_dir.clone(),
            resolution: self.resolution.map(Into::into),
            link: self.link.map(Into::into),
            output_file: self.output.clone(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEPMAKE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "depmake=debug,depmake_core=debug,info"
        } else {
            "depmake=info,depmake_core=warn,warn"
        })
    });

    let format = env::var("DEPMAKE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let Some(entry) = cli.entry_point() else {
        debug!("no entry point supplied; showing usage");
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut config = config::load_config(&cli.root).map_err(depmake_core::Error::from)?;
    config.apply(cli.overrides());
    let config = config.validate().map_err(depmake_core::Error::from)?;

    let generated = depmake_core::generate(&cli.root, entry, &config)?;

    if let Some(mode) = cli.plan {
        let payload = PlanOutput {
            plan: &generated.plan,
            scan: generated.report,
            graph_hash: &generated.graph_hash,
        };
        return render(mode, &payload, render_plan_text);
    }

    if cli.stdout {
        print!("{}", generated.makefile);
        return Ok(());
    }

    let path = cli.root.join(&config.output.file);
    write_makefile(&path, &generated.makefile).map_err(depmake_core::Error::from)?;
    info!(path = %path.display(), units = generated.plan.units.len(), "build file written");
    println!("wrote {}", path.display());
    Ok(())
}

/// Map a failure to its exit code and render it.
fn report_failure(err: &anyhow::Error, mode: OutputMode) -> ExitCode {
    let (cli_error, code) = match err.downcast_ref::<depmake_core::Error>() {
        Some(core) => {
            let code = core.code();
            debug!(code = code.code(), summary = code.message(), "run failed");
            (CliError::from(core), code.exit_code())
        }
        None => (CliError::new(format!("{err:#}")), 1),
    };

    if render_error(mode, &cli_error).is_err() {
        eprintln!("error: {}", cli_error.message);
    }
    ExitCode::from(code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err, cli.output_mode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_entry_parses() {
        let cli = Cli::parse_from(["depmake", "main.cpp"]);
        assert_eq!(cli.entry_point(), Some("main.cpp"));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn flag_entry_parses() {
        let cli = Cli::parse_from(["depmake", "-x", "app.cc"]);
        assert_eq!(cli.entry_point(), Some("app.cc"));

        let cli = Cli::parse_from(["depmake", "--entry", "app.cc"]);
        assert_eq!(cli.entry_point(), Some("app.cc"));
    }

    #[test]
    fn positional_and_flag_conflict() {
        let result = Cli::try_parse_from(["depmake", "a.cpp", "-x", "b.cpp"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_entry_is_allowed_by_the_parser() {
        let cli = Cli::parse_from(["depmake"]);
        assert!(cli.entry_point().is_none());
    }

    #[test]
    fn blank_entry_counts_as_missing() {
        let cli = Cli::parse_from(["depmake", " "]);
        assert!(cli.entry_point().is_none());
    }

    #[test]
    fn stdout_conflicts_with_plan() {
        let result = Cli::try_parse_from(["depmake", "m.cpp", "--stdout", "--plan", "json"]);
        assert!(result.is_err());
    }

    #[test]
    fn plan_flag_sets_output_mode() {
        let cli = Cli::parse_from(["depmake", "m.cpp", "--plan", "json"]);
        assert_eq!(cli.output_mode(), OutputMode::Json);

        let cli = Cli::parse_from(["depmake", "m.cpp"]);
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn flags_accept_leading_hyphen() {
        let cli = Cli::parse_from(["depmake", "m.cpp", "--flags", "-O2 -Wall"]);
        assert_eq!(cli.overrides().flags.as_deref(), Some("-O2 -Wall"));
    }

    #[test]
    fn overrides_map_enums() {
        let cli = Cli::parse_from([
            "depmake",
            "m.cpp",
            "--resolution",
            "relative-first",
            "--link",
            "reachable",
            "--obj-dir",
            "build",
            "-o",
            "GNUmakefile",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.resolution, Some(ResolutionStrategy::RelativeFirst));
        assert_eq!(overrides.link, Some(LinkScope::Reachable));
        assert_eq!(overrides.object_dir.as_deref(), Some("build"));
        assert_eq!(overrides.output_file, Some(PathBuf::from("GNUmakefile")));
    }

    #[test]
    fn verbose_flag_parsed() {
        let cli = Cli::parse_from(["depmake", "-v", "m.cpp"]);
        assert!(cli.verbose);
    }
}
