//! Catalint CLI
//!
//! Checks translated message catalogs against declarative rule files

mod commands;
mod output;

use catalint_core::init_tracing;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "catalint")]
#[command(about = "Rule-based checks for translated message catalogs")]
#[command(version = catalint_core::VERSION)]
#[command(
    long_about = "catalint validates translations against declarative rule files.\n\
Each rule has a trigger pattern, optional exceptions and a hint.\n\
\n\
Examples:\n  \
catalint validate --rules rules --catalog po/ca/dolphin.po\n  \
catalint validate --rules rules --catalog ca.po --format json --fail-on-diagnostic\n  \
catalint rules list --rules rules --locale ca\n  \
catalint rules explain punctuation-colon --rules rules --locale ca"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        help = "Path to configuration file (.catalintrc.toml, catalint.yaml, ...)"
    )]
    config: Option<PathBuf>,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Generate shell completion script
    #[arg(
        long,
        value_enum,
        help = "Generate completion script for specified shell"
    )]
    generate_completion: Option<Shell>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check catalogs against a rule directory
    #[command(alias = "check")]
    Validate(ValidateArgs),

    /// Inspect the rules of a rule directory
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Rule directories
    #[arg(long = "rules", value_name = "DIR", help = "Rule directory (repeatable)")]
    rules: Vec<PathBuf>,

    /// Catalogs to check
    #[arg(
        long = "catalog",
        value_name = "FILE",
        required = true,
        help = "Catalog file, .po/.pot or .json (repeatable)"
    )]
    catalogs: Vec<PathBuf>,

    /// Locale of the catalogs and of rule files directly in the rule directory
    #[arg(long, value_name = "CODE")]
    locale: Option<String>,

    /// Number of worker threads
    #[arg(
        short = 'j',
        long,
        help = "Number of worker threads (default: number of CPU cores)"
    )]
    jobs: Option<usize>,

    /// Exit with code 1 when any diagnostic is reported
    #[arg(long)]
    fail_on_diagnostic: bool,

    /// Operating environment
    #[arg(long = "env", value_name = "NAME")]
    environment: Option<String>,

    /// Only apply rules bound to the operating environment
    #[arg(long = "env-only")]
    environment_only: bool,

    /// Word lists for `lexicon` exceptions
    #[arg(
        long = "lexicon",
        value_name = "NAME=PATH",
        value_parser = parse_lexicon,
        help = "Word list for lexicon tests, as name=path (repeatable)"
    )]
    lexicons: Vec<(String, PathBuf)>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Report messages whose locale has no rule set
    #[arg(long)]
    strict_locale: bool,

    /// Print diagnostics as they are found instead of in catalog order
    #[arg(long)]
    unordered: bool,

    /// Also check fuzzy entries
    #[arg(long)]
    include_fuzzy: bool,
}

#[derive(Subcommand)]
enum RulesAction {
    /// List the rules of each locale
    List {
        #[command(flatten)]
        source: RuleSourceArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show everything about one rule
    Explain {
        /// Rule id
        rule_id: String,

        #[command(flatten)]
        source: RuleSourceArgs,
    },
}

#[derive(clap::Args)]
struct RuleSourceArgs {
    /// Rule directories
    #[arg(long = "rules", value_name = "DIR")]
    rules: Vec<PathBuf>,

    /// Locale for rule files directly in the rule directory
    #[arg(long, value_name = "CODE")]
    locale: Option<String>,

    /// Operating environment
    #[arg(long = "env", value_name = "NAME")]
    environment: Option<String>,
}

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored lines followed by a summary
    Human,
    /// One JSON document
    Json,
    /// Plain lines only
    Compact,
}

fn parse_lexicon(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("Invalid lexicon '{s}'. Expected 'name=path'")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle shell completion generation
    if let Some(shell) = cli.generate_completion {
        generate_completion_script(shell);
        return ExitCode::SUCCESS;
    }

    // Colors follow the terminal unless switched off
    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "catalint=warn",
        1 => "catalint=info",
        2 => "catalint=debug",
        _ => "catalint=trace",
    };
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", log_level);
        }
    }
    init_tracing();

    match run_command(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            commands::error_exit_code()
        }
    }
}

fn generate_completion_script(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Validate(args)) => commands::validate_command(
            commands::ValidateOptions {
                rules: args.rules,
                catalogs: args.catalogs,
                locale: args.locale,
                jobs: args.jobs,
                fail_on_diagnostic: args.fail_on_diagnostic,
                environment: args.environment,
                environment_only: args.environment_only,
                lexicons: args.lexicons,
                format: args.format,
                strict_locale: args.strict_locale,
                unordered: args.unordered,
                include_fuzzy: args.include_fuzzy,
            },
            cli.config,
        ),

        Some(Commands::Rules { action }) => match action {
            RulesAction::List { source, json } => commands::rules_list_command(
                commands::RuleSource {
                    rules: source.rules,
                    locale: source.locale,
                    environment: source.environment,
                },
                json,
                cli.config,
            ),
            RulesAction::Explain { rule_id, source } => commands::rules_explain_command(
                &rule_id,
                commands::RuleSource {
                    rules: source.rules,
                    locale: source.locale,
                    environment: source.environment,
                },
                cli.config,
            ),
        },

        None => {
            Cli::command().print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}
