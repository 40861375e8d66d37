// crates/linkpack-cli/src/main.rs
// ============================================================================
// Module: Linkpack CLI Entry Point
// Description: Command dispatcher for the link-and-pack pipeline.
// Purpose: Run the pipeline against a local repository from the shell.
// Dependencies: clap, linkpack-config, linkpack-core, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The linkpack CLI loads configuration, links a repository's packages
//! against each other and packs them into the artifact cache. The resulting
//! package-name to artifact map is written to stdout as JSON. Diagnostics go
//! to stderr through `tracing`, filtered by `RUST_LOG`.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use linkpack_config::LinkpackConfig;
use linkpack_core::ArtifactMap;
use linkpack_core::LinkRequest;
use linkpack_core::Linker;
use linkpack_core::PipelineSettings;
use linkpack_core::SystemCommandRunner;
use linkpack_core::Tracer;
use linkpack_core::TracingTracer;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "linkpack=info,linkpack_core=info";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "linkpack", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Link local packages to each other and pack them into the cache.
    Link(LinkCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a linkpack configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for the `link` command.
#[derive(Args, Debug)]
struct LinkCommand {
    /// Repository whose packages are linked.
    #[arg(long, value_name = "DIR")]
    repo: PathBuf,
    /// Origin repository recorded as build inputs (defaults to the repository).
    #[arg(long, value_name = "DIR")]
    origin: Option<PathBuf>,
    /// Optional config file path (defaults to linkpack.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Native binary dependency for the primary package, as NAME=SPECIFIER.
    #[arg(long = "native-override", value_name = "NAME=SPECIFIER", value_parser = parse_override)]
    native_override: Vec<(String, String)>,
    /// Overrides the artifact cache root.
    #[arg(long, value_name = "DIR")]
    cache_root: Option<PathBuf>,
    /// Overrides the bound on concurrent pack invocations.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1 ..))]
    max_concurrency: Option<u16>,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to linkpack.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_logging();
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Link(command) => command_link(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Installs the stderr log subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// SECTION: Link Command
// ============================================================================

/// Executes the `link` command.
async fn command_link(command: LinkCommand) -> CliResult<ExitCode> {
    let config = LinkpackConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let settings = apply_overrides(config.into_settings(), &command);
    let request = build_request(&command);
    let linker = Linker::new(settings, SystemCommandRunner);

    let artifacts = linker
        .link(request)
        .await
        .map_err(|err| CliError::new(format!("link failed: {err}")))?;
    info!(packages = artifacts.len(), "packed local packages");

    let rendered = render_artifacts(&artifacts)?;
    write_stdout_line(&rendered)
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Applies command-line overrides on top of configured settings.
fn apply_overrides(mut settings: PipelineSettings, command: &LinkCommand) -> PipelineSettings {
    if let Some(root) = &command.cache_root {
        settings.cache.root.clone_from(root);
    }
    if let Some(limit) = command.max_concurrency {
        settings.build_tool.max_concurrency = Some(usize::from(limit));
    }
    settings
}

/// Builds the pipeline request for a `link` invocation.
fn build_request(command: &LinkCommand) -> LinkRequest {
    let tracer: Arc<dyn Tracer> = Arc::new(TracingTracer::root("link"));
    let mut request = LinkRequest::new(&command.repo).tracer(tracer);
    if let Some(origin) = &command.origin {
        request = request.origin_dir(origin);
    }
    if !command.native_override.is_empty() {
        let entries: BTreeMap<String, String> = command.native_override.iter().cloned().collect();
        request = request.native_dependency_override(entries);
    }
    request
}

/// Renders the artifact map as pretty JSON.
fn render_artifacts(artifacts: &ArtifactMap) -> CliResult<String> {
    serde_json::to_string_pretty(artifacts)
        .map_err(|err| CliError::new(format!("failed to render artifacts: {err}")))
}

/// Parses a `NAME=SPECIFIER` override entry.
fn parse_override(raw: &str) -> Result<(String, String), String> {
    let Some((name, specifier)) = raw.split_once('=') else {
        return Err(format!("expected NAME=SPECIFIER, got `{raw}`"));
    };
    let name = name.trim();
    let specifier = specifier.trim();
    if name.is_empty() || specifier.is_empty() {
        return Err(format!("expected NAME=SPECIFIER, got `{raw}`"));
    }
    Ok((name.to_string(), specifier.to_string()))
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = LinkpackConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
