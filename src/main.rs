//! Binary entry point for spacesweep.
//!
//! This binary provides the CLI for sweeping, counting and inspecting spaces.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::struct_excessive_bools)]

use clap::{Parser, Subcommand};
use spacesweep::chain::GatewayWriter;
use spacesweep::graph::GraphqlClient;
use spacesweep::observability::{self, ObservabilityConfig};
use spacesweep::sweep::{AuthorResolver, Caps, Enumerator, GraphOps, ProgressRecorder, TypeFilter};
use spacesweep::{GovernanceMode, ObjectId, Session, SpaceId, SweepConfig, SweepOptions, SweepRunner};
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Spacesweep - batched, governance-aware bulk deletion for graph spaces.
#[derive(Parser)]
#[command(name = "spacesweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Delete the contents of a space.
    Sweep {
        /// Target space id.
        #[arg(long)]
        space: String,

        /// The space is an ungoverned personal space.
        #[arg(long)]
        personal: bool,

        /// Enumerate and plan without writing.
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,

        /// Repeat passes until the space is empty or stops shrinking.
        #[arg(long)]
        drain: bool,

        /// Deletions per batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum objects per pass.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum relations per pass.
        #[arg(long)]
        limit_relations: Option<usize>,

        /// Maximum entities per pass.
        #[arg(long)]
        limit_entities: Option<usize>,

        /// Only delete objects of this type (repeatable).
        #[arg(long = "include-type")]
        include_types: Vec<String>,

        /// Never delete objects of this type (repeatable).
        #[arg(long = "exclude-type")]
        exclude_types: Vec<String>,

        /// Upper bound on drain passes.
        #[arg(long)]
        max_passes: Option<u32>,
    },

    /// Show entity and relation counts for a space.
    Counts {
        /// Target space id.
        #[arg(long)]
        space: String,
    },

    /// Look up the author object of a space without creating one.
    Author {
        /// Target space id.
        #[arg(long)]
        space: String,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability =
        match observability::init(ObservabilityConfig::from_sweep_config(&config, cli.verbose)) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Failed to initialize observability: {e}");
                return ExitCode::FAILURE;
            },
        };

    match run_command(cli.command, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: SweepConfig) -> spacesweep::Result<ExitCode> {
    match command {
        Commands::Sweep {
            space,
            personal,
            dry_run,
            yes,
            drain,
            batch_size,
            limit,
            limit_relations,
            limit_entities,
            include_types,
            exclude_types,
            max_passes,
        } => {
            let mode = if personal {
                GovernanceMode::Personal
            } else {
                GovernanceMode::Governed
            };
            let caps = Caps {
                max_items: limit,
                max_relations: limit_relations,
                max_entities: limit_entities,
            };
            let filter = parse_filter(&include_types, &exclude_types)?;
            let space = SpaceId::parse(&space)?;

            let mut options = SweepOptions::from_config(&config, space, mode)
                .with_caps(caps)
                .with_filter(filter)
                .with_drain(drain)
                .with_dry_run(dry_run);
            if let Some(size) = batch_size {
                options = options.with_batch_size(size);
            }
            if let Some(passes) = max_passes {
                options = options.with_max_passes(passes.max(1));
            }

            cmd_sweep(config, options, yes)
        },

        Commands::Counts { space } => cmd_counts(config, SpaceId::parse(&space)?),

        Commands::Author { space } => cmd_author(config, SpaceId::parse(&space)?),

        Commands::Config { show } => {
            cmd_config(&config, show);
            Ok(ExitCode::SUCCESS)
        },
    }
}

/// Loads configuration, then applies environment overrides.
fn load_config(path: Option<&str>) -> spacesweep::Result<SweepConfig> {
    // If a path is provided, load from that file
    let config = if let Some(config_path) = path {
        SweepConfig::load_from_file(Path::new(config_path))?
    } else {
        match std::env::var("SPACESWEEP_CONFIG_PATH") {
            Ok(config_path) if !config_path.trim().is_empty() => {
                SweepConfig::load_from_file(Path::new(config_path.trim()))?
            },
            _ => SweepConfig::load_default()?,
        }
    };
    config.with_env_overrides()
}

fn parse_filter(include: &[String], exclude: &[String]) -> spacesweep::Result<TypeFilter> {
    let mut filter = TypeFilter::any();
    for id in include {
        filter = filter.with_include(ObjectId::parse(id)?);
    }
    for id in exclude {
        filter = filter.with_exclude(ObjectId::parse(id)?);
    }
    Ok(filter)
}

/// Sweeps a space.
fn cmd_sweep(config: SweepConfig, options: SweepOptions, yes: bool) -> spacesweep::Result<ExitCode> {
    if !options.dry_run {
        config.require_operator_address()?;
    }

    let progress_path = config.progress_path(options.space);
    let session = Session::shared(config);
    let reader = GraphqlClient::new(Arc::clone(&session));
    let writer = GatewayWriter::new(Arc::clone(&session));

    if !options.dry_run && !yes && !confirm(&reader, &options)? {
        println!("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            // Second Ctrl-C: give up immediately.
            std::process::exit(130);
        }
        eprintln!("\nStopping after the current batch (Ctrl-C again to abort)...");
    }) {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let runner = SweepRunner::new(&reader, &writer, options)
        .with_recorder(ProgressRecorder::new(&progress_path))
        .with_stop_flag(stop);
    let report = runner.run()?;

    println!("{}", report.summary());
    if !report.dry_run {
        println!("  progress log: {}", progress_path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Shows what is about to be deleted and asks for confirmation.
fn confirm(reader: &GraphqlClient, options: &SweepOptions) -> spacesweep::Result<bool> {
    let counts = Enumerator::new(reader, options.page_size, options.schema.account_type_id)
        .with_operator_address(options.operator_address.clone())
        .counts(options.space, &options.filter)?;

    println!("Target space: {} ({})", options.space, options.mode);
    println!("Current contents: {counts}");
    if options.drain {
        println!(
            "Drain mode: up to {} passes of {} objects",
            options.max_passes, options.drain_chunk_size
        );
    }
    println!();
    println!("WARNING: Deletion is IRREVERSIBLE!");

    print!("\nProceed? [y/N] ");
    io::stdout()
        .flush()
        .map_err(|e| spacesweep::Error::OperationFailed {
            operation: "flush_stdout".to_string(),
            cause: e.to_string(),
        })?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| spacesweep::Error::OperationFailed {
            operation: "read_stdin".to_string(),
            cause: e.to_string(),
        })?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Prints counts for a space.
fn cmd_counts(config: SweepConfig, space: SpaceId) -> spacesweep::Result<ExitCode> {
    let page_size = config.batch.page_size;
    let account_type = config.schema.account_type_id;
    let operator = config.operator.address.clone();
    let session = Session::shared(config);
    let reader = GraphqlClient::new(session);

    let counts = Enumerator::new(&reader, page_size, account_type)
        .with_operator_address(operator)
        .counts(space, &TypeFilter::any())?;
    println!("{space}: {counts}");
    Ok(ExitCode::SUCCESS)
}

/// Prints the author object of a space, if one exists.
fn cmd_author(config: SweepConfig, space: SpaceId) -> spacesweep::Result<ExitCode> {
    let ops = GraphOps::new(&config.schema);
    let account_type = config.schema.account_type_id;
    let operator = config.operator.address.clone();
    let session = Session::shared(config);
    let reader = GraphqlClient::new(session);

    let resolver = AuthorResolver::new(&reader, &ops, account_type, operator);
    match resolver.lookup(space)? {
        Some(author) => {
            println!("Author: {}", author.id);
            println!("  address: {}", author.address);
            println!("  found by: {:?}", author.source);
        },
        None => println!("No author object in {space}; the first sweep batch will create one."),
    }
    Ok(ExitCode::SUCCESS)
}

/// Shows configuration.
fn cmd_config(config: &SweepConfig, show: bool) {
    if !show {
        println!("Use --show to display current configuration");
        return;
    }

    let set_or_unset = |present: bool| if present { "<set>" } else { "<unset>" };

    println!("Current Configuration:");
    println!("  Data Dir: {}", config.data_dir.display());
    println!("  GraphQL URL: {}", config.endpoints.graphql_url);
    println!("  Gateway URL: {}", config.endpoints.gateway_url);
    println!("  RPC URL: {}", config.endpoints.rpc_url);
    println!(
        "  Gateway Token: {}",
        set_or_unset(config.endpoints.gateway_token.is_some())
    );
    println!(
        "  Gateway HMAC Secret: {}",
        set_or_unset(config.endpoints.gateway_hmac_secret.is_some())
    );
    println!(
        "  Operator Address: {}",
        config.operator.address.as_deref().unwrap_or("<unset>")
    );
    println!(
        "  Personal Space: {}",
        config
            .operator
            .personal_space_id
            .map_or_else(|| "<unset>".to_string(), |s| s.to_string())
    );
    println!("  Batch Size: {}", config.batch.batch_size);
    println!("  Drain Chunk Size: {}", config.batch.drain_chunk_size);
    println!("  Page Size: {}", config.batch.page_size);
    println!("  Max Passes: {}", config.batch.max_passes);
    println!(
        "  Delays: direct {}ms, governed {}ms",
        config.timing.direct_delay_ms, config.timing.governed_delay_ms
    );
    println!(
        "  Confirmation: timeout {}ms, poll {}ms",
        config.timing.confirmation_timeout_ms, config.timing.confirmation_poll_ms
    );
    println!(
        "  Retry: {} retries, {}ms base backoff",
        config.retry.max_retries, config.retry.retry_backoff_ms
    );
    println!("  Voting Mode: {:?}", config.voting_mode);
    println!("  Account Type: {}", config.schema.account_type_id);
}
