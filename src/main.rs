use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use issue_scout::config::{find_config_file, get_config, load_config, Config};
use issue_scout::models::{QuotaState, Record};
use issue_scout::{QueryCandidates, QuotaResource, RepositoryClient};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Issue Scout - Search, list and create records on a remote issue tracker
#[derive(Parser, Debug)]
#[command(name = "issue-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quota-aware search and record creation for a remote issue tracker", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API credential (overrides config and ISSUE_SCOUT_TOKEN / GITHUB_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Accept any server certificate (for intercepting proxies)
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the credential can reach the API
    Check,

    /// Search open records, trying each query until one matches
    #[command(alias = "s")]
    Search {
        /// Explicit search query; repeat to add fallback candidates in order
        #[arg(long = "query", value_name = "QUERY")]
        queries: Vec<String>,

        /// Collection (owner/name) for the built-in label-then-title candidates
        #[arg(long, conflicts_with = "queries")]
        repo: Option<String>,

        /// Label the first built-in candidate filters on
        #[arg(long, default_value = "type:story")]
        label: String,

        /// Title marker the fallback built-in candidate matches
        #[arg(long, default_value = "[STORY]")]
        title_marker: String,
    },

    /// List open records of a collection
    #[command(alias = "ls")]
    List {
        /// Collection (owner/name)
        repo: String,

        /// Only records carrying this label (repeatable)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,
    },

    /// Create a record
    Create {
        /// Collection (owner/name)
        repo: String,

        /// Record title
        #[arg(long, short)]
        title: String,

        /// Record body
        #[arg(long, short, default_value = "")]
        body: String,

        /// Label to attach (repeatable)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,
    },

    /// Add a comment to a record
    Comment {
        /// Collection (owner/name)
        repo: String,

        /// Record number
        number: u64,

        /// Comment text
        text: String,
    },

    /// Show the remaining API quota
    Quota,

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => get_config()?,
    };

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("issue_scout={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match &cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "issue-scout",
                &mut std::io::stdout(),
            );
        }
        Commands::Check => {
            let mut client = build_client(&cli, &config)?;
            if !client.check_connectivity().await {
                bail!("Connectivity check failed");
            }
            if !cli.quiet {
                println!("OK");
            }
        }
        Commands::Search {
            queries,
            repo,
            label,
            title_marker,
        } => {
            let candidates = if !queries.is_empty() {
                queries.iter().cloned().collect::<QueryCandidates>()
            } else if let Some(repo) = repo {
                QueryCandidates::label_then_title(repo, label, title_marker)
            } else {
                bail!("Provide at least one --query or a --repo");
            };

            let mut client = connect(&cli, &config).await?;
            let records = client.search(&candidates).await?;
            tracing::info!("Found {} records", records.len());
            output_records(&records, cli.output);
        }
        Commands::List { repo, labels } => {
            let mut client = connect(&cli, &config).await?;
            let records = client.list(repo, labels).await?;
            output_records(&records, cli.output);
        }
        Commands::Create {
            repo,
            title,
            body,
            labels,
        } => {
            let mut client = connect(&cli, &config).await?;
            let record = client.create(repo, title, body, labels).await?;
            output_records(std::slice::from_ref(&record), cli.output);
        }
        Commands::Comment { repo, number, text } => {
            let mut client = connect(&cli, &config).await?;
            client.append_comment(repo, *number, text).await?;
            if !cli.quiet {
                println!("Commented on #{}", number);
            }
        }
        Commands::Quota => {
            let mut client = connect(&cli, &config).await?;
            client.refresh_quota().await?;
            let states: Vec<QuotaState> = [QuotaResource::Core, QuotaResource::Search]
                .into_iter()
                .filter_map(|resource| client.quota(resource))
                .collect();
            output_quota(&states, cli.output)?;
        }
    }

    Ok(())
}

fn build_client(cli: &Cli, config: &Config) -> Result<RepositoryClient> {
    let mut client_config = config.client_config(cli.token.as_deref());
    if cli.insecure {
        client_config = client_config.verify_certificates(false);
    }
    if client_config.token.trim().is_empty() {
        bail!("No credential configured; pass --token or set ISSUE_SCOUT_TOKEN or GITHUB_TOKEN");
    }
    Ok(RepositoryClient::new(client_config)?)
}

/// Build a client and stop early if the credential does not work
async fn connect(cli: &Cli, config: &Config) -> Result<RepositoryClient> {
    let mut client = build_client(cli, config)?;
    if !client.check_connectivity().await {
        bail!("Connectivity check failed; verify the credential and network access");
    }
    Ok(client)
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn output_records(records: &[Record], format: OutputFormat) {
    match resolve_format(format) {
        OutputFormat::Json => match serde_json::to_string_pretty(records) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Could not render records as JSON: {}", e),
        },
        OutputFormat::Plain => {
            for record in records {
                println!("{}", record);
                if !record.labels.is_empty() {
                    println!("  Labels: {}", record.labels.join(", "));
                }
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["#", "Title", "Labels", "URL"]);

            for record in records {
                table.add_row(vec![
                    Cell::new(record.id),
                    Cell::new(truncate(&record.title, 60)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&record.labels.join(", "), 30)),
                    Cell::new(&record.url),
                ]);
            }
            println!("{table}");
        }
    }
}

fn output_quota(states: &[QuotaState], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(states)?);
        }
        OutputFormat::Plain => {
            for state in states {
                println!(
                    "{}: {} remaining, resets {}",
                    state.resource,
                    state.remaining,
                    state.reset_at.to_rfc3339()
                );
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Resource", "Remaining", "Limit", "Resets"]);

            for state in states {
                table.add_row(vec![
                    Cell::new(state.resource),
                    Cell::new(state.remaining),
                    Cell::new(state.limit.map(|l| l.to_string()).unwrap_or_default()),
                    Cell::new(state.reset_at.format("%Y-%m-%d %H:%M:%S UTC")),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
