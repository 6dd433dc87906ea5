use anyhow::Result;
use clap::{Parser, Subcommand};
use mcp_hub_registry::Platform;
use tracing::Level;

mod commands;

/// Resolve MCP server command functions from the hub into run descriptors.
#[derive(Parser, Debug)]
#[command(name = "mcp-hub", version, about)]
struct Cli {
    /// Hub directory with one YAML entry per server (falls back to MCP_HUB_CONFIG_PATH, then ./hub)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Only process this hub entry
    #[arg(short, long, global = true)]
    mcp: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve every entry and print the catalog as JSON
    Resolve {
        /// Image tag used in the published image name
        #[arg(short, long, default_value = "latest")]
        tag: String,
    },
    /// Rewrite build recipes so they launch the resolved command
    Inject {
        #[arg(long, value_enum, default_value_t = Platform::Docker)]
        platform: Platform,

        /// Substitute property values from the environment instead of writing `$name` placeholders
        #[arg(long)]
        substitute: bool,

        /// Print the rewritten recipe instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Substitute values from the environment and print the launch command with secrets redacted
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let hub_dir = mcp_hub_registry::hub_dir(cli.config.as_deref());
    let only = cli.mcp.as_deref();
    match cli.command {
        Command::Resolve { tag } => commands::resolve(&hub_dir, only, tag).await,
        Command::Inject {
            platform,
            substitute,
            dry_run,
        } => {
            let options = commands::InjectOptions {
                platform,
                substitute,
                dry_run,
            };
            commands::inject(&hub_dir, only, options).await
        }
        Command::Check => commands::check(&hub_dir, only),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.as_str().to_lowercase());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let cli = Cli::try_parse_from(["mcp-hub", "inject", "--platform", "unikraft", "-m", "qdrant", "-c", "~/hub"]).unwrap();
        assert_eq!(cli.mcp.as_deref(), Some("qdrant"));
        assert_eq!(cli.config.as_deref(), Some("~/hub"));
        assert!(matches!(
            cli.command,
            Command::Inject {
                platform: Platform::Unikraft,
                substitute: false,
                dry_run: false
            }
        ));
    }
}
