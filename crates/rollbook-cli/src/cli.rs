use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rollbook",
    about = "Tamper-evident ledger for student records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Mirror database URL (overrides the configuration file)
    #[arg(long, global = true)]
    pub database: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Audit every persisted block
    Verify,
    /// Show the most recent blocks
    Chain(ChainArgs),
    /// Show one block by hash
    Show(ShowArgs),
    /// List persisted blocks of one event kind
    Blocks(BlocksArgs),
    /// Count persisted blocks per event kind
    Kinds,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct ChainArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub hash: String,
}

#[derive(Args, Debug)]
pub struct BlocksArgs {
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "rollbook",
            "chain",
            "-n",
            "5",
            "--format",
            "json",
            "--database",
            "sqlite://x.db",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.database.as_deref(), Some("sqlite://x.db"));
        assert!(matches!(cli.command, Command::Chain(ChainArgs { limit: 5 })));
    }

    #[test]
    fn serve_bind_is_parsed() {
        let cli = Cli::parse_from(["rollbook", "serve", "--bind", "0.0.0.0:9000"]);
        match cli.command {
            Command::Serve(args) => assert_eq!(args.bind.map(|a| a.port()), Some(9000)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
