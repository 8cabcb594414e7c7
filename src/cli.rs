//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "imx",
    version,
    about = "Export and incrementally update a local iMessage history"
)]
pub struct Cli {
    /// Message store path (defaults to ~/Library/Messages/chat.db).
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory holding the dataset snapshot and contact mappings
    /// (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Skip OS contact-directory lookups entirely.
    #[arg(long, global = true)]
    pub no_oracle: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract everything from scratch (the default).
    Full {
        /// Maximum number of rows to extract.
        #[arg(long, value_name = "N")]
        limit: Option<u64>,
    },
    /// Extract only messages newer than the last snapshot and merge them in.
    Update {
        /// Maximum number of rows to extract.
        #[arg(long, value_name = "N")]
        limit: Option<u64>,
    },
    /// Resolve remaining raw identifiers via the OS contact directory.
    Contacts {
        /// Maximum number of directory lookups.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Print the current snapshot's statistics.
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_valid() {
        let cli = Cli::try_parse_from(["imx"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.no_oracle);
    }

    #[test]
    fn update_with_limit_parses() {
        let cli = Cli::try_parse_from(["imx", "update", "--limit", "500"]).unwrap();
        match cli.command {
            Some(Commands::Update { limit }) => assert_eq!(limit, Some(500)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_apply_before_subcommand() {
        let cli = Cli::try_parse_from([
            "imx",
            "--database",
            "/tmp/chat.db",
            "--no-oracle",
            "full",
        ])
        .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/chat.db")));
        assert!(cli.no_oracle);
    }
}
