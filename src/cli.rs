use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "robin-bot")]
#[command(version)]
#[command(about = "Chat bot for Robin rooms that follows room merges")]
pub struct Args {
    /// Account name (defaults to $ROBIN_USERNAME)
    #[arg(long, short)]
    pub username: Option<String>,

    /// Account password (defaults to $ROBIN_PASSWORD)
    #[arg(long, short)]
    pub password: Option<String>,

    /// TOML file overriding endpoints and display settings
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Do not answer !dice commands
    #[arg(long)]
    pub no_dice: bool,
}
