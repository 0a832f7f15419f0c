use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wa-capture")]
#[command(version, about = "Relay inbound WhatsApp contacts to a webhook")]
pub struct Cli {
    /// Config file (defaults to ./wa-capture.toml when present)
    #[arg(short, long, env = "WA_CAPTURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP status server port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Webhook receiving captured contacts
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Directory for persisted session credentials
    #[arg(long)]
    pub auth_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}
