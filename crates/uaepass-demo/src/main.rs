//! `uaepass-demo` - UAE PASS login from the terminal
//!
//! Opens the authorize page in the system browser, takes the redirect URL
//! back on stdin and shows the signed-in profile.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod browser;
mod cli;
mod settings;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uaepass_demo=info,uaepass_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting uaepass-demo");

    let args = Args::parse();
    args.run().await
}
