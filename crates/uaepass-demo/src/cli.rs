use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use uaepass_auth::{AuthService, AuthStatus, Config, FileStorage, MemoryStorage, StorageBackends};

use crate::browser::SystemBrowser;
use crate::settings;

/// Sign in with UAE PASS from the terminal
#[derive(Debug, Parser)]
#[command(name = "uaepass-demo")]
#[command(about = "Sign in with UAE PASS from the terminal")]
#[command(version)]
pub struct Args {
    /// Path to config.json (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the durable session file (defaults to the user data directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Print URLs instead of opening the browser
    #[arg(long, global = true)]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a sandbox configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Sign in and show the profile
    Login,
    /// Show the current session
    Status,
    /// Sign out locally and at UAE PASS
    Logout,
}

impl Args {
    pub async fn run(&self) -> anyhow::Result<()> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(settings::default_config_path);

        if let Command::Init { force } = self.command {
            settings::write_sample(&config_path, force).await?;
            println!("Wrote {}", config_path.display());
            return Ok(());
        }

        let config = settings::load_config(&config_path).await?;
        let service = self.service(config)?;

        match self.command {
            Command::Init { .. } => Ok(()),
            Command::Login => login(&service).await,
            Command::Status => {
                print_status(&service);
                Ok(())
            }
            Command::Logout => {
                service.logout()?;
                println!("Signed out.");
                Ok(())
            }
        }
    }

    fn service(&self, config: Config) -> anyhow::Result<AuthService> {
        let session_file = self
            .session_file
            .clone()
            .unwrap_or_else(settings::default_session_path);

        let service = AuthService::builder(config)
            .storage(StorageBackends::new(
                MemoryStorage::shared(),
                Arc::new(FileStorage::new(session_file)),
            ))
            .navigator(Arc::new(SystemBrowser::new(!self.no_browser)))
            .build()?;
        Ok(service)
    }
}

async fn login(service: &AuthService) -> anyhow::Result<()> {
    if service.is_authenticated() {
        println!("Already signed in. Run `uaepass-demo logout` first to switch accounts.");
        print_status(service);
        return Ok(());
    }

    println!("Sign in with UAE PASS at:");
    service.login()?;

    println!("After signing in, paste the URL you were redirected to:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let callback = lines
        .next_line()
        .await
        .context("failed to read callback URL")?
        .unwrap_or_default();

    if let Err(e) = service.handle_callback(&callback).await {
        anyhow::bail!("sign-in failed: {e}");
    }

    if service.status() == AuthStatus::Authenticated {
        print_status(service);
    } else {
        println!("The URL carried no authorization response; nothing to do.");
    }
    Ok(())
}

fn print_status(service: &AuthService) {
    let state = service.state();
    println!("Status: {}", state.status);

    if let Some(tokens) = &state.tokens {
        match tokens.expires_at() {
            Some(at) => println!("Token expires: {}", at.to_rfc3339()),
            None => println!("Token expires: unknown"),
        }
    }

    if let Some(profile) = &state.profile {
        let language = &service.config().language;
        if let Some(name) = profile.display_name(language) {
            println!("Name: {name}");
        }
        if let Some(email) = &profile.email {
            println!("Email: {email}");
        }
        if let Some(user_type) = &profile.user_type {
            println!("Account type: {user_type}");
        }
    }

    if let Some(error) = &state.error {
        println!("Error: {error}");
    }
}
