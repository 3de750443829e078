use std::io::{self, BufRead};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracker_service::auth::password::{generate_jwt_secret, hash_password};
use tracker_service::bootstrap::bootstrap;

#[derive(Parser)]
#[command(name = "polymarket-tracker")]
#[command(about = "Polymarket portfolio tracker and dashboard API", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the background poller (default).
    Serve,
    /// Checks a running instance over HTTP; exits non-zero when it is unhealthy.
    Healthcheck {
        #[arg(long, default_value = "http://127.0.0.1:8000/health")]
        url: String,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
    /// Print AUTH_PASSWORD_HASH and JWT_SECRET_KEY lines for a new deployment.
    HashPassword {
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => bootstrap().await,
        Commands::Healthcheck { url, timeout_secs } => {
            healthcheck(&url, Duration::from_secs(timeout_secs)).await
        }
        Commands::HashPassword { password } => print_credentials(password),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn healthcheck(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build http client")?;
    let status = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?
        .status();
    if !status.is_success() {
        bail!("{url} answered {status}");
    }
    Ok(())
}

fn print_credentials(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }

    let hash = hash_password(&password).context("Failed to hash password")?;
    println!("AUTH_PASSWORD_HASH={hash}");
    println!("JWT_SECRET_KEY={}", generate_jwt_secret());
    Ok(())
}
