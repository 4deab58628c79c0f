use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intake_gateway::channels::TelegramChannel;
use intake_gateway::db::{self, ProfileRepo};
use intake_gateway::extraction::{ExtractionModel, GeminiClient, PromptRequest};
use intake_gateway::{ApiServer, Config};

/// Intake - messaging webhook gateway with generative extraction
#[derive(Parser)]
#[command(name = "intake", version, about)]
struct Cli {
    /// Config file (default: ~/.config/intake/config.toml)
    #[arg(short, long, env = "INTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Register the Telegram webhook URL
    SetWebhook {
        /// Public URL of the `/telegram-webhook` endpoint
        url: String,
    },
    /// Add a user profile
    AddProfile {
        #[arg(long)]
        first_name: String,
        /// Phone number as the platform reports it (with or without '+')
        #[arg(long)]
        phone: String,
        /// Display name for display-name identification
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Send a one-line prompt to the model and print the reply
    CheckModel {
        #[arg(default_value = "Hello, reply with 'OK' if you see this.")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,intake_gateway=info",
        1 => "info,intake_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::SetWebhook { url } => set_webhook(&config, &url).await,
        Command::AddProfile {
            first_name,
            phone,
            display_name,
        } => add_profile(&config, &first_name, &phone, display_name.as_deref()),
        Command::CheckModel { prompt } => check_model(&config, &prompt).await,
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        database = %config.database_path.display(),
        "starting intake gateway"
    );

    let pool = db::init(&config.database_path)?;
    let server = ApiServer::from_config(config, pool)?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

async fn set_webhook(config: &Config, url: &str) -> anyhow::Result<()> {
    let telegram = config
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not configured"))?;

    TelegramChannel::new(telegram.bot_token.clone())
        .set_webhook(url, telegram.webhook_secret.as_deref())
        .await?;

    println!("Telegram webhook set to {url}");
    Ok(())
}

fn add_profile(
    config: &Config,
    first_name: &str,
    phone: &str,
    display_name: Option<&str>,
) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let profile = ProfileRepo::new(pool).create(first_name, Some(phone), display_name)?;

    println!("Added profile {} ({first_name}, {phone})", profile.id);
    Ok(())
}

async fn check_model(config: &Config, prompt: &str) -> anyhow::Result<()> {
    let client = GeminiClient::new(&config.model)?;
    println!("Sending request to {}...", client.model());

    let reply = client.generate(&PromptRequest::plain(prompt)).await?;
    println!("{reply}");
    Ok(())
}
