//! 🚀 esx: the front door to the bulk formatter.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Thin wrapper: sets up logging, loads config, then lets `esx` do the heavy lifting.
//! Like a manager. 🦆
//!
//! ```text
//! esx format batch.json [--tag app.logs]      # print the NDJSON body
//! esx check 200 response.json                 # print the flush verdict
//! esx send batch.json [--tag app.logs]        # format, POST, judge
//! ```

mod sender;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use esx::{AppConfig, BulkFormatter, FlushVerdict};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::sender::BulkSender;

#[derive(Debug, Parser)]
#[command(name = "esx", version, about = "📡 Format log batches into Elasticsearch bulk payloads")]
struct Cli {
    /// 🔧 TOML config file. ESX_* environment variables are merged in either way.
    #[arg(long, short, global = true, default_value = "esx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 🖨️ Format a JSON batch and print the bulk body to stdout.
    Format {
        batch: PathBuf,
        #[arg(long, default_value = "esx")]
        tag: String,
    },
    /// 🚦 Judge a bulk response the way a flush would.
    Check { status: u16, response: PathBuf },
    /// 📡 Format a JSON batch and POST it to the configured endpoint.
    Send {
        batch: PathBuf,
        #[arg(long, default_value = "esx")]
        tag: String,
    },
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(FlushVerdict::Success) => Ok(()),
        Ok(FlushVerdict::Retry) => {
            error!("🔁 the cluster did not accept the whole batch, it should be retried");
            std::process::exit(1);
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<FlushVerdict> {
    let app_config = load(&cli.config)?;
    let formatter = BulkFormatter::new(&app_config.output)
        .context("💀 The [output] section parsed, but the formatter refused it. Check the patterns.")?;

    match cli.command {
        Command::Format { batch, tag } => {
            let payload = format_file(&formatter, &batch, &tag).await?;
            print!("{}", String::from_utf8_lossy(&payload));
            Ok(FlushVerdict::Success)
        }
        Command::Check { status, response } => {
            let payload = tokio::fs::read(&response).await.with_context(|| {
                format!("💀 Could not read response file '{}'", response.display())
            })?;
            let verdict = formatter.check_response(status, &payload, &[]);
            println!("{verdict:?}");
            Ok(verdict)
        }
        Command::Send { batch, tag } => {
            let endpoint = app_config.endpoint.context(
                "💀 `send` needs an [endpoint] section with at least a url. We can't POST to vibes.",
            )?;
            let payload = format_file(&formatter, &batch, &tag).await?;
            let sender = BulkSender::new(endpoint)?;
            let reply = sender.send(payload.clone()).await?;
            let verdict = formatter.check_response(reply.status, &reply.body, &payload);
            info!("🚦 HTTP {} → {verdict:?}", reply.status);
            Ok(verdict)
        }
    }
}

/// 🔧 A missing config file is fine: env vars and defaults carry on without it.
fn load(config_file: &Path) -> Result<AppConfig> {
    let exists = config_file.try_exists().with_context(|| {
        format!(
            "💀 Couldn't even check whether '{}' exists. Permissions, maybe?",
            config_file.display()
        )
    })?;
    esx::app_config::load_config(exists.then_some(config_file))
        .context("💀 Couldn't load the config. Make sure you didn't forget something obvious.")
}

async fn format_file(formatter: &BulkFormatter, batch: &Path, tag: &str) -> Result<Vec<u8>> {
    let data = tokio::fs::read(batch)
        .await
        .with_context(|| format!("💀 Could not read batch file '{}'", batch.display()))?;
    let buffer = formatter
        .format(&data, tag)
        .with_context(|| format!("💀 Could not format batch '{}'", batch.display()))?;
    Ok(buffer.into_bytes())
}
