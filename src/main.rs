use clap::Parser;
use colored::*;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use robin_bot::cli::Args;
use robin_bot::dice::{format_roll, DiceSpec};
use robin_bot::{Credentials, RobinClient, RobinConfig};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Print chat lines and answer commands.
fn register_handlers(client: &RobinClient, dice: bool) {
    client.on("chat", |payload| {
        let from = payload.get("from").and_then(|v| v.as_str()).unwrap_or("?");
        let body = payload.get("body").and_then(|v| v.as_str()).unwrap_or("");
        println!("{} {}", format!("<{}>", from).bright_cyan(), body);
    });

    client.on("vote", |payload| {
        let from = payload.get("from").and_then(|v| v.as_str()).unwrap_or("?");
        let vote = payload.get("vote").and_then(|v| v.as_str()).unwrap_or("?");
        println!("{}", format!("* {} voted {}", from, vote).bright_magenta());
    });

    if !dice {
        return;
    }

    let actions = client.actions();
    client.on_command("dice", move |args, from| {
        let reply = match DiceSpec::from_args(args) {
            Ok(spec) => format_roll(from, spec, &spec.roll(&mut rand::thread_rng())),
            Err(reason) => format!("{}: {}", from, reason),
        };
        let actions = actions.clone();
        tokio::spawn(async move {
            if let Err(e) = actions.send(&reply).await {
                warn!(error = %e, "could not post dice result");
            }
        });
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = RobinConfig::load(args.config.as_deref())?;
    let credentials = Credentials::resolve(args.username, args.password)?;

    let mut client = RobinClient::new(config, credentials)?;
    register_handlers(&client, !args.no_dice);
    client.on_disconnect(|e| match std::error::Error::source(e) {
        Some(cause) => eprintln!("{} {} ({})", "disconnected:".bright_red(), e, cause),
        None => eprintln!("{} {}", "disconnected:".bright_red(), e),
    });

    client.init().await?;

    let outcome = tokio::select! {
        res = client.run() => res,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    if let Err(e) = client.shutdown().await {
        warn!(error = %e, "error while closing the room socket");
    }

    if let Err(e) = outcome {
        error!(error = %e, "bot stopped");
        return Err(e.into());
    }
    Ok(())
}
