use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use tg_modbot::auth::sign_init_data;
use tg_modbot::config;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Print a signed X-Init-Data value for calling the panel API locally"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Telegram user id to sign for (must be on the moderator roster)
    #[arg(long)]
    user_id: i64,

    /// Display name embedded in the user object
    #[arg(long, default_value = "Moderator")]
    first_name: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    if !cfg.telegram.moderators.contains(&args.user_id) {
        bail!("user {} is not in telegram.moderators", args.user_id);
    }

    let user = json!({ "id": args.user_id, "first_name": args.first_name }).to_string();
    let auth_date = Utc::now().timestamp().to_string();
    let init_data = sign_init_data(
        &cfg.telegram.bot_token,
        &[("auth_date", auth_date.as_str()), ("user", user.as_str())],
    );
    println!("{}", init_data);
    Ok(())
}
