use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};
use url::Url;

use tg_modbot::actions::ActionProcessor;
use tg_modbot::auth::InitDataVerifier;
use tg_modbot::config;
use tg_modbot::notify::{self, NotificationDispatcher, TelegramMessenger};
use tg_modbot::poller::PollWatcher;
use tg_modbot::server::{self, AppState};
use tg_modbot::site::{HttpSiteApi, SiteApi};
use tg_modbot::state::ModerationState;
use tg_modbot::{commands, keepalive};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let panel_url = cfg.app.panel_url().context("invalid app.public_url")?;
    let roster = cfg.telegram.moderators.clone();

    let bot = notify::build_bot(&cfg.telegram.bot_token, cfg.app.request_timeout())?;
    let site: Arc<dyn SiteApi> = Arc::new(HttpSiteApi::from_config(&cfg)?);
    let state = ModerationState::new();
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        roster.clone(),
        panel_url.clone(),
    ));

    let watcher = PollWatcher::new(
        Arc::clone(&site),
        Arc::clone(&state),
        Arc::clone(&dispatcher),
        cfg.app.poll_interval(),
        cfg.app.poll_startup_delay(),
    );
    tokio::spawn(watcher.run());

    if let Some(url) = &cfg.app.keepalive_url {
        let url = Url::parse(url).context("invalid app.keepalive_url")?;
        let client = reqwest::Client::builder()
            .timeout(cfg.app.request_timeout())
            .build()?;
        let interval = std::time::Duration::from_secs(cfg.app.keepalive_interval_secs);
        tokio::spawn(keepalive::run(client, url, interval));
    }

    let app_state = Arc::new(AppState {
        verifier: InitDataVerifier::new(&cfg.telegram.bot_token, roster.iter().copied()),
        processor: ActionProcessor::new(Arc::clone(&site), Arc::clone(&state)),
        state: Arc::clone(&state),
        dispatcher: Arc::clone(&dispatcher),
        webhook_secret: cfg.site.webhook_secret.clone(),
        share_webhook_dedup: cfg.app.share_webhook_dedup,
        panel_html: PathBuf::from(&cfg.app.panel_html),
    });
    let addr = cfg.app.socket_addr().context("invalid app.listen_addr")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, panel = %panel_url, "http server listening");
    let http = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, server::build_router(app_state)).await {
            error!(?err, "http server stopped");
        }
    });

    info!("starting telegram bot");
    let bot_roster = Arc::new(roster);
    let bot_panel_url = Arc::new(panel_url);
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let roster = Arc::clone(&bot_roster);
        let panel_url = Arc::clone(&bot_panel_url);
        async move {
            if let Err(err) = commands::handle_message(&bot, &msg, &roster, &panel_url).await {
                error!(?err, "failed to handle command");
            }
            respond(())
        }
    })
    .await;

    http.abort();
    Ok(())
}
