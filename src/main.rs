use anyhow::{Context, Result};
use killfeed::api::{create_router, ApiState};
use killfeed::commands::CommandHandler;
use killfeed::config::KillfeedConfig;
use killfeed::killboard::GameInfoClient;
use killfeed::notify::{DiscordSink, KillNotifier};
use killfeed::poller::KillPoller;
use killfeed::render::{load_font, GridComposer, GridLayout, RenderServiceIcons};
use killfeed::tracker::EntityTracker;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "killfeed=info".into()),
        )
        .init();

    info!("Killfeed starting...");

    let config = KillfeedConfig::load().context("Failed to load configuration")?;

    if config.discord.channel_id.trim().is_empty() {
        anyhow::bail!("discord.channel_id is required (or set KILLFEED_CHANNEL_ID)");
    }
    let bot_token =
        std::env::var("DISCORD_BOT_TOKEN").context("DISCORD_BOT_TOKEN is required")?;

    info!(
        api_base_url = %config.killboard.api_base_url,
        channel_id = %config.discord.channel_id,
        interval_secs = config.poll.interval_seconds,
        api_port = config.api.port,
        "Configuration loaded"
    );

    let http_client = reqwest::Client::builder()
        .timeout(config.poll.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let source = Arc::new(GameInfoClient::with_client(
        http_client.clone(),
        config.killboard.api_base_url.clone(),
    ));

    let icons = Arc::new(RenderServiceIcons::new(
        http_client.clone(),
        config.render.icon_base_url.clone(),
    ));
    let layout = GridLayout {
        columns: config.render.columns,
        icon_size: config.render.icon_size,
        padding: config.render.padding,
    };
    let mut composer = GridComposer::new(icons, layout).with_background(config.render.background);
    match &config.render.font_path {
        Some(path) => match load_font(path) {
            Ok(font) => composer = composer.with_font(font, config.render.font_size),
            Err(e) => warn!(error = %e, "Font unavailable, item counts will not be drawn"),
        },
        None => info!("No font configured, item counts will not be drawn"),
    }

    let sink = Arc::new(DiscordSink::new(
        http_client,
        config.discord.api_base_url.clone(),
        bot_token,
    ));
    let notifier = Arc::new(KillNotifier::new(
        sink,
        Arc::new(composer),
        config.killboard.killboard_base_url.clone(),
        config.discord.channel_id.clone(),
    ));

    let tracker = Arc::new(EntityTracker::new(config.tracker.max_processed_per_entity));
    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&tracker),
        source.clone(),
        Arc::clone(&notifier),
    ));

    if !config.tracker.initial_players.is_empty() {
        let reply = handler
            .track_silently(&config.tracker.initial_players)
            .await;
        info!(
            tracked = reply.newly_tracked.len(),
            "Initial players registered"
        );
    }

    let poller = Arc::new(KillPoller::new(
        Arc::clone(&tracker),
        source,
        Arc::clone(&notifier),
        config.poll.interval(),
        config.poll.cycle_deadline(),
    ));
    let poller_status = poller.status();
    let poller_handle = poller.start();

    // Start HTTP API server
    let api_state = ApiState {
        handler,
        tracker,
        poller_status,
        default_channel: config.discord.channel_id.clone(),
    };
    let router = create_router(api_state);
    let bind = format!("{}:{}", config.api.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind command API on {}", bind))?;
    info!(address = %bind, "Command API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Command API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    poller_handle.stop().await;
    info!("Killfeed stopped");

    Ok(())
}
