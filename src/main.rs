use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wa_capture::capture::MessageHandler;
use wa_capture::cli::Cli;
use wa_capture::config::Config;
use wa_capture::server::{self, AppState};
use wa_capture::session::{SessionAdapter, SessionSupervisor};
use wa_capture::status::StatusTracker;
use wa_capture::webhook::WebhookForwarder;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_cli(&cli);

    let (logs, _guard) = wa_capture::logging::init(&config.logging)?;

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Panic: {}", info);
    }));

    config.validate()?;
    std::fs::create_dir_all(&config.session.auth_dir).with_context(|| {
        format!(
            "Failed to create auth directory {}",
            config.session.auth_dir.display()
        )
    })?;

    tracing::info!("Starting WhatsApp capture relay");
    tracing::info!("Webhook configured: {}", config.webhook.url);

    let status = Arc::new(StatusTracker::new());
    let forwarder = WebhookForwarder::new(
        config.webhook.url.clone(),
        config.webhook.user_agent.clone(),
        config.webhook.timeout(),
        config.webhook.retry_policy(),
    )?;
    let handler = MessageHandler::new(forwarder, status.clone());
    let adapter = build_adapter(&config)?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down");
        }
        ctrl_c.cancel();
    });

    let state = AppState::new(status.clone(), logs);
    let addr = config.bind_address();
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = server::serve(&addr, state, server_shutdown.clone()).await;
        // Without its status surface the relay stops too.
        server_shutdown.cancel();
        result
    });

    let supervisor = SessionSupervisor::new(
        adapter,
        status,
        handler,
        config.session.reconnect_delay(),
    );
    let session_result = supervisor.run(shutdown.clone()).await;
    shutdown.cancel();

    let server_result = server.await.context("Status server task panicked")?;
    if let Err(ref e) = session_result {
        tracing::error!("WhatsApp session failed: {}", e);
    }
    if let Err(ref e) = server_result {
        tracing::error!("{:#}", e);
    }
    session_result.context("WhatsApp session failed")?;
    server_result?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "whatsapp")]
fn build_adapter(config: &Config) -> Result<Arc<dyn SessionAdapter>> {
    Ok(Arc::new(wa_capture::whatsapp::WhatsAppSession::new(
        &config.session.auth_dir,
    )))
}

#[cfg(not(feature = "whatsapp"))]
fn build_adapter(_config: &Config) -> Result<Arc<dyn SessionAdapter>> {
    anyhow::bail!("wa-capture was built without WhatsApp support (enable the `whatsapp` feature)")
}
