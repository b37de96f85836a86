//! Checkmon daemon binary.

use anyhow::Context;
use checkmon::{
    AlertState, Analyzer, MemoryState, MultiNotifier, Notifier, NtfyNotifier, Scheduler,
    SendGridNotifier, SqliteState, StdoutNotifier, TwilioNotifier,
};
use checkmond::checks;
use checkmond::config::{Config, NotificationSettings, StateSettings};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            Config::load_from_file(&path).with_context(|| format!("load config {path}"))?
        }
        None => Config::load().context("load config")?,
    };

    common::logging::init_with(
        config.logging.level.as_deref().unwrap_or("info"),
        config.logging.format.as_deref() == Some("json"),
    );
    info!("checkmond starting");

    let analyzer = if config.analyzer.disabled {
        info!("analyzer disabled");
        None
    } else {
        Some(Arc::new(Analyzer::with_cli_path(
            config.analyzer.cli_path.clone(),
        )))
    };

    let state = build_state(&config.state).context("initialize alert state")?;
    let notifier = build_notifier(&config.notifications).context("initialize notifiers")?;
    info!(notifier = notifier.name(), "notification channels ready");

    let mut scheduler = Scheduler::new(analyzer, notifier, state.clone());
    let roster = checks::all().context("build check roster")?;
    if roster.is_empty() {
        warn!("no checks registered; edit checks::all() to add some");
    }
    for check in roster {
        scheduler.register(check);
    }

    let root = CancellationToken::new();
    scheduler.start(&root);

    tokio::signal::ctrl_c()
        .await
        .context("wait for shutdown signal")?;
    info!("shutdown signal received, draining check loops");

    scheduler.stop().await;
    if let Err(e) = state.close() {
        warn!(error = %e, "failed to close alert state");
    }
    info!("checkmond stopped");

    Ok(())
}

fn build_state(settings: &StateSettings) -> anyhow::Result<Arc<dyn AlertState>> {
    let state: Arc<dyn AlertState> = match settings {
        StateSettings::Memory => Arc::new(MemoryState::new()),
        StateSettings::Sqlite(sqlite) => Arc::new(SqliteState::open(&sqlite.db_path)?),
    };
    Ok(state)
}

fn build_notifier(settings: &[NotificationSettings]) -> anyhow::Result<Arc<dyn Notifier>> {
    if settings.is_empty() {
        return Ok(Arc::new(StdoutNotifier::new()));
    }

    let mut transports: Vec<Arc<dyn Notifier>> = Vec::new();
    for entry in settings {
        let transport: Arc<dyn Notifier> = match entry {
            NotificationSettings::Stdout => Arc::new(StdoutNotifier::new()),
            NotificationSettings::Ntfy(ntfy) => match &ntfy.server {
                Some(server) => {
                    Arc::new(NtfyNotifier::with_server(server.as_str(), ntfy.topic.as_str())?)
                }
                None => Arc::new(NtfyNotifier::new(ntfy.topic.as_str())?),
            },
            NotificationSettings::Twilio(twilio) => Arc::new(TwilioNotifier::new(
                twilio.account_sid.as_str(),
                twilio.auth_token.as_str(),
                twilio.from.as_str(),
                twilio.to.as_str(),
            )?),
            NotificationSettings::Sendgrid(sendgrid) => {
                let mut notifier = SendGridNotifier::new(
                    sendgrid.api_key.as_str(),
                    sendgrid.from.as_str(),
                    sendgrid.to.as_str(),
                )?;
                if let Some(name) = &sendgrid.from_name {
                    notifier = notifier.from_name(name.as_str());
                }
                Arc::new(notifier)
            }
        };
        transports.push(transport);
    }

    if transports.len() == 1 {
        return Ok(transports.remove(0));
    }
    Ok(Arc::new(MultiNotifier::new(transports)))
}
