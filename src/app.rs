use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use teloxide::prelude::*;
use tokio::time::timeout;

use crate::{
    ai::OpenRouterClient,
    config::{AppConfig, StorageBackend},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    presenter::ErrorPresenter,
    store::{SnapshotStore, SqliteStore, SubscriptionStore},
    subscriptions::SubscriptionService,
    tasks::{DailyScheduler, DigestContext},
    telegram::{types::AppState, BotApiClient, PreviewClient, TelegramService},
};

pub struct DigestApp {
    _paths: ResolvedPaths,
    scheduler: DailyScheduler,
    telegram: TelegramService,
    store: Arc<dyn SubscriptionStore>,
    shutdown: Shutdown,
}

impl DigestApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let store = open_store(&config, &paths).await?;

        let http_client = Client::builder()
            .user_agent(format!("tg-digest/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let bot = Bot::new(&config.telegram_bot_token);
        let me = bot
            .get_me()
            .await
            .context("Telegram Bot API is unreachable or the token is invalid")?;
        tracing::info!(
            target: "telegram",
            bot_id = me.id.0,
            username = ?me.username,
            "bot account verified"
        );

        let bot_client = Arc::new(BotApiClient::new(bot.clone()));
        let preview = Arc::new(PreviewClient::new(
            http_client.clone(),
            config.preview.clone(),
        ));
        let summarizer = Arc::new(OpenRouterClient::new(http_client, config.openrouter.clone()));

        let scheduler = DailyScheduler::new(config.timezone).await?;
        let digest = DigestContext::new(store.clone(), preview, summarizer, bot_client.clone());
        let service = Arc::new(SubscriptionService::new(
            store.clone(),
            scheduler.clone(),
            bot_client,
            digest,
        ));

        let restored = service.restore_schedules().await?;
        tracing::info!(target: "subscriptions", restored, "stored schedules restored");
        scheduler.start().await?;

        let state = Arc::new(AppState {
            service,
            presenter: ErrorPresenter::standard(),
            bot_username: me.username.clone(),
        });
        let telegram = TelegramService::new(bot, state);

        Ok(Self {
            _paths: paths,
            scheduler,
            telegram,
            store,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let DigestApp {
            _paths: _,
            mut scheduler,
            telegram,
            store,
            shutdown,
        } = self;

        tracing::info!("channel digest bot started");

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);
        let mut telegram_future = Box::pin(telegram.run(shutdown.subscribe()));
        let mut telegram_completed = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!("shutdown signal received (CTRL+C / SIGTERM)");
            }
            res = &mut telegram_future => {
                telegram_completed = true;
                if let Err(err) = res {
                    tracing::error!(?err, "telegram dispatcher failed");
                } else {
                    tracing::info!("telegram dispatcher finished");
                }
            }
        }

        shutdown.trigger();

        if !telegram_completed {
            let wait = tokio::time::sleep(shutdown_timeout);
            tokio::pin!(wait);
            tokio::select! {
                res = &mut telegram_future => {
                    if let Err(err) = res {
                        tracing::error!(?err, "telegram dispatcher failed during shutdown");
                    }
                }
                _ = &mut wait => {
                    tracing::warn!(
                        target: "telegram",
                        "dispatcher did not stop within {:?}; forcing exit",
                        shutdown_timeout
                    );
                }
            }
        }

        match timeout(shutdown_timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(?err, "scheduler shutdown failed");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    shutdown_timeout
                );
            }
        }

        if timeout(shutdown_timeout, store.close()).await.is_err() {
            tracing::warn!(
                target: "store",
                "store cleanup did not finish within {:?}",
                shutdown_timeout
            );
        }

        tracing::info!("channel digest bot stopped");
        Ok(())
    }
}

async fn open_store(
    config: &AppConfig,
    paths: &ResolvedPaths,
) -> Result<Arc<dyn SubscriptionStore>> {
    let store: Arc<dyn SubscriptionStore> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&paths.db_path).await?),
        StorageBackend::Snapshot => Arc::new(SnapshotStore::open(&paths.snapshot_path)?),
    };
    Ok(store)
}
