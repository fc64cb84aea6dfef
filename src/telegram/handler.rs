use std::sync::Arc;

use anyhow::Result;
use teloxide::{
    dispatching::Dispatcher, error_handlers::LoggingErrorHandler, prelude::*, update_listeners,
};

use crate::infrastructure::shutdown::ShutdownListener;

use super::types::{command_list, AppState, BotResult, GeneralCommand};

pub struct TelegramService {
    bot: Bot,
    state: Arc<AppState>,
}

impl TelegramService {
    pub fn new(bot: Bot, state: Arc<AppState>) -> Self {
        Self { bot, state }
    }

    pub async fn run(&self, mut shutdown: ShutdownListener) -> Result<()> {
        self.sync_commands().await?;

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<GeneralCommand>()
                    .endpoint(Self::on_command),
            )
            .branch(dptree::endpoint(Self::on_plain_message));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.state.clone()])
            .default_handler(|update| async move {
                tracing::debug!(target: "telegram", ?update, "unhandled update");
            })
            .build();

        let listener = update_listeners::polling_default(self.bot.clone()).await;
        let shutdown_token = dispatcher.shutdown_token();
        let mut dispatcher_future = Box::pin(dispatcher.dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("update listener error"),
        ));
        let mut dispatcher_finished = false;

        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!(target: "telegram", "dispatcher shutdown requested");
                if let Ok(wait) = shutdown_token.shutdown() {
                    wait.await;
                }
            }
            _ = &mut dispatcher_future => {
                dispatcher_finished = true;
                tracing::info!(target: "telegram", "dispatcher stopped on its own");
            }
        }

        if !dispatcher_finished {
            dispatcher_future.await;
        }

        Ok(())
    }

    async fn on_command(
        bot: Bot,
        msg: Message,
        cmd: GeneralCommand,
        state: Arc<AppState>,
    ) -> BotResult<()> {
        match cmd {
            GeneralCommand::Start => {
                bot.send_message(msg.chat.id, "Привет! Бот готов к работе!")
                    .await?
            }
            GeneralCommand::Subscriptions => {
                let reply = match state.service.list(msg.chat.id.0).await {
                    Ok(subscriptions) if subscriptions.is_empty() => {
                        "У вас пока нет активных подписок.".to_string()
                    }
                    Ok(subscriptions) => subscriptions
                        .iter()
                        .map(|sub| {
                            format!("Channel @{} at time: {}", sub.channel_username, sub.sending_time)
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                    Err(err) => state.presenter.present(&err),
                };
                bot.send_message(msg.chat.id, reply).await?
            }
        };
        Ok(())
    }

    async fn on_plain_message(bot: Bot, msg: Message, state: Arc<AppState>) -> BotResult<()> {
        if let Some(text) = msg.text() {
            Self::maybe_handle_subscription_command(&bot, &msg, text, state).await?;
        }
        Ok(())
    }

    /// Handles the argument-carrying commands teloxide cannot parse for us.
    /// Returns `true` when the message was consumed as a command.
    async fn maybe_handle_subscription_command(
        bot: &Bot,
        msg: &Message,
        text: &str,
        state: Arc<AppState>,
    ) -> BotResult<bool> {
        if !text.starts_with('/') {
            return Ok(false);
        }

        let mut parts = text.trim().splitn(2, char::is_whitespace);
        let token = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        let Some(command) = command_name(token, state.bot_username.as_deref()) else {
            return Ok(false);
        };

        match command {
            "/monitor" => {
                let reply = match state.service.monitor(msg.chat.id.0, args).await {
                    Ok(_) => "Успех! Канал успешно добавлен в систему мониторинга!".to_string(),
                    Err(err) => format!(
                        "Канал не был добавлен в систему мониторинга!\n{}",
                        state.presenter.present(&err)
                    ),
                };
                bot.send_message(msg.chat.id, reply).await?;
                Ok(true)
            }
            "/unmonitor" => {
                let reply = match state.service.unmonitor(msg.chat.id.0, args).await {
                    Ok(removed) => format!(
                        "Канал @{} удалён из системы мониторинга.",
                        removed.channel_username
                    ),
                    Err(err) => format!(
                        "Канал не был удалён из системы мониторинга!\n{}",
                        state.presenter.present(&err)
                    ),
                };
                bot.send_message(msg.chat.id, reply).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn sync_commands(&self) -> BotResult<()> {
        self.bot.set_my_commands(command_list()).await?;
        tracing::info!(target: "telegram", "bot commands synchronized");
        Ok(())
    }
}

/// Strips an optional `@botname` mention suffix, dropping commands addressed
/// to a different bot. An unknown own username accepts any mention.
fn command_name<'a>(token: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    match token.split_once('@') {
        Some((name, mention)) => bot_username
            .map_or(true, |username| username.eq_ignore_ascii_case(mention))
            .then_some(name),
        None => Some(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_command_passes_through() {
        assert_eq!(command_name("/monitor", Some("digest_bot")), Some("/monitor"));
    }

    #[test]
    fn own_mention_is_stripped_case_insensitively() {
        assert_eq!(
            command_name("/monitor@Digest_Bot", Some("digest_bot")),
            Some("/monitor")
        );
    }

    #[test]
    fn foreign_mention_is_ignored() {
        assert_eq!(command_name("/monitor@other_bot", Some("digest_bot")), None);
    }

    #[test]
    fn unknown_own_username_accepts_any_mention() {
        assert_eq!(command_name("/monitor@whoever", None), Some("/monitor"));
    }
}
