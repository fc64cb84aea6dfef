use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use teloxide::{ApiError, RequestError};

use crate::domain::ChannelIdentity;

use super::{ChannelResolver, Notifier, NotifyError, ResolveError};

/// Bot API backed implementation of channel resolution and delivery.
///
/// Resolution goes through `getChat`, which works for any public channel
/// without the bot being a member. Private channels and plain users or
/// groups are rejected the same way a missing channel is.
#[derive(Clone)]
pub struct BotApiClient {
    bot: Bot,
}

impl BotApiClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChannelResolver for BotApiClient {
    async fn resolve(&self, username: &str) -> Result<ChannelIdentity, ResolveError> {
        let recipient = Recipient::ChannelUsername(format!("@{username}"));
        let chat = match self.bot.get_chat(recipient).await {
            Ok(chat) => chat,
            Err(RequestError::Api(ApiError::ChatNotFound)) => {
                return Err(ResolveError::NotFound(username.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        // Anything without a public username is unreachable for the preview
        // reader, so it counts as not found.
        if !chat.is_channel() {
            return Err(ResolveError::NotFound(username.to_string()));
        }
        let Some(resolved_username) = chat.username() else {
            return Err(ResolveError::NotFound(username.to_string()));
        };

        Ok(ChannelIdentity {
            id: chat.id.0,
            username: resolved_username.to_string(),
            title: chat.title().map(str::to_string),
        })
    }
}

#[async_trait]
impl Notifier for BotApiClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, NotifyError> {
        let message = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(message.id.0)
    }
}
