use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{SendingTime, SendingTimeError, SubscriptionDraft};
use crate::telegram::{ChannelResolver, ResolveError};

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username regex must compile"));

const MIN_USERNAME_LEN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("expected exactly two arguments: channel and time")]
    ArgCount,
    #[error("time must match HH:MM")]
    TimeFormat,
    #[error("time values out of range")]
    TimeValue,
    #[error("channel username is too short")]
    UsernameTooShort,
    #[error("channel username contains invalid characters")]
    InvalidCharacters,
    #[error("no public channel named @{0}")]
    ChannelNotFound(String),
    #[error("channel lookup failed: {0}")]
    External(#[source] ResolveError),
}

/// Single stage of the `/monitor` and `/unmonitor` argument check. Stages run
/// in a fixed order; later stages read draft fields that earlier stages fill.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn check(
        &self,
        command: &str,
        draft: &mut SubscriptionDraft,
    ) -> Result<(), ValidationError>;
}

/// Stage 1: the command must carry exactly a channel and a time.
pub struct ArgCountValidator;

#[async_trait]
impl Validate for ArgCountValidator {
    async fn check(
        &self,
        command: &str,
        _draft: &mut SubscriptionDraft,
    ) -> Result<(), ValidationError> {
        if command.split_whitespace().count() != 2 {
            return Err(ValidationError::ArgCount);
        }
        Ok(())
    }
}

/// Stage 2: the second argument must be a valid wall-clock time.
pub struct TimeValidator;

#[async_trait]
impl Validate for TimeValidator {
    async fn check(
        &self,
        command: &str,
        draft: &mut SubscriptionDraft,
    ) -> Result<(), ValidationError> {
        let raw = command
            .split_whitespace()
            .nth(1)
            .ok_or(ValidationError::ArgCount)?;
        let time: SendingTime = raw.parse().map_err(|err| match err {
            SendingTimeError::Format => ValidationError::TimeFormat,
            SendingTimeError::Value => ValidationError::TimeValue,
        })?;
        draft.sending_time = Some(time);
        Ok(())
    }
}

/// Stage 3: the first argument must normalize to a plausible channel handle.
pub struct ChannelNameValidator;

#[async_trait]
impl Validate for ChannelNameValidator {
    async fn check(
        &self,
        command: &str,
        draft: &mut SubscriptionDraft,
    ) -> Result<(), ValidationError> {
        let raw = command
            .split_whitespace()
            .next()
            .ok_or(ValidationError::ArgCount)?;
        let username = normalize_channel_handle(raw);
        if username.len() < MIN_USERNAME_LEN {
            return Err(ValidationError::UsernameTooShort);
        }
        if !USERNAME_REGEX.is_match(username) {
            return Err(ValidationError::InvalidCharacters);
        }
        draft.channel_username = Some(username.to_string());
        Ok(())
    }
}

/// Stage 4: the channel must exist and be public. The only stage that talks
/// to the network.
pub struct ChannelExistenceValidator {
    resolver: Arc<dyn ChannelResolver>,
}

impl ChannelExistenceValidator {
    pub fn new(resolver: Arc<dyn ChannelResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Validate for ChannelExistenceValidator {
    async fn check(
        &self,
        _command: &str,
        draft: &mut SubscriptionDraft,
    ) -> Result<(), ValidationError> {
        let username = draft
            .channel_username
            .clone()
            .ok_or(ValidationError::ArgCount)?;
        match self.resolver.resolve(&username).await {
            Ok(channel) => {
                draft.channel = Some(channel);
                Ok(())
            }
            Err(ResolveError::NotFound(name)) => Err(ValidationError::ChannelNotFound(name)),
            Err(err) => Err(ValidationError::External(err)),
        }
    }
}

/// Builds the standard four-stage chain in its required order.
pub fn standard_chain(resolver: Arc<dyn ChannelResolver>) -> Vec<Box<dyn Validate>> {
    vec![
        Box::new(ArgCountValidator),
        Box::new(TimeValidator),
        Box::new(ChannelNameValidator),
        Box::new(ChannelExistenceValidator::new(resolver)),
    ]
}

/// Runs every stage in order, stopping at the first failure.
pub async fn run_chain(
    validators: &[Box<dyn Validate>],
    command: &str,
) -> Result<SubscriptionDraft, ValidationError> {
    let mut draft = SubscriptionDraft::default();
    for validator in validators {
        validator.check(command, &mut draft).await?;
    }
    Ok(draft)
}

/// Reduces the accepted channel spellings (`@name`, `t.me/name`, full URLs,
/// trailing paths and query strings) to the bare username.
fn normalize_channel_handle(raw: &str) -> &str {
    let mut rest = raw;
    for prefix in ["https://", "http://", "t.me/", "telegram.me/", "@"] {
        rest = rest.strip_prefix(prefix).unwrap_or(rest);
    }
    rest.split_once(['?', '/']).map_or(rest, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::ChannelIdentity;

    struct FakeResolver {
        known: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeResolver {
        fn new(known: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                known,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChannelResolver for FakeResolver {
        async fn resolve(&self, username: &str) -> Result<ChannelIdentity, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.known.contains(&username) {
                Ok(ChannelIdentity {
                    id: -100,
                    username: username.to_string(),
                    title: None,
                })
            } else {
                Err(ResolveError::NotFound(username.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn accepts_every_supported_channel_spelling() {
        let resolver = FakeResolver::new(vec!["rustnews"]);
        let chain = standard_chain(resolver.clone());

        for command in [
            "rustnews 09:30",
            "@rustnews 09:30",
            "t.me/rustnews 09:30",
            "telegram.me/rustnews 09:30",
            "https://t.me/rustnews 09:30",
            "http://telegram.me/rustnews 09:30",
            "https://t.me/rustnews?start=abc 09:30",
            "https://t.me/rustnews/120 09:30",
        ] {
            let draft = run_chain(&chain, command).await.unwrap();
            assert_eq!(draft.channel_username.as_deref(), Some("rustnews"), "{command}");
            assert_eq!(draft.sending_time, Some("09:30".parse().unwrap()));
            assert!(draft.channel.is_some());
        }
    }

    #[tokio::test]
    async fn rejects_wrong_argument_count() {
        let resolver = FakeResolver::new(vec!["rustnews"]);
        let chain = standard_chain(resolver.clone());

        for command in ["", "rustnews", "rustnews 09:30 extra"] {
            let err = run_chain(&chain, command).await.unwrap_err();
            assert!(matches!(err, ValidationError::ArgCount), "{command}");
        }
        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn rejects_bad_times() {
        let resolver = FakeResolver::new(vec!["rustnews"]);
        let chain = standard_chain(resolver.clone());

        let err = run_chain(&chain, "rustnews 9:30").await.unwrap_err();
        assert!(matches!(err, ValidationError::TimeFormat));

        let err = run_chain(&chain, "rustnews 24:00").await.unwrap_err();
        assert!(matches!(err, ValidationError::TimeValue));
    }

    #[tokio::test]
    async fn rejects_short_and_malformed_usernames() {
        let resolver = FakeResolver::new(vec![]);
        let chain = standard_chain(resolver.clone());

        let err = run_chain(&chain, "@abc 09:30").await.unwrap_err();
        assert!(matches!(err, ValidationError::UsernameTooShort));

        let err = run_chain(&chain, "rust-news! 09:30").await.unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCharacters));

        assert_eq!(resolver.call_count(), 0);
    }

    #[tokio::test]
    async fn resolver_is_reached_only_by_fully_valid_commands() {
        let resolver = FakeResolver::new(vec!["rustnews"]);
        let chain = standard_chain(resolver.clone());

        run_chain(&chain, "bad!name 09:30").await.unwrap_err();
        run_chain(&chain, "rustnews 99:99").await.unwrap_err();
        assert_eq!(resolver.call_count(), 0);

        run_chain(&chain, "rustnews 09:30").await.unwrap();
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_channel_reports_its_handle() {
        let resolver = FakeResolver::new(vec![]);
        let chain = standard_chain(resolver);

        let err = run_chain(&chain, "ghost_channel 10:00").await.unwrap_err();
        match err {
            ValidationError::ChannelNotFound(name) => assert_eq!(name, "ghost_channel"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
