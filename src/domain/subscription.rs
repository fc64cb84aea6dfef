use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::post::ChannelIdentity;

/// Watermark value of a subscription that has never delivered a digest.
pub const NO_POSTS_CHECKED: i64 = -1;

/// Wall-clock time of day at which a daily digest is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendingTime {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendingTimeError {
    #[error("time must match HH:MM")]
    Format,
    #[error("hour must be 0-23 and minute 0-59")]
    Value,
}

impl SendingTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, SendingTimeError> {
        if hour > 23 || minute > 59 {
            return Err(SendingTimeError::Value);
        }
        Ok(Self { hour, minute })
    }
}

impl FromStr for SendingTime {
    type Err = SendingTimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (hh, mm) = raw.split_once(':').ok_or(SendingTimeError::Format)?;
        if hh.len() != 2 || mm.len() != 2 {
            return Err(SendingTimeError::Format);
        }
        let hour: u8 = hh.parse().map_err(|_| SendingTimeError::Format)?;
        let minute: u8 = mm.parse().map_err(|_| SendingTimeError::Format)?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for SendingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for SendingTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SendingTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a subscription: one chat watching one channel at one time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub chat_id: i64,
    pub channel_id: i64,
    pub sending_time: SendingTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub chat_id: i64,
    pub channel_id: i64,
    pub channel_username: String,
    pub sending_time: SendingTime,
    pub last_checked_post_id: i64,
    pub schedule_handle: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            chat_id: self.chat_id,
            channel_id: self.channel_id,
            sending_time: self.sending_time,
        }
    }
}

/// Candidate subscription populated stage by stage during command validation.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionDraft {
    pub channel_username: Option<String>,
    pub sending_time: Option<SendingTime>,
    pub channel: Option<ChannelIdentity>,
}

impl SubscriptionDraft {
    /// Turns a fully validated draft into a fresh subscription for `chat_id`.
    /// Returns `None` while any stage output is still missing.
    pub fn finish(self, chat_id: i64) -> Option<Subscription> {
        let channel = self.channel?;
        Some(Subscription {
            chat_id,
            channel_id: channel.id,
            channel_username: self.channel_username?,
            sending_time: self.sending_time?,
            last_checked_post_id: NO_POSTS_CHECKED,
            schedule_handle: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_time() {
        let time: SendingTime = "09:30".parse().unwrap();
        assert_eq!(time, SendingTime { hour: 9, minute: 30 });
        assert_eq!(time.to_string(), "09:30");
    }

    #[test]
    fn parses_midnight_and_last_minute() {
        assert!("00:00".parse::<SendingTime>().is_ok());
        assert!("23:59".parse::<SendingTime>().is_ok());
    }

    #[test]
    fn rejects_malformed_time() {
        for raw in ["0930", "9:30", "09:3", "ab:cd", "09-30", ""] {
            assert_eq!(raw.parse::<SendingTime>(), Err(SendingTimeError::Format), "{raw}");
        }
    }

    #[test]
    fn rejects_out_of_range_time() {
        for raw in ["24:00", "12:60", "99:99"] {
            assert_eq!(raw.parse::<SendingTime>(), Err(SendingTimeError::Value), "{raw}");
        }
    }

    #[test]
    fn serializes_as_clock_string() {
        let time = SendingTime { hour: 7, minute: 5 };
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"07:05\"");
        let back: SendingTime = serde_json::from_str("\"07:05\"").unwrap();
        assert_eq!(back, time);
    }

    #[test]
    fn draft_finishes_only_when_complete() {
        let mut draft = SubscriptionDraft::default();
        assert!(draft.clone().finish(1).is_none());

        draft.channel_username = Some("news_channel".into());
        draft.sending_time = Some("09:30".parse().unwrap());
        draft.channel = Some(ChannelIdentity {
            id: 42,
            username: "news_channel".into(),
            title: Some("News".into()),
        });

        let subscription = draft.finish(77).unwrap();
        assert_eq!(subscription.chat_id, 77);
        assert_eq!(subscription.channel_id, 42);
        assert_eq!(subscription.last_checked_post_id, NO_POSTS_CHECKED);
        assert!(subscription.schedule_handle.is_none());
    }
}
