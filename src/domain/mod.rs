pub mod post;
pub mod subscription;

pub use post::{ChannelIdentity, ChannelPost};
pub use subscription::{
    SendingTime, SendingTimeError, Subscription, SubscriptionDraft, SubscriptionKey,
    NO_POSTS_CHECKED,
};
