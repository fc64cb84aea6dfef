/// A single text post read from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    pub id: i64,
    pub text: String,
}

/// Resolved identity of a public channel.
#[derive(Debug, Clone)]
pub struct ChannelIdentity {
    pub id: i64,
    pub username: String,
    pub title: Option<String>,
}
