use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::config::PreviewConfig;
use crate::domain::ChannelPost;

use super::{FetchError, PostFetcher};

const PREVIEW_BASE_URL: &str = "https://t.me/s";

static MESSAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.tgme_widget_message").expect("valid message selector"));

static MESSAGE_TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.tgme_widget_message_text").expect("valid message text selector")
});

/// Reads channel posts from the public t.me preview pages.
///
/// Every public channel exposes `https://t.me/s/<username>` without
/// authentication, which is what lets the bot fetch content for channels it
/// never joined.
pub struct PreviewClient {
    http: Client,
    config: PreviewConfig,
}

impl PreviewClient {
    pub fn new(http: Client, config: PreviewConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PostFetcher for PreviewClient {
    async fn posts_since(
        &self,
        username: &str,
        after_post_id: i64,
    ) -> Result<Vec<ChannelPost>, FetchError> {
        let url = format!("{PREVIEW_BASE_URL}/{username}");
        let response = self
            .http
            .get(&url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        Ok(parse_preview_posts(&body, after_post_id, self.config.max_posts))
    }
}

/// Extracts posts strictly newer than `after_post_id` from a preview page.
///
/// The preview lists posts oldest first; the result is reordered most recent
/// first and capped at `max_posts`. Entries without usable text (photo-only
/// posts, polls, service messages) are dropped.
fn parse_preview_posts(html: &str, after_post_id: i64, max_posts: usize) -> Vec<ChannelPost> {
    let document = Html::parse_document(html);
    let mut posts = Vec::new();

    for message in document.select(&MESSAGE_SELECTOR) {
        let Some(data_post) = message.value().attr("data-post") else {
            continue;
        };
        // data-post carries "<username>/<id>".
        let Some(id) = data_post
            .rsplit('/')
            .next()
            .and_then(|raw| raw.parse::<i64>().ok())
        else {
            continue;
        };
        if id <= after_post_id {
            continue;
        }

        let Some(text_node) = message.select(&MESSAGE_TEXT_SELECTOR).next() else {
            continue;
        };
        let text = text_node.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            continue;
        }

        posts.push(ChannelPost { id, text });
    }

    posts.sort_by(|a, b| b.id.cmp(&a.id));
    posts.truncate(max_posts);
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NO_POSTS_CHECKED;

    const MOCK_PREVIEW_HTML: &str = r#"
    <!DOCTYPE html>
    <html>
    <body>
      <main class="tgme_main">
        <section class="tgme_channel_history js-message_history">
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/101">
              <div class="tgme_widget_message_bubble">
                <div class="tgme_widget_message_text js-message_text" dir="auto">Вышел новый релиз компилятора.</div>
              </div>
            </div>
          </div>
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/102">
              <div class="tgme_widget_message_bubble">
                <a class="tgme_widget_message_photo_wrap" href="https://t.me/rustnews/102"></a>
              </div>
            </div>
          </div>
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/103">
              <div class="tgme_widget_message_bubble">
                <div class="tgme_widget_message_text js-message_text" dir="auto">Команда опубликовала планы на квартал.</div>
              </div>
            </div>
          </div>
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/104">
              <div class="tgme_widget_message_bubble">
                <div class="tgme_widget_message_text js-message_text" dir="auto">   </div>
              </div>
            </div>
          </div>
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/abc">
              <div class="tgme_widget_message_bubble">
                <div class="tgme_widget_message_text js-message_text" dir="auto">Сломанная разметка.</div>
              </div>
            </div>
          </div>
          <div class="tgme_widget_message_wrap js-widget_message_wrap">
            <div class="tgme_widget_message js-widget_message" data-post="rustnews/105">
              <div class="tgme_widget_message_bubble">
                <div class="tgme_widget_message_text js-message_text" dir="auto">Анонсирована конференция в декабре.</div>
              </div>
            </div>
          </div>
        </section>
      </main>
    </body>
    </html>
    "#;

    #[test]
    fn skips_posts_at_or_below_watermark() {
        let posts = parse_preview_posts(MOCK_PREVIEW_HTML, 103, 30);

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, 105);
        assert_eq!(posts[0].text, "Анонсирована конференция в декабре.");
    }

    #[test]
    fn fresh_watermark_sees_every_text_post() {
        let posts = parse_preview_posts(MOCK_PREVIEW_HTML, NO_POSTS_CHECKED, 30);

        let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![105, 103, 101]);
    }

    #[test]
    fn orders_most_recent_first_and_honors_cap() {
        let posts = parse_preview_posts(MOCK_PREVIEW_HTML, NO_POSTS_CHECKED, 2);

        let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![105, 103]);
    }

    #[test]
    fn drops_posts_without_text() {
        let posts = parse_preview_posts(MOCK_PREVIEW_HTML, NO_POSTS_CHECKED, 30);

        assert!(posts.iter().all(|post| post.id != 102), "photo-only post kept");
        assert!(posts.iter().all(|post| post.id != 104), "whitespace-only post kept");
    }

    #[test]
    fn empty_page_yields_no_posts() {
        let posts = parse_preview_posts("<html><body></body></html>", NO_POSTS_CHECKED, 30);
        assert!(posts.is_empty());
    }
}
