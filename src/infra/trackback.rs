//! Outbound trackback delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use thiserror::Error;
use tracing::debug;
use url::{Url, form_urlencoded};

use crate::{config::WorkerSettings, domain::notifications::TrackbackPing};

/// Title and excerpt are cut to this many characters.
pub const TRACKBACK_FIELD_LIMIT: usize = 80;

#[derive(Debug, Error)]
pub enum TrackbackError {
    #[error("invalid trackback url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("trackback request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("trackback endpoint answered {status}")]
    Status { status: u16 },
}

#[async_trait]
pub trait TrackbackSender: Send + Sync {
    async fn send(&self, ping: &TrackbackPing) -> Result<(), TrackbackError>;
}

/// Posts pings as `application/x-www-form-urlencoded` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTrackbackSender {
    client: Client,
}

impl HttpTrackbackSender {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TrackbackError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_settings(settings: &WorkerSettings) -> Result<Self, TrackbackError> {
        Self::new(settings.trackback_timeout, &settings.user_agent)
    }
}

#[async_trait]
impl TrackbackSender for HttpTrackbackSender {
    async fn send(&self, ping: &TrackbackPing) -> Result<(), TrackbackError> {
        let target = Url::parse(ping.target_url.trim()).map_err(|source| {
            TrackbackError::InvalidUrl {
                url: ping.target_url.clone(),
                source,
            }
        })?;

        let response = self
            .client
            .post(target)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_ping(ping))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackbackError::Status {
                status: status.as_u16(),
            });
        }
        debug!(target_url = %ping.target_url, status = status.as_u16(), "Trackback delivered");
        Ok(())
    }
}

/// Form body: `url`, optional `title` and `excerpt`, then `blog_name`.
pub fn encode_ping(ping: &TrackbackPing) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("url", &ping.source_url);
    if !ping.source_title.is_empty() {
        form.append_pair("title", &truncate_chars(&ping.source_title, TRACKBACK_FIELD_LIMIT));
    }
    if !ping.source_excerpt.is_empty() {
        form.append_pair(
            "excerpt",
            &truncate_chars(&ping.source_excerpt, TRACKBACK_FIELD_LIMIT),
        );
    }
    form.append_pair("blog_name", &ping.source_blog_name);
    form.finish()
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> TrackbackPing {
        TrackbackPing {
            target_url: "http://remote.example/tb/1".into(),
            source_url: "http://blog.example/post/E1".into(),
            source_title: "Hello & welcome".into(),
            source_excerpt: "é".repeat(100),
            source_blog_name: "My Blog".into(),
        }
    }

    #[test]
    fn body_is_form_encoded_and_truncated() {
        let body = encode_ping(&ping());
        let pairs: Vec<(String, String)> = form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs[0], ("url".into(), "http://blog.example/post/E1".into()));
        assert_eq!(pairs[1], ("title".into(), "Hello & welcome".into()));
        assert_eq!(pairs[2].0, "excerpt");
        assert_eq!(pairs[2].1.chars().count(), TRACKBACK_FIELD_LIMIT);
        assert_eq!(pairs[3], ("blog_name".into(), "My Blog".into()));
    }

    #[test]
    fn empty_title_and_excerpt_are_omitted() {
        let mut ping = ping();
        ping.source_title.clear();
        ping.source_excerpt.clear();
        let body = encode_ping(&ping);
        assert!(!body.contains("title="));
        assert!(!body.contains("excerpt="));
        assert!(body.ends_with("blog_name=My+Blog"));
    }

    #[tokio::test]
    async fn invalid_target_is_rejected_before_sending() {
        let sender = HttpTrackbackSender::new(Duration::from_secs(1), "almanac-test")
            .expect("client");
        let mut ping = ping();
        ping.target_url = "not a url".into();
        let err = sender.send(&ping).await.expect_err("invalid url");
        assert!(matches!(err, TrackbackError::InvalidUrl { .. }));
    }
}
