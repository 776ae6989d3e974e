//! Channel name and view count lookup for a YouTube video.
//!
//! Both values are best effort: a failed request leaves the name empty and the count zero.

use crate::error::Result;
use crate::source::VideoId;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
const LOOKUP_TIMEOUT_SECS: u64 = 15;

/// Public metadata for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub channel_name: String,
    pub views: u64,
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    author_name: String,
}

/// Fetches video metadata from the oEmbed endpoint and the watch page.
pub struct VideoInfoClient {
    http: Client,
    base_url: String,
    user_agent: String,
    view_patterns: Vec<Regex>,
}

impl VideoInfoClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, user_agent)
    }

    pub fn with_base_url(base_url: &str, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            view_patterns: vec![
                Regex::new(r#"<meta\s+itemprop="interactionCount"\s+content="(\d+)""#)
                    .expect("Invalid regex"),
                Regex::new(r#""viewCount":"(\d+)""#).expect("Invalid regex"),
                Regex::new(r"조회수\s*([\d,]+)회").expect("Invalid regex"),
            ],
        })
    }

    pub async fn lookup(&self, video_id: &VideoId) -> VideoInfo {
        let channel_name = match self.channel_name(video_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("oEmbed lookup failed for {}: {}", video_id, e);
                String::new()
            }
        };

        let views = match self.watch_page(video_id).await {
            Ok(html) => self.parse_view_count(&html),
            Err(e) => {
                warn!("Watch page fetch failed for {}: {}", video_id, e);
                0
            }
        };

        VideoInfo {
            channel_name,
            views,
            video_id: video_id.to_string(),
        }
    }

    async fn channel_name(&self, video_id: &VideoId) -> Result<String> {
        let mut endpoint = Url::parse(&format!("{}/oembed", self.base_url))
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        endpoint
            .query_pairs_mut()
            .append_pair("url", &video_id.watch_url())
            .append_pair("format", "json");

        let oembed: OEmbed = self
            .http
            .get(endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(oembed.author_name)
    }

    async fn watch_page(&self, video_id: &VideoId) -> Result<String> {
        let html = self
            .http
            .get(format!("{}/watch?v={}", self.base_url, video_id))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9,en;q=0.8")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }

    /// First non-zero count found by the patterns, in order.
    fn parse_view_count(&self, html: &str) -> u64 {
        for pattern in &self.view_patterns {
            let count = pattern
                .captures(html)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok())
                .unwrap_or(0);
            if count > 0 {
                return count;
            }
        }
        debug!("No view count in watch page");
        0
    }
}
