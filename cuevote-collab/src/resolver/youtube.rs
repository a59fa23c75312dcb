use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::util::URL_SCHEME_REGEX;

use super::{ContentDetails, ContentProvider, ProviderError};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const TOPIC_SUFFIX: &str = " - Topic";

lazy_static! {
    static ref VIDEO_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref DURATION_REGEX: Regex =
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap();
}

/// What a user typed into the suggestion box
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// A YouTube url with a recognizable video id
    Url(String),
    /// Something that looks like a bare video id. It could still be a one-word search.
    BareId(String),
    /// Anything else
    Search(String),
}

impl ContentRef {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if let Some(id) = video_id_from_url(input) {
            return Self::Url(id);
        }

        if VIDEO_ID_REGEX.is_match(input) {
            return Self::BareId(input.to_string());
        }

        Self::Search(input.to_string())
    }
}

fn video_id_from_url(input: &str) -> Option<String> {
    let input = URL_SCHEME_REGEX.replace(input, "https://");
    let url = Url::parse(&input).ok()?;
    let host = url.host_str()?;

    let candidate = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        let mut segments = url.path_segments()?;

        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("v" | "embed" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| VIDEO_ID_REGEX.is_match(id))
}

/// Parses an ISO-8601 duration like `PT4M13S` into seconds.
/// Returns `None` for malformed input and for durations that do not fit in a u32.
pub fn parse_duration(input: &str) -> Option<u32> {
    let captures = DURATION_REGEX.captures(input)?;

    [(1, 86_400u32), (2, 3_600), (3, 60), (4, 1)]
        .into_iter()
        .try_fold(0u32, |total, (index, unit)| {
            let value: u32 = match captures.get(index) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };

            value.checked_mul(unit)?.checked_add(total)
        })
}

/// Looks up content with the YouTube Data API
pub struct YouTubeProvider {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    category_id: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    live_broadcast_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u32>,
}

impl YouTubeProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    async fn get<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.client
            .get(format!("{API_BASE}/{endpoint}"))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ContentProvider for YouTubeProvider {
    async fn search(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let response: ListResponse<SearchItem> = self
            .get(
                "search",
                &[
                    ("part", "snippet"),
                    ("type", "video"),
                    ("maxResults", "1"),
                    ("q", query),
                ],
            )
            .await?;

        Ok(response.items.into_iter().find_map(|i| i.id.video_id))
    }

    async fn fetch(&self, content_id: &str) -> Result<Option<ContentDetails>, ProviderError> {
        let response: ListResponse<VideoItem> = self
            .get(
                "videos",
                &[("part", "snippet,contentDetails"), ("id", content_id)],
            )
            .await?;

        Ok(response.items.into_iter().next().map(Into::into))
    }
}

impl From<VideoItem> for ContentDetails {
    fn from(item: VideoItem) -> Self {
        let is_broadcast = item
            .snippet
            .live_broadcast_content
            .as_deref()
            .is_some_and(|c| c != "none");

        let duration = if is_broadcast {
            0
        } else {
            parse_duration(&item.content_details.duration).unwrap_or(0)
        };

        let artist = item
            .snippet
            .channel_title
            .strip_suffix(TOPIC_SUFFIX)
            .unwrap_or(&item.snippet.channel_title)
            .to_string();

        ContentDetails {
            id: item.id,
            title: item.snippet.title,
            artist,
            thumbnail: determine_thumbnail(item.snippet.thumbnails.into_values().collect()),
            duration,
            category_id: item.snippet.category_id,
        }
    }
}

fn determine_thumbnail(mut thumbnails: Vec<Thumbnail>) -> String {
    // Sort to get the largest at end
    thumbnails.sort_by(|a, b| a.width.cmp(&b.width));

    thumbnails.pop().map(|t| t.url).unwrap_or_default()
}
