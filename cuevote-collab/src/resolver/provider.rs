use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::VideoData;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to reach the content provider: {0}")]
    Request(String),

    #[error("Failed to parse the content provider response: {0}")]
    Parse(String),
}

/// Everything the resolver needs to know about a piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDetails {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    /// Length in seconds, zero for live or upcoming broadcasts
    pub duration: u32,
    pub category_id: String,
}

/// An external catalogue of content, like YouTube
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Returns the id of the best match for a free text query, if anything matched
    async fn search(&self, query: &str) -> Result<Option<String>, ProviderError>;

    /// Returns the details of a content id, if it exists
    async fn fetch(&self, content_id: &str) -> Result<Option<ContentDetails>, ProviderError>;
}

impl ContentDetails {
    pub fn into_video(self, fetched_at: DateTime<Utc>) -> VideoData {
        VideoData {
            id: self.id,
            title: self.title,
            artist: self.artist,
            thumbnail: self.thumbnail,
            duration: self.duration,
            category_id: self.category_id,
            fetched_at,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use fixture::*;

#[cfg(any(test, feature = "test-util"))]
mod fixture {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    /// A provider backed by a fixed catalogue.
    /// Search matches on a case-insensitive title substring.
    #[derive(Default)]
    pub struct StaticProvider {
        catalogue: Mutex<Vec<ContentDetails>>,
        /// If true, every call hangs forever
        stall: bool,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        pub fn new(catalogue: impl IntoIterator<Item = ContentDetails>) -> Self {
            Self {
                catalogue: Mutex::new(catalogue.into_iter().collect()),
                ..Default::default()
            }
        }

        /// A provider that never responds
        pub fn stalled() -> Self {
            Self {
                stall: true,
                ..Default::default()
            }
        }

        /// Creates a catalogue entry with sensible defaults
        pub fn details(id: &str, title: &str, duration: u32, category_id: &str) -> ContentDetails {
            ContentDetails {
                id: id.to_string(),
                title: title.to_string(),
                artist: "Artist".to_string(),
                thumbnail: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
                duration,
                category_id: category_id.to_string(),
            }
        }

        /// How many times the provider was called
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn begin(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.stall {
                std::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl ContentProvider for StaticProvider {
        async fn search(&self, query: &str) -> Result<Option<String>, ProviderError> {
            self.begin().await;
            let query = query.to_lowercase();

            Ok(self
                .catalogue
                .lock()
                .iter()
                .find(|d| d.title.to_lowercase().contains(&query))
                .map(|d| d.id.clone()))
        }

        async fn fetch(&self, content_id: &str) -> Result<Option<ContentDetails>, ProviderError> {
            self.begin().await;

            Ok(self
                .catalogue
                .lock()
                .iter()
                .find(|d| d.id == content_id)
                .cloned())
        }
    }
}
