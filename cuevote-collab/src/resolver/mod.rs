mod provider;
mod youtube;

use std::future::Future;

use chrono::Utc;
use cuevote_core::{CommandError, ContentMetadata};
use log::{debug, warn};
use thiserror::Error;

pub use provider::*;
pub use youtube::*;

use crate::{util::normalize_query, CollabContext, DatabaseError, VideoData};

pub const LIVE_NOT_ALLOWED: &str = "Live streams are not allowed in this channel.";
pub const MUSIC_ONLY: &str = "Only music videos are allowed in this channel.";

/// Turns what a user typed into validated content metadata
pub struct MetadataResolver {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Nothing to search for")]
    EmptyQuery,
    #[error("No video was found for that query")]
    NotFound,
    #[error("{}", LIVE_NOT_ALLOWED)]
    Live,
    #[error("{}", MUSIC_ONLY)]
    NotMusic,
    #[error("The content provider did not respond in time")]
    TimedOut,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<ResolveError> for CommandError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::EmptyQuery | ResolveError::NotFound => {
                CommandError::validation(error.to_string())
            }
            ResolveError::Live | ResolveError::NotMusic => {
                CommandError::PolicyViolation(error.to_string())
            }
            ResolveError::TimedOut | ResolveError::Provider(_) => {
                CommandError::transient(error.to_string())
            }
        }
    }
}

impl MetadataResolver {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Resolves a url, video id, or search query and checks it against the room policy
    pub async fn resolve(
        &self,
        query: &str,
        music_only: bool,
    ) -> Result<ContentMetadata, ResolveError> {
        let video = self.lookup(query).await?;

        if video.is_live() {
            return Err(ResolveError::Live);
        }

        if music_only && !self.context.config.is_music_category(&video.category_id) {
            return Err(ResolveError::NotMusic);
        }

        Ok(video.into())
    }

    async fn lookup(&self, query: &str) -> Result<VideoData, ResolveError> {
        let query = query.trim();

        if query.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        match ContentRef::parse(query) {
            ContentRef::Url(id) => self.video(&id).await?.ok_or(ResolveError::NotFound),
            ContentRef::BareId(id) => match self.video(&id).await? {
                Some(video) => Ok(video),
                None => self.search(query).await,
            },
            ContentRef::Search(_) => self.search(query).await,
        }
    }

    /// Returns a video by id, from the cache if it is fresh enough
    async fn video(&self, id: &str) -> Result<Option<VideoData>, ResolveError> {
        match self.context.database.video_by_id(id).await {
            Ok(video) if self.is_fresh(&video) => return Ok(Some(video)),
            Ok(_) => debug!("Cached video {} is stale, refreshing", id),
            Err(DatabaseError::NotFound { .. }) => {}
            Err(e) => warn!("Failed to read video cache: {}", e),
        }

        let Some(details) = self.bounded(self.context.provider.fetch(id)).await? else {
            return Ok(None);
        };

        let video = details.into_video(Utc::now());

        if let Err(e) = self.context.database.upsert_video(video.clone()).await {
            warn!("Failed to cache video {}: {}", video.id, e);
        }

        Ok(Some(video))
    }

    async fn search(&self, query: &str) -> Result<VideoData, ResolveError> {
        let term = normalize_query(query);

        match self.context.database.search_term_video(&term).await {
            Ok(video) if self.is_fresh(&video) => return Ok(video),
            Ok(video) => {
                return self.video(&video.id).await?.ok_or(ResolveError::NotFound);
            }
            Err(DatabaseError::NotFound { .. }) => {}
            Err(e) => warn!("Failed to read search cache: {}", e),
        }

        let id = self
            .bounded(self.context.provider.search(&term))
            .await?
            .ok_or(ResolveError::NotFound)?;

        let video = self.video(&id).await?.ok_or(ResolveError::NotFound)?;

        if let Err(e) = self.context.database.cache_search_term(&term, &video.id).await {
            warn!("Failed to cache search term {:?}: {}", term, e);
        }

        Ok(video)
    }

    fn is_fresh(&self, video: &VideoData) -> bool {
        let age = Utc::now().signed_duration_since(video.fetched_at);

        age.to_std()
            .map(|age| age < self.context.config.content_cache_ttl)
            // Fetched "in the future", so it can't be old
            .unwrap_or(true)
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ResolveError> {
        match tokio::time::timeout(self.context.config.resolve_timeout, request).await {
            Ok(result) => result.map_err(|e| {
                warn!("Content provider failed: {}", e);
                e.into()
            }),
            Err(_) => {
                warn!("Content provider timed out");
                Err(ResolveError::TimedOut)
            }
        }
    }
}
