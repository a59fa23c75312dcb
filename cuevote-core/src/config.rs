use std::{env, str::FromStr, time::Duration};

/// The configuration of the room engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Rooms without activity for longer than this are hidden from listings
    pub retention_days: u32,
    /// How long a room without subscribers may stay loaded before it is evicted from memory
    pub room_idle_timeout: Duration,
    /// How often the registry looks for idle rooms
    pub eviction_interval: Duration,
    /// How many suggestions a single user may make within `suggestion_window`
    pub suggestion_limit: usize,
    pub suggestion_window: Duration,
    /// Upper bound for a single call to the content provider
    pub resolve_timeout: Duration,
    /// How long resolved content metadata is trusted before it is fetched again
    pub content_cache_ttl: Duration,
    /// How long a login session stays valid
    pub session_duration: Duration,
    /// Provider categories accepted by music-only rooms
    pub music_categories: Vec<String>,
    /// Minimum spacing between two persisted activity updates of the same room
    pub activity_debounce: Duration,
    /// How many played tracks a room remembers, oldest are dropped first
    pub history_limit: usize,
}

impl Config {
    const DAY: Duration = Duration::from_secs(60 * 60 * 24);

    /// Builds a config from the environment, falling back to defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            retention_days: env_or("ACTIVE_CHANNEL_DAYS", defaults.retention_days),
            room_idle_timeout: Duration::from_secs(env_or(
                "CUEVOTE_ROOM_IDLE_SECS",
                defaults.room_idle_timeout.as_secs(),
            )),
            suggestion_limit: env_or("CUEVOTE_SUGGESTION_LIMIT", defaults.suggestion_limit),
            history_limit: env_or("CUEVOTE_HISTORY_LIMIT", defaults.history_limit),
            resolve_timeout: Duration::from_secs(env_or(
                "CUEVOTE_RESOLVE_TIMEOUT_SECS",
                defaults.resolve_timeout.as_secs(),
            )),
            ..defaults
        }
    }

    /// The retention window as a chrono duration, for comparing against stored timestamps
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    /// Returns true if the given provider category counts as music
    pub fn is_music_category(&self, category: &str) -> bool {
        self.music_categories.iter().any(|c| c == category)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_days: 60,
            room_idle_timeout: Duration::from_secs(60 * 60),
            eviction_interval: Duration::from_secs(60),
            suggestion_limit: 5,
            suggestion_window: Duration::from_secs(60),
            resolve_timeout: Duration::from_secs(10),
            content_cache_ttl: Self::DAY * 7,
            session_duration: Self::DAY * 7,
            // YouTube's "Music" category
            music_categories: vec!["10".to_string()],
            activity_debounce: Duration::from_secs(30),
            history_limit: 50,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
