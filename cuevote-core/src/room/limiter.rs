use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use crate::UserKey;

/// Sliding window rate limiter for suggestions, per user.
#[derive(Debug)]
pub struct SuggestionLimiter {
    limit: usize,
    window: Duration,
    recent: HashMap<UserKey, VecDeque<Instant>>,
}

impl SuggestionLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            recent: HashMap::new(),
        }
    }

    /// Returns true if the user may suggest at `now`, without recording anything
    pub fn check(&mut self, user: &str, now: Instant) -> bool {
        let Some(entries) = self.recent.get_mut(user) else {
            return self.limit > 0;
        };

        while entries
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            entries.pop_front();
        }

        if entries.is_empty() {
            self.recent.remove(user);
            return self.limit > 0;
        }

        entries.len() < self.limit
    }

    /// Number of users with suggestions still inside the window
    pub fn tracked_users(&self) -> usize {
        self.recent.len()
    }

    /// Records a suggestion, forgetting users whose last suggestion has left the window
    pub fn record(&mut self, user: UserKey, now: Instant) {
        let window = self.window;

        self.recent.retain(|_, entries| {
            entries
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < window)
        });

        self.recent.entry(user).or_default().push_back(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_slides() {
        let mut limiter = SuggestionLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        for offset in [0, 1] {
            let at = start + Duration::from_secs(offset);
            assert!(limiter.check("a", at));
            limiter.record("a".into(), at);
        }

        assert!(!limiter.check("a", start + Duration::from_secs(5)));
        assert!(limiter.check("b", start + Duration::from_secs(5)));

        // The first entry has left the window
        assert!(limiter.check("a", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_limit_blocks_everyone() {
        let mut limiter = SuggestionLimiter::new(0, Duration::from_secs(10));
        assert!(!limiter.check("a", Instant::now()));
    }

    #[test]
    fn test_expired_users_are_forgotten() {
        let mut limiter = SuggestionLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        limiter.record("a".into(), start);
        limiter.record("b".into(), start);
        assert_eq!(limiter.tracked_users(), 2);

        assert!(limiter.check("a", start + Duration::from_secs(10)));
        assert_eq!(limiter.tracked_users(), 1);

        // "b" never came back, the next suggestion of anyone drops it
        limiter.record("c".into(), start + Duration::from_secs(11));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
