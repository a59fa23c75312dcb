use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::UserKey;

/// The direction of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}

/// Holds at most one vote per user for a single track. The last vote wins.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    votes: HashMap<UserKey, Vote>,
}

impl VoteLedger {
    /// Records a vote, returning true if the ledger changed.
    /// Casting the same vote twice is a no-op.
    pub fn cast(&mut self, voter: UserKey, vote: Vote) -> bool {
        match self.votes.insert(voter, vote) {
            Some(previous) => previous != vote,
            None => true,
        }
    }

    /// Up votes minus down votes
    pub fn score(&self) -> i64 {
        self.votes.values().fold(0, |score, vote| match vote {
            Vote::Up => score + 1,
            Vote::Down => score - 1,
        })
    }

    pub fn vote_of(&self, voter: &str) -> Option<Vote> {
        self.votes.get(voter).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserKey, &Vote)> {
        self.votes.iter()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
