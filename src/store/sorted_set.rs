//! Sorted Set Module
//!
//! Score-ordered member set backing the eviction index in the in-process store.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Total order over f64 scores.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

// == Sorted Set ==
/// Members ordered by `(score, member)`, ties broken lexicographically.
#[derive(Debug, Default, Clone)]
pub struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a member's score, replacing any previous one.
    pub fn insert(&mut self, member: &str, score: f64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.order.remove(&(Score(old), member.to_string()));
        }
        self.order.insert((Score(score), member.to_string()));
    }

    /// Adds `delta` to a member's score, starting from zero.
    pub fn increment(&mut self, member: &str, delta: f64) -> f64 {
        let score = self.score(member).unwrap_or(0.0) + delta;
        self.insert(member, score);
        score
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.scores.contains_key(member)
    }

    /// Removes a member. Returns true if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&(Score(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    /// Removes and returns the member with the lowest score.
    pub fn pop_min(&mut self) -> Option<String> {
        let (_, member) = self.order.pop_first()?;
        self.scores.remove(&member);
        Some(member)
    }

    /// Members from lowest to highest score.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|(_, member)| member.as_str())
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
