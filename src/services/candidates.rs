//! Merges the current collection with this run's matches and ranks the result.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::{
    config::ScoringPolicy,
    db::ScoreBook,
    models::{Candidate, DesiredSet, LibraryItem, RatingKey},
};

/// Points given to an item the first time the decay policy sees it
pub const DECAY_NEW_POINTS: i64 = 10;
/// Decay policy keeps items with at least this many points...
pub const DECAY_KEEP_POINTS: i64 = 5;
/// ...or with a rating strictly above this
pub const RATING_OVERRIDE: f64 = 8.0;

/// Current members followed by newly matched items, deduplicated by key.
/// A freshly matched item replaces the stale copy in place.
pub fn union_items(existing: &[LibraryItem], this_run: &[LibraryItem]) -> Vec<LibraryItem> {
    let mut positions: HashMap<RatingKey, usize> = HashMap::new();
    let mut merged: Vec<LibraryItem> = Vec::with_capacity(existing.len() + this_run.len());

    for item in existing.iter().chain(this_run) {
        match positions.get(&item.key) {
            Some(&at) => merged[at] = item.clone(),
            None => {
                positions.insert(item.key.clone(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}

fn rank_by_points(a: &Candidate, b: &Candidate) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.item.sort_title().cmp(&b.item.sort_title()))
        .then_with(|| a.item.key.cmp(&b.item.key))
}

fn rank_by_rating(a: &Candidate, b: &Candidate) -> Ordering {
    let rating = |c: &Candidate| c.rating.unwrap_or(0.0);
    rating(b)
        .total_cmp(&rating(a))
        .then_with(|| rank_by_points(a, b))
}

/// Builds the desired collection and updates points as a side effect
#[derive(Debug, Clone, Default)]
pub struct CandidateSetBuilder {
    policy: ScoringPolicy,
    cap: Option<usize>,
    ratings: HashMap<RatingKey, f64>,
}

impl CandidateSetBuilder {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Keep at most `cap` candidates; `None` keeps everything
    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    /// Quality ratings by key. Items without one rank as 0.0.
    pub fn with_ratings(mut self, ratings: HashMap<RatingKey, f64>) -> Self {
        self.ratings = ratings;
        self
    }

    pub fn build(
        &self,
        existing: &[LibraryItem],
        this_run: &[LibraryItem],
        scores: &mut ScoreBook,
    ) -> DesiredSet {
        let union = union_items(existing, this_run);

        let mut recommended_now: Vec<RatingKey> = Vec::new();
        let mut seen: HashSet<RatingKey> = HashSet::new();
        for item in this_run {
            if seen.insert(item.key.clone()) {
                recommended_now.push(item.key.clone());
            }
        }

        let (mut candidates, mut dropped) = match self.policy {
            ScoringPolicy::Monotonic => (self.score_monotonic(&union, &recommended_now, scores), Vec::new()),
            ScoringPolicy::Decay => self.score_decay(&union, scores),
        };

        if let Some(cap) = self.cap {
            if candidates.len() > cap {
                dropped.extend(candidates.split_off(cap));
            }
        }

        tracing::debug!(
            policy = ?self.policy,
            union = union.len(),
            recommended_now = recommended_now.len(),
            desired = candidates.len(),
            dropped = dropped.len(),
            "Desired set built"
        );

        DesiredSet {
            candidates,
            recommended_now,
            dropped,
        }
    }

    fn candidate(&self, item: &LibraryItem, points: i64) -> Candidate {
        Candidate {
            item: item.clone(),
            points,
            rating: self.ratings.get(&item.key).copied(),
        }
    }

    /// Unseen items start at 0, each fresh recommendation adds 1
    fn score_monotonic(
        &self,
        union: &[LibraryItem],
        recommended_now: &[RatingKey],
        scores: &mut ScoreBook,
    ) -> Vec<Candidate> {
        for item in union {
            if !scores.contains(&item.key) {
                scores.set_points(&item.key, 0);
            }
            scores.set_title(&item.key, &item.title);
        }
        for key in recommended_now {
            let points = scores.get_points(key);
            scores.set_points(key, points + 1);
        }

        let mut candidates: Vec<Candidate> = union
            .iter()
            .map(|item| self.candidate(item, scores.get_points(&item.key)))
            .collect();
        candidates.sort_by(rank_by_points);
        candidates
    }

    /// Unseen items start at 10, known ones lose a point per run (floored at
    /// 0) whether or not they were recommended again. Low scorers survive
    /// only on a high rating.
    fn score_decay(
        &self,
        union: &[LibraryItem],
        scores: &mut ScoreBook,
    ) -> (Vec<Candidate>, Vec<Candidate>) {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();

        for item in union {
            let points = if scores.contains(&item.key) {
                (scores.get_points(&item.key) - 1).max(0)
            } else {
                DECAY_NEW_POINTS
            };
            scores.set_points(&item.key, points);
            scores.set_title(&item.key, &item.title);

            let candidate = self.candidate(item, points);
            if passes_decay_filter(candidate.points, candidate.rating.unwrap_or(0.0)) {
                kept.push(candidate);
            } else {
                dropped.push(candidate);
            }
        }

        kept.sort_by(rank_by_rating);
        (kept, dropped)
    }
}

/// Kept when points reach the threshold or the rating clears the override
pub fn passes_decay_filter(points: i64, rating: f64) -> bool {
    points >= DECAY_KEEP_POINTS || rating > RATING_OVERRIDE
}
