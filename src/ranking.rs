//! Ranking formulas shared by the proposal listings and the analytics views.
//!
//! Everything here is pure arithmetic over cached tallies and timestamps so
//! the orderings can be checked without a database.

use std::cmp::Ordering;

use chrono::Duration;
use serde::Serialize;

/// Hours added to a proposal's age so brand-new proposals do not divide by
/// (almost) zero.
pub const TRENDING_AGE_OFFSET_HOURS: f64 = 2.0;

/// Share of decisive (for + against) votes that are in favour.
pub fn for_ratio(votes_for: i64, votes_against: i64) -> Option<f64> {
    assert!(votes_for >= 0, "Vote count cannot be negative");
    assert!(votes_against >= 0, "Vote count cannot be negative");
    let decisive = votes_for + votes_against;
    if decisive == 0 {
        return None;
    }
    Some(votes_for as f64 / decisive as f64)
}

/// Distance from a perfect split. Zero is maximally controversial, 0.5 is
/// unanimous.
pub fn controversy(votes_for: i64, votes_against: i64) -> Option<f64> {
    for_ratio(votes_for, votes_against).map(|ratio| (0.5 - ratio).abs())
}

pub fn popularity(votes_for: i64, votes_against: i64, votes_abstain: i64) -> i64 {
    votes_for
        .saturating_add(votes_against)
        .saturating_add(votes_abstain)
}

/// Recent vote weight decayed by age: `weight / (age_hours + 2) ^ gravity`.
pub fn trending_score(recent_weight: i64, age: Duration, gravity: f64) -> f64 {
    assert!(gravity > 0.0, "Trending gravity must be positive");
    if recent_weight <= 0 {
        return 0.0;
    }
    let age_hours = (age.num_seconds().max(0) as f64) / 3_600.0;
    recent_weight as f64 / (age_hours + TRENDING_AGE_OFFSET_HOURS).powf(gravity)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControversyKey {
    pub controversy: f64,
    pub decisive_votes: i64,
    pub created_at: i64,
}

impl ControversyKey {
    /// Most controversial first, then the larger debate, then the newest.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.controversy
            .total_cmp(&other.controversy)
            .then_with(|| other.decisive_votes.cmp(&self.decisive_votes))
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingKey {
    pub score: f64,
    pub created_at: i64,
}

impl TrendingKey {
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrustrationLevel {
    Serene,
    Grumbling,
    Angry,
    Revolt,
}

impl FrustrationLevel {
    pub fn from_index(index: f64) -> Self {
        if index < 25.0 {
            Self::Serene
        } else if index < 50.0 {
            Self::Grumbling
        } else if index < 75.0 {
            Self::Angry
        } else {
            Self::Revolt
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Serene => "Serein",
            Self::Grumbling => "Ça grogne",
            Self::Angry => "En colère",
            Self::Revolt => "Révolte",
        }
    }
}

/// Percentage (0–100) of decisive vote weight cast against.
pub fn frustration_index(for_weight: i64, against_weight: i64) -> f64 {
    assert!(for_weight >= 0, "Vote weight cannot be negative");
    assert!(against_weight >= 0, "Vote weight cannot be negative");
    let decisive = for_weight + against_weight;
    if decisive == 0 {
        return 0.0;
    }
    let index = 100.0 * against_weight as f64 / decisive as f64;
    assert!((0.0..=100.0).contains(&index), "Frustration index out of range");
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_requires_decisive_votes() {
        assert_eq!(for_ratio(0, 0), None);
        assert_eq!(for_ratio(3, 1), Some(0.75));
        assert_eq!(controversy(0, 0), None);
    }

    #[test]
    fn even_split_is_most_controversial() {
        assert_eq!(controversy(5, 5), Some(0.0));
        assert_eq!(controversy(10, 0), Some(0.5));
        assert_eq!(controversy(0, 10), Some(0.5));
        let close = controversy(6, 4).unwrap();
        let lopsided = controversy(9, 1).unwrap();
        assert!(close < lopsided);
    }

    #[test]
    fn controversy_ties_prefer_bigger_debates_then_newer() {
        let mut keys = [
            ControversyKey {
                controversy: 0.0,
                decisive_votes: 4,
                created_at: 10,
            },
            ControversyKey {
                controversy: 0.3,
                decisive_votes: 100,
                created_at: 30,
            },
            ControversyKey {
                controversy: 0.0,
                decisive_votes: 20,
                created_at: 5,
            },
            ControversyKey {
                controversy: 0.0,
                decisive_votes: 4,
                created_at: 20,
            },
        ];
        keys.sort_by(ControversyKey::rank_cmp);
        let order: Vec<(i64, i64)> = keys
            .iter()
            .map(|key| (key.decisive_votes, key.created_at))
            .collect();
        assert_eq!(order, vec![(20, 5), (4, 20), (4, 10), (100, 30)]);
    }

    #[test]
    fn trending_decays_with_age() {
        let fresh = trending_score(10, Duration::hours(1), 1.5);
        let old = trending_score(10, Duration::hours(48), 1.5);
        assert!(fresh > old);
        assert_eq!(trending_score(0, Duration::hours(1), 1.5), 0.0);
        // Clock skew never yields a negative age.
        let future = trending_score(4, Duration::hours(-3), 1.0);
        assert!((future - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trending_order_is_descending() {
        let mut keys = [
            TrendingKey {
                score: 1.0,
                created_at: 1,
            },
            TrendingKey {
                score: 3.0,
                created_at: 1,
            },
            TrendingKey {
                score: 1.0,
                created_at: 2,
            },
        ];
        keys.sort_by(TrendingKey::rank_cmp);
        assert_eq!(keys[0].score, 3.0);
        assert_eq!(keys[1].created_at, 2);
    }

    #[test]
    fn frustration_bands() {
        assert_eq!(frustration_index(0, 0), 0.0);
        assert_eq!(frustration_index(1, 3), 75.0);
        assert_eq!(FrustrationLevel::from_index(0.0), FrustrationLevel::Serene);
        assert_eq!(FrustrationLevel::from_index(25.0), FrustrationLevel::Grumbling);
        assert_eq!(FrustrationLevel::from_index(74.9), FrustrationLevel::Angry);
        assert_eq!(FrustrationLevel::from_index(75.0), FrustrationLevel::Revolt);
    }

    #[test]
    fn popularity_counts_every_vote() {
        assert_eq!(popularity(2, 3, 4), 9);
    }
}
