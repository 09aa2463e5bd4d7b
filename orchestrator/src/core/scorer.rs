//! Candidate scoring
//!
//! A weighted linear combination of three normalized sub-scores:
//!
//! - skill: share of the task's skills found in the candidate's skills
//!   (case-insensitive exact match; repeated candidate skills are counted
//!   every time they match)
//! - budget: closeness of the candidate's rate to the budget midpoint
//! - rating: candidate rating on a 0-5 scale
//!
//! Scoring is deterministic and side-effect free.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::Scorer;
use crate::types::{Candidate, CandidateScore, ScoreBreakdown, TaskContext};

/// Upper end of the rating scale
pub const MAX_RATING: f64 = 5.0;

/// Weights applied to each sub-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub skill: f64,
    pub budget: f64,
    pub rating: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            skill: 0.5,
            budget: 0.3,
            rating: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> OrchestratorResult<()> {
        let weights = [self.skill, self.budget, self.rating];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(OrchestratorError::config("score weights must be finite and non-negative"));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(OrchestratorError::config(format!("score weights must sum to 1.0, got {sum}")));
        }
        Ok(())
    }
}

/// Heuristic scorer used by both candidate resolution strategies
#[derive(Debug, Clone, Default)]
pub struct WeightedScorer {
    weights: ScoreWeights,
}

impl WeightedScorer {
    /// Strategy label recorded on proposals produced by this scorer
    pub const STRATEGY: &'static str = "skill_match";

    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, task: &TaskContext, candidate: &Candidate) -> OrchestratorResult<CandidateScore> {
        if !candidate.hourly_rate.is_finite() || candidate.hourly_rate < 0.0 {
            return Err(OrchestratorError::scoring(
                candidate.id.clone(),
                format!("invalid hourly rate {}", candidate.hourly_rate),
            ));
        }
        if !candidate.rating.is_finite() || candidate.rating < 0.0 {
            return Err(OrchestratorError::scoring(
                candidate.id.clone(),
                format!("invalid rating {}", candidate.rating),
            ));
        }

        let breakdown = ScoreBreakdown {
            skill: skill_score(&task.skill_tags, &candidate.skills),
            budget: budget_score(task.budget.lower, task.budget.upper, candidate.hourly_rate),
            rating: rating_score(candidate.rating),
        };

        let raw = self.weights.skill * breakdown.skill
            + self.weights.budget * breakdown.budget
            + self.weights.rating * breakdown.rating;

        tracing::debug!(
            task_id = %task.task_id,
            candidate_id = %candidate.id,
            skill_score = breakdown.skill,
            budget_score = breakdown.budget,
            rating_score = breakdown.rating,
            final_score = raw,
            "Calculated match score"
        );

        Ok(CandidateScore {
            candidate_id: candidate.id.clone(),
            score: raw.clamp(0.0, 1.0),
            breakdown,
        })
    }

    fn strategy(&self) -> &'static str {
        Self::STRATEGY
    }
}

/// Share of required skills the candidate covers; 1.0 when nothing is required
pub fn skill_score(task_skills: &[String], candidate_skills: &[String]) -> f64 {
    if task_skills.is_empty() {
        return 1.0;
    }

    let required: HashSet<String> = task_skills.iter().map(|s| s.to_lowercase()).collect();
    let matched = candidate_skills
        .iter()
        .filter(|skill| required.contains(&skill.to_lowercase()))
        .count();

    matched as f64 / task_skills.len() as f64
}

/// Closeness of a rate to the budget midpoint; degenerate budgets are unconstrained
pub fn budget_score(lower: f64, upper: f64, rate: f64) -> f64 {
    let midpoint = (lower + upper) / 2.0;
    if midpoint <= 0.0 {
        return 1.0;
    }
    1.0 - ((rate - midpoint).abs() / midpoint).min(1.0)
}

/// Rating normalized to the 0-5 scale, capped at 1.0
pub fn rating_score(rating: f64) -> f64 {
    (rating / MAX_RATING).min(1.0)
}

/// Order scores best first, ties broken by candidate id, and keep the top `limit`
pub fn select_top(mut scores: Vec<CandidateScore>, limit: usize) -> Vec<CandidateScore> {
    scores.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.candidate_id.cmp(&b.candidate_id),
        other => other,
    });
    scores.truncate(limit);
    scores
}
