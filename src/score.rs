// src/score.rs

//! Score aggregation.
//!
//! Summaries are always recomputed from the current state of every
//! correction slot; nothing is patched incrementally.

use serde::Serialize;

use crate::activity::{Activity, Question};

/// How many of a group passed, for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    All,
    Some,
    None,
}

impl Standing {
    fn of(correct: usize, total: usize) -> Self {
        if correct == total {
            Standing::All
        } else if correct == 0 {
            Standing::None
        } else {
            Standing::Some
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSummary {
    pub correct: usize,
    pub total: usize,
    /// `correct == total`; vacuously true with no corrections.
    pub fully_correct: bool,
    /// Points shown next to the question, if any.
    pub points: Option<i64>,
    /// Points contributed to the activity total.
    pub awarded: i64,
    pub standing: Standing,
}

impl QuestionSummary {
    pub fn of(question: &Question) -> Self {
        let total = question.corrections.len();
        let correct = question
            .corrections
            .iter()
            .filter(|c| c.is_correct())
            .count();
        let fully_correct = correct == total;
        let points = question.display_points();

        Self {
            correct,
            total,
            fully_correct,
            points,
            awarded: if fully_correct { points.unwrap_or(0) } else { 0 },
            standing: Standing::of(correct, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    /// Questions that are fully correct.
    pub correct: usize,
    pub total: usize,
    pub points: i64,
    pub standing: Standing,
    pub questions: Vec<QuestionSummary>,
}

impl ActivitySummary {
    pub fn of(activity: &Activity) -> Self {
        let questions: Vec<QuestionSummary> =
            activity.questions.iter().map(Question::summary).collect();
        let total = questions.len();
        let correct = questions.iter().filter(|q| q.fully_correct).count();
        let points = questions
            .iter()
            .fold(0i64, |sum, q| sum.saturating_add(q.awarded));

        Self {
            correct,
            total,
            points,
            standing: Standing::of(correct, total),
            questions,
        }
    }

    pub fn all_correct(&self) -> bool {
        self.correct == self.total
    }
}
