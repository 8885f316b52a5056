use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::model::{Question, QuestionId};

/// One recorded answer within a quiz session.
///
/// Answers are upserted by question id as the user progresses; revisiting a
/// question overwrites the earlier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected: BTreeSet<String>,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    /// Record a selection against a question, deriving correctness by exact
    /// set comparison.
    #[must_use]
    pub fn new(question: &Question, selected: BTreeSet<String>, answered_at: DateTime<Utc>) -> Self {
        let is_correct = question.is_correct_selection(&selected);
        Self {
            question_id: question.id(),
            selected,
            is_correct,
            answered_at,
        }
    }
}

/// Final score for a quiz attempt, computed from the fixed question set and
/// the answers recorded so far.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    score: u32,
    max_score: u32,
    total_questions: u32,
    correct_answers: u32,
    percentage: f64,
}

impl QuizOutcome {
    /// Compute the outcome from a question set and its answers.
    ///
    /// Unanswered questions score zero. `percentage` is
    /// `100 * score / max_score` rounded to two decimals, or `0.0` when the
    /// question set carries no points at all.
    #[must_use]
    pub fn from_answers(questions: &[Question], answers: &HashMap<QuestionId, Answer>) -> Self {
        let mut score = 0_u32;
        let mut max_score = 0_u32;
        let mut correct_answers = 0_u32;

        for question in questions {
            max_score = max_score.saturating_add(question.points());
            if answers.get(&question.id()).is_some_and(|a| a.is_correct) {
                score = score.saturating_add(question.points());
                correct_answers = correct_answers.saturating_add(1);
            }
        }

        let percentage = if max_score == 0 {
            0.0
        } else {
            round_two(100.0 * f64::from(score) / f64::from(max_score))
        };

        #[allow(clippy::cast_possible_truncation)]
        let total_questions = questions.len().min(u32::MAX as usize) as u32;

        Self {
            score,
            max_score,
            total_questions,
            correct_answers,
            percentage,
        }
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
