use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{QuestionId, QuizType};

/// A quiz question, immutable once loaded into a session.
///
/// `correct_answer` is a set of option keys so multi-select questions are
/// first-class; a single-choice question simply carries a one-element set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    points: u32,
    correct_answer: BTreeSet<String>,
    quiz_type: QuizType,
}

impl Question {
    /// Create a question. `points` below 1 are clamped to 1.
    #[must_use]
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        points: u32,
        correct_answer: BTreeSet<String>,
        quiz_type: QuizType,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            points: points.max(1),
            correct_answer,
            quiz_type,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn correct_answer(&self) -> &BTreeSet<String> {
        &self.correct_answer
    }

    #[must_use]
    pub fn quiz_type(&self) -> &QuizType {
        &self.quiz_type
    }

    /// Exact set comparison: cardinality and membership must both match.
    /// Partial credit is not supported, so supersets and subsets are wrong.
    #[must_use]
    pub fn is_correct_selection(&self, selected: &BTreeSet<String>) -> bool {
        *selected == self.correct_answer
    }
}
