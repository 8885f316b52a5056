use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ReadingSection, SectionId, UserId};

/// Persisted completion row for one user and one section.
///
/// Rows are upserted keyed on `(user_id, section_id)`: completing a section a
/// second time overwrites the timestamp and reading time, it never duplicates
/// the row. The section title is denormalized at write time so reporting
/// surfaces do not need the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgress {
    pub user_id: UserId,
    pub section_id: SectionId,
    pub section_title: String,
    pub completed_at: DateTime<Utc>,
    pub reading_time_seconds: u32,
}

impl SectionProgress {
    #[must_use]
    pub fn new(
        user_id: UserId,
        section_id: SectionId,
        section_title: impl Into<String>,
        completed_at: DateTime<Utc>,
        reading_time_seconds: u32,
    ) -> Self {
        Self {
            user_id,
            section_id,
            section_title: section_title.into(),
            completed_at,
            reading_time_seconds,
        }
    }
}

/// Percentage of required sections completed, rounded to the nearest integer.
///
/// Returns 0 when the set of required sections is empty.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn completion_percentage(sections: &[ReadingSection]) -> u32 {
    let total = sections.iter().filter(|s| s.section().required()).count();
    if total == 0 {
        return 0;
    }
    let done = sections
        .iter()
        .filter(|s| s.section().required() && s.completed())
        .count();

    (100.0 * done as f64 / total as f64).round() as u32
}

/// True when every required section is completed.
///
/// An empty required set does not open the gate: with no catalog to check
/// against, the state is treated as unknown rather than complete.
#[must_use]
pub fn all_required_completed(sections: &[ReadingSection]) -> bool {
    let mut any = false;
    for section in sections.iter().filter(|s| s.section().required()) {
        if !section.completed() {
            return false;
        }
        any = true;
    }
    any
}

/// First required section (in registry order) still unread, if any.
#[must_use]
pub fn next_incomplete(sections: &[ReadingSection]) -> Option<&ReadingSection> {
    sections
        .iter()
        .find(|s| s.section().required() && !s.completed())
}
