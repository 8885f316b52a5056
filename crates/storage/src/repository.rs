use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use training_core::model::{
    Answer, Question, QuizType, ScopeId, SectionId, SectionProgress, UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("not authenticated")]
    Unauthorized,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Selector for loading a question set.
///
/// The two variants are mutually exclusive: a set is loaded either for a
/// whole quiz type or for one sub-scope (a specific topic/module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionSelector {
    ByQuizType(QuizType),
    ByScope(ScopeId),
}

impl QuestionSelector {
    /// Build a selector from the caller-facing pair, with the scope id taking
    /// precedence when both are given.
    #[must_use]
    pub fn for_quiz(quiz_type: QuizType, scope: Option<ScopeId>) -> Self {
        match scope {
            Some(id) => Self::ByScope(id),
            None => Self::ByQuizType(quiz_type),
        }
    }
}

/// Persisted shape of one completed quiz attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultRecord {
    pub user_id: UserId,
    pub quiz_type: QuizType,
    pub answers: Vec<Answer>,
    pub score: u32,
    pub max_score: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub duration_seconds: u32,
    pub started_at: DateTime<Utc>,
}

/// Repository contract for per-user section completion rows.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch all completion rows for the user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be read.
    async fn list_progress(&self, user_id: &UserId) -> Result<Vec<SectionProgress>, StorageError>;

    /// Insert or overwrite the row keyed on `(user_id, section_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, progress: &SectionProgress) -> Result<(), StorageError>;

    /// Delete every completion row for the user (full reset).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError>;
}

/// Repository contract for question sets.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch the ordered question set matching the selector.
    ///
    /// An empty result is a valid repository answer; treating it as a load
    /// error is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the questions cannot be read.
    async fn list_questions(
        &self,
        selector: &QuestionSelector,
    ) -> Result<Vec<Question>, StorageError>;
}

/// Repository contract for completed quiz attempts.
#[async_trait]
pub trait QuizResultRepository: Send + Sync {
    /// Append one completed attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unauthorized` when the backend rejects the
    /// caller's identity, or another `StorageError` on other failures.
    async fn save_result(&self, result: &QuizResultRecord) -> Result<(), StorageError>;

    /// List saved attempts for the user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be read.
    async fn list_results(&self, user_id: &UserId) -> Result<Vec<QuizResultRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Progress rows live in a map keyed on `(user_id, section_id)`, so the
/// upsert-no-duplication invariant holds by construction.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserId, SectionId), SectionProgress>>>,
    questions: Arc<Mutex<Vec<QuestionRow>>>,
    results: Arc<Mutex<Vec<QuizResultRecord>>>,
}

#[derive(Clone)]
struct QuestionRow {
    scope: Option<ScopeId>,
    question: Question,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a question set, optionally assigned to a sub-scope.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the fixture lock is poisoned.
    pub fn put_questions(
        &self,
        scope: Option<ScopeId>,
        questions: Vec<Question>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.extend(
            questions
                .into_iter()
                .map(|question| QuestionRow { scope, question }),
        );
        Ok(())
    }

    /// Snapshot of the saved quiz results, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn saved_results(&self) -> Result<Vec<QuizResultRecord>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn list_progress(&self, user_id: &UserId) -> Result<Vec<SectionProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, progress: &SectionProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (progress.user_id.clone(), progress.section_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|(uid, _), _| uid != user_id);
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_questions(
        &self,
        selector: &QuestionSelector,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let matched = guard
            .iter()
            .filter(|row| match selector {
                QuestionSelector::ByScope(id) => row.scope == Some(*id),
                QuestionSelector::ByQuizType(t) => row.question.quiz_type() == t,
            })
            .map(|row| row.question.clone())
            .collect();
        Ok(matched)
    }
}

#[async_trait]
impl QuizResultRepository for InMemoryRepository {
    async fn save_result(&self, result: &QuizResultRecord) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(result.clone());
        Ok(())
    }

    async fn list_results(&self, user_id: &UserId) -> Result<Vec<QuizResultRecord>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<QuizResultRecord> = guard
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }
}

/// Aggregates the three repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn QuizResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self::from_in_memory(repo)
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn QuizResultRepository> = Arc::new(repo);
        Self {
            progress,
            questions,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use training_core::model::QuestionId;
    use training_core::time::fixed_now;

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn progress_row(section: &str, seconds: u32) -> SectionProgress {
        SectionProgress::new(
            user(),
            SectionId::new(section).unwrap(),
            "Title",
            fixed_now(),
            seconds,
        )
    }

    fn question(id: u64, quiz_type: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            1,
            BTreeSet::from(["a".to_string()]),
            QuizType::new(quiz_type).unwrap(),
        )
    }

    #[tokio::test]
    async fn upsert_progress_is_idempotent_per_key() {
        let repo = InMemoryRepository::new();

        repo.upsert_progress(&progress_row("intro", 42)).await.unwrap();
        repo.upsert_progress(&progress_row("intro", 99)).await.unwrap();

        let rows = repo.list_progress(&user()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reading_time_seconds, 99);
    }

    #[tokio::test]
    async fn delete_progress_only_touches_the_given_user() {
        let repo = InMemoryRepository::new();
        repo.upsert_progress(&progress_row("intro", 1)).await.unwrap();

        let other = SectionProgress::new(
            UserId::new("u-2").unwrap(),
            SectionId::new("intro").unwrap(),
            "Title",
            fixed_now(),
            5,
        );
        repo.upsert_progress(&other).await.unwrap();

        repo.delete_progress(&user()).await.unwrap();
        assert!(repo.list_progress(&user()).await.unwrap().is_empty());
        assert_eq!(
            repo.list_progress(&UserId::new("u-2").unwrap())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn selector_scope_takes_precedence() {
        let repo = InMemoryRepository::new();
        repo.put_questions(None, vec![question(1, "quiz")]).unwrap();
        repo.put_questions(Some(ScopeId::new(7)), vec![question(2, "quiz")])
            .unwrap();

        let selector =
            QuestionSelector::for_quiz(QuizType::new("quiz").unwrap(), Some(ScopeId::new(7)));
        assert_eq!(selector, QuestionSelector::ByScope(ScopeId::new(7)));

        let scoped = repo.list_questions(&selector).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id(), QuestionId::new(2));

        let by_type = repo
            .list_questions(&QuestionSelector::ByQuizType(
                QuizType::new("quiz").unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(by_type.len(), 2);
    }
}
