use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use storage::repository::{
    QuestionRepository, QuestionSelector, QuizResultRecord, QuizResultRepository, StorageError,
};
use training_core::model::{Answer, Question, QuestionId, QuizOutcome, QuizType, ScopeId};

use crate::Clock;
use crate::error::QuizError;
use crate::identity::IdentityProvider;

/// User-facing warning raised when a completed attempt could not be saved.
///
/// The two variants carry distinct notification texts; the score itself is
/// always shown regardless.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SaveWarning {
    #[error("Your result could not be saved because you are not signed in.")]
    NotAuthenticated,
    #[error("Your result could not be saved. Please try again later.")]
    SaveFailed,
}

/// Whether the completed attempt reached the backend of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    /// The score exists only in this session; the warning says why.
    LocalOnly(SaveWarning),
}

impl PersistOutcome {
    #[must_use]
    pub fn warning(&self) -> Option<SaveWarning> {
        match self {
            Self::Persisted => None,
            Self::LocalOnly(warning) => Some(*warning),
        }
    }
}

/// Final state of a completed quiz attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizCompletion {
    pub outcome: QuizOutcome,
    pub duration_seconds: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub persistence: PersistOutcome,
}

/// Drives one quiz attempt: `Empty → Loaded → InProgress → Completed → Empty`.
///
/// The question order is fixed at load time; answers are upserted by question
/// id as the pointer advances. Completion always yields a score — persistence
/// failure degrades to a local-only result with a user-visible warning, it
/// never hides a finished attempt.
pub struct QuizSessionService {
    clock: Clock,
    question_repo: Arc<dyn QuestionRepository>,
    result_repo: Arc<dyn QuizResultRepository>,
    identity: Arc<dyn IdentityProvider>,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<QuestionId, Answer>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    score: u32,
    percentage: f64,
    is_completed: bool,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        question_repo: Arc<dyn QuestionRepository>,
        result_repo: Arc<dyn QuizResultRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            clock,
            question_repo,
            result_repo,
            identity,
            questions: Vec::new(),
            current: 0,
            answers: HashMap::new(),
            started_at: None,
            completed_at: None,
            score: 0,
            percentage: 0.0,
            is_completed: false,
        }
    }

    /// Load the question set for a quiz type, or for one sub-scope when a
    /// scope id is given (the scope takes precedence). Returns the number of
    /// questions loaded; any previous session state is discarded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` if the set is empty — a quiz cannot
    /// silently run with zero questions. Returns `QuizError::Storage` if the
    /// fetch itself fails.
    pub async fn load_questions(
        &mut self,
        quiz_type: QuizType,
        scope: Option<ScopeId>,
    ) -> Result<usize, QuizError> {
        let selector = QuestionSelector::for_quiz(quiz_type, scope);
        let questions = self.question_repo.list_questions(&selector).await?;
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        self.questions = questions;
        self.clear_session();
        Ok(self.questions.len())
    }

    /// Begin the attempt: reset the pointer, answers, and completion fields,
    /// and stamp the start time.
    pub fn start_quiz(&mut self) {
        self.clear_session();
        self.started_at = Some(self.clock.now());
    }

    /// Record a selection for the active question and advance the pointer
    /// (clamped at the last question).
    ///
    /// Returns `None` without mutating anything when no questions are loaded,
    /// the session is already completed, or `question_id` is not the question
    /// at the current index — the latter defends against stale or duplicate
    /// UI events. Revisiting a question overwrites its earlier answer.
    pub fn submit_answer(
        &mut self,
        question_id: QuestionId,
        selected: BTreeSet<String>,
    ) -> Option<&Answer> {
        if self.is_completed {
            return None;
        }
        let question = self.questions.get(self.current)?;
        if question.id() != question_id {
            return None;
        }

        let answer = Answer::new(question, selected, self.clock.now());
        self.answers.insert(question_id, answer);

        if self.current + 1 < self.questions.len() {
            self.current += 1;
        }

        self.answers.get(&question_id)
    }

    /// Compute the final score and attempt to persist the result.
    ///
    /// The session ends completed with its score and percentage in every
    /// branch; failures only downgrade `persistence` to `LocalOnly` with the
    /// matching warning (not-signed-in vs. generic save failure). Calling
    /// again recomputes the same outcome and re-attempts persistence.
    pub async fn complete_quiz(&mut self, quiz_type: QuizType) -> QuizCompletion {
        let now = self.clock.now();
        let started_at = self.started_at.unwrap_or_else(|| {
            warn!("complete_quiz without start_quiz; falling back to zero duration");
            now
        });
        let duration_seconds =
            u32::try_from((now - started_at).num_seconds().max(0)).unwrap_or(u32::MAX);

        let outcome = QuizOutcome::from_answers(&self.questions, &self.answers);

        let user = self.identity.current_user();
        let record = QuizResultRecord {
            user_id: user.id.clone(),
            quiz_type,
            answers: self.answers_in_question_order(),
            score: outcome.score(),
            max_score: outcome.max_score(),
            total_questions: outcome.total_questions(),
            correct_answers: outcome.correct_answers(),
            duration_seconds,
            started_at,
        };

        let persistence = if user.is_authenticated {
            match self.result_repo.save_result(&record).await {
                Ok(()) => PersistOutcome::Persisted,
                Err(StorageError::Unauthorized) => {
                    warn!(user = %user.id, "quiz result rejected as unauthorized");
                    PersistOutcome::LocalOnly(SaveWarning::NotAuthenticated)
                }
                Err(err) => {
                    warn!(user = %user.id, error = %err, "quiz result save failed");
                    PersistOutcome::LocalOnly(SaveWarning::SaveFailed)
                }
            }
        } else {
            warn!(user = %user.id, "quiz result not saved: user is not authenticated");
            PersistOutcome::LocalOnly(SaveWarning::NotAuthenticated)
        };

        self.started_at = Some(started_at);
        self.completed_at = Some(now);
        self.score = outcome.score();
        self.percentage = outcome.percentage();
        self.is_completed = true;

        QuizCompletion {
            outcome,
            duration_seconds,
            started_at,
            completed_at: now,
            persistence,
        }
    }

    /// Back to the empty state: no questions, no answers, no timestamps.
    pub fn reset_quiz(&mut self) {
        self.questions.clear();
        self.clear_session();
    }

    fn clear_session(&mut self) {
        self.current = 0;
        self.answers.clear();
        self.started_at = None;
        self.completed_at = None;
        self.score = 0;
        self.percentage = 0.0;
        self.is_completed = false;
    }

    fn answers_in_question_order(&self) -> Vec<Answer> {
        self.questions
            .iter()
            .filter_map(|q| self.answers.get(&q.id()).cloned())
            .collect()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.questions.is_empty()
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }
}

impl fmt::Debug for QuizSessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSessionService")
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("is_completed", &self.is_completed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use storage::repository::InMemoryRepository;
    use training_core::model::UserId;
    use training_core::time::{fixed_clock, fixed_now};

    use crate::identity::StaticIdentity;

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn quiz_type() -> QuizType {
        QuizType::new("quiz").unwrap()
    }

    fn question(id: u64, points: u32, correct: &[&str]) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            points,
            keys(correct),
            quiz_type(),
        )
    }

    fn seeded_repo() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.put_questions(
            None,
            vec![question(1, 1, &["a"]), question(2, 2, &["b", "c"])],
        )
        .unwrap();
        repo
    }

    fn service_with(repo: InMemoryRepository, identity: StaticIdentity) -> QuizSessionService {
        QuizSessionService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo),
            Arc::new(identity),
        )
    }

    fn service() -> QuizSessionService {
        service_with(
            seeded_repo(),
            StaticIdentity::authenticated(UserId::new("u-1").unwrap()),
        )
    }

    struct RejectingResults {
        error: fn() -> StorageError,
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl QuizResultRepository for RejectingResults {
        async fn save_result(&self, _: &QuizResultRecord) -> Result<(), StorageError> {
            *self.attempts.lock().unwrap() += 1;
            Err((self.error)())
        }

        async fn list_results(&self, _: &UserId) -> Result<Vec<QuizResultRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn empty_question_set_is_a_load_error() {
        let mut svc = service_with(
            InMemoryRepository::new(),
            StaticIdentity::authenticated(UserId::new("u-1").unwrap()),
        );
        let err = svc.load_questions(quiz_type(), None).await.unwrap_err();
        assert!(matches!(err, QuizError::NoQuestions));
        assert!(!svc.is_loaded());
    }

    #[tokio::test]
    async fn stale_answer_events_are_ignored() {
        let mut svc = service();
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();

        // Question 2 is not the active question yet.
        assert!(svc.submit_answer(QuestionId::new(2), keys(&["b"])).is_none());
        assert_eq!(svc.current_index(), 0);
        assert_eq!(svc.answered_count(), 0);

        let answer = svc.submit_answer(QuestionId::new(1), keys(&["a"])).unwrap();
        assert!(answer.is_correct);
        assert_eq!(svc.current_index(), 1);

        // A duplicate event for the already-passed question is also ignored.
        assert!(svc.submit_answer(QuestionId::new(1), keys(&["x"])).is_none());
        assert_eq!(svc.answered_count(), 1);
    }

    #[tokio::test]
    async fn pointer_clamps_at_last_question() {
        let mut svc = service();
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();

        svc.submit_answer(QuestionId::new(1), keys(&["a"]));
        svc.submit_answer(QuestionId::new(2), keys(&["b"]));
        assert_eq!(svc.current_index(), 1);

        // Still at the last question; re-answering overwrites.
        let answer = svc
            .submit_answer(QuestionId::new(2), keys(&["b", "c"]))
            .unwrap();
        assert!(answer.is_correct);
        assert_eq!(svc.answered_count(), 2);
        assert_eq!(svc.current_index(), 1);
    }

    #[tokio::test]
    async fn completion_scores_exact_set_matches() {
        let repo = seeded_repo();
        let mut svc = service_with(
            repo.clone(),
            StaticIdentity::authenticated(UserId::new("u-1").unwrap()),
        );
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();

        // Scenario C: q1 exact match, q2 missing one key.
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));
        svc.submit_answer(QuestionId::new(2), keys(&["b"]));

        let completion = svc.complete_quiz(quiz_type()).await;
        assert_eq!(completion.outcome.score(), 1);
        assert_eq!(completion.outcome.max_score(), 3);
        assert!((completion.outcome.percentage() - 33.33).abs() < f64::EPSILON);
        assert_eq!(completion.persistence, PersistOutcome::Persisted);
        assert!(svc.is_completed());
        assert_eq!(svc.score(), 1);

        let saved = repo.saved_results().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].score, 1);
        assert_eq!(saved[0].max_score, 3);
        assert_eq!(saved[0].correct_answers, 1);
        assert_eq!(saved[0].total_questions, 2);
        assert_eq!(saved[0].answers.len(), 2);
        assert_eq!(saved[0].answers[0].question_id, QuestionId::new(1));
    }

    #[tokio::test]
    async fn completion_without_start_falls_back_to_zero_duration() {
        let mut svc = service();
        svc.load_questions(quiz_type(), None).await.unwrap();

        // Scenario D: the caller skipped start_quiz.
        let completion = svc.complete_quiz(quiz_type()).await;
        assert_eq!(completion.duration_seconds, 0);
        assert_eq!(completion.started_at, fixed_now());
        assert!(svc.is_completed());
    }

    #[tokio::test]
    async fn unauthorized_save_warns_distinctly_but_keeps_score() {
        let repo = seeded_repo();
        let results = Arc::new(RejectingResults {
            error: || StorageError::Unauthorized,
            attempts: Mutex::new(0),
        });
        let mut svc = QuizSessionService::new(
            fixed_clock(),
            Arc::new(repo),
            Arc::clone(&results) as Arc<dyn QuizResultRepository>,
            Arc::new(StaticIdentity::authenticated(UserId::new("u-1").unwrap())),
        );
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));
        svc.submit_answer(QuestionId::new(2), keys(&["b", "c"]));

        // Scenario E: backend answers 401; the score still stands.
        let completion = svc.complete_quiz(quiz_type()).await;
        assert_eq!(
            completion.persistence.warning(),
            Some(SaveWarning::NotAuthenticated)
        );
        assert_eq!(completion.outcome.score(), 3);
        assert!((completion.outcome.percentage() - 100.0).abs() < f64::EPSILON);
        assert!(svc.is_completed());

        // A generic failure produces the other warning text.
        let generic = SaveWarning::SaveFailed.to_string();
        let auth = SaveWarning::NotAuthenticated.to_string();
        assert_ne!(generic, auth);
    }

    #[tokio::test]
    async fn backend_outage_degrades_to_local_only() {
        let repo = seeded_repo();
        let results = Arc::new(RejectingResults {
            error: || StorageError::Connection("503".into()),
            attempts: Mutex::new(0),
        });
        let mut svc = QuizSessionService::new(
            fixed_clock(),
            Arc::new(repo),
            Arc::clone(&results) as Arc<dyn QuizResultRepository>,
            Arc::new(StaticIdentity::authenticated(UserId::new("u-1").unwrap())),
        );
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));

        let completion = svc.complete_quiz(quiz_type()).await;
        assert_eq!(
            completion.persistence.warning(),
            Some(SaveWarning::SaveFailed)
        );
        assert!(svc.is_completed());

        // Each repeated completion re-attempts persistence.
        let again = svc.complete_quiz(quiz_type()).await;
        assert_eq!(again.outcome.score(), completion.outcome.score());
        assert_eq!(*results.attempts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn unauthenticated_user_skips_the_save_entirely() {
        let repo = seeded_repo();
        let mut svc = service_with(
            repo.clone(),
            StaticIdentity::anonymous(UserId::new("guest").unwrap()),
        );
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));

        let completion = svc.complete_quiz(quiz_type()).await;
        assert_eq!(
            completion.persistence.warning(),
            Some(SaveWarning::NotAuthenticated)
        );
        assert!(repo.saved_results().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_returns_to_the_empty_state() {
        let mut svc = service();
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));
        svc.complete_quiz(quiz_type()).await;

        svc.reset_quiz();
        assert!(!svc.is_loaded());
        assert!(!svc.is_completed());
        assert_eq!(svc.answered_count(), 0);
        assert!(svc.started_at().is_none());
        assert!(svc.submit_answer(QuestionId::new(1), keys(&["a"])).is_none());
    }

    #[tokio::test]
    async fn submitting_after_completion_is_a_no_op() {
        let mut svc = service();
        svc.load_questions(quiz_type(), None).await.unwrap();
        svc.start_quiz();
        svc.submit_answer(QuestionId::new(1), keys(&["a"]));
        svc.complete_quiz(quiz_type()).await;

        assert!(svc.submit_answer(QuestionId::new(2), keys(&["b"])).is_none());
        assert_eq!(svc.answered_count(), 1);
    }
}
