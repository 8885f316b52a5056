use std::sync::Arc;

use tracing::warn;

use storage::repository::ProgressRepository;
use training_core::model::{
    ReadingSection, SectionId, SectionProgress, SectionRegistry, UserId, all_required_completed,
    completion_percentage, next_incomplete,
};

use crate::Clock;
use crate::error::ProgressStoreError;
use crate::events::{AppEvent, EventBus};

/// Result of a mark-as-read call.
///
/// `Persisted` and `LocalOnly` leave the store in the same visible state; the
/// distinction exists so callers and tests can tell confirmed durability from
/// optimistic local fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The backend accepted the upsert.
    Persisted,
    /// The backend write failed; local state advanced anyway and may drift
    /// from the backend of record until the next successful sync.
    LocalOnly,
    /// The section id is not in the registry; nothing changed.
    UnknownSection,
}

/// Per-user reading progress over the section catalog.
///
/// The store merges backend rows with the injected [`SectionRegistry`] into
/// local [`ReadingSection`] state and answers the gating queries from that
/// state. Backend failures never propagate out of `load` or `mark_completed`:
/// progress visible to the user must not regress because a transient write
/// failed. Every state change is broadcast as [`AppEvent::ProgressUpdated`]
/// so independently mounted surfaces can re-read.
pub struct ProgressStore {
    clock: Clock,
    registry: SectionRegistry,
    repository: Arc<dyn ProgressRepository>,
    events: EventBus,
    sections: Vec<ReadingSection>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(
        clock: Clock,
        registry: SectionRegistry,
        repository: Arc<dyn ProgressRepository>,
        events: EventBus,
    ) -> Self {
        let sections = registry
            .sections()
            .iter()
            .cloned()
            .map(ReadingSection::incomplete)
            .collect();
        Self {
            clock,
            registry,
            repository,
            events,
            sections,
        }
    }

    /// Fetch the user's completion rows and rebuild the merged view.
    ///
    /// On backend failure the store fails closed: every section reads as
    /// incomplete rather than wrongly open the gate on unknown state. The
    /// error is logged, never surfaced; a fetch hiccup must not crash a
    /// content page.
    pub async fn load(&mut self, user_id: &UserId) -> &[ReadingSection] {
        let rows = match self.repository.list_progress(user_id).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(user = %user_id, error = %err, "progress load failed; treating all sections as incomplete");
                Vec::new()
            }
        };

        self.sections = self
            .registry
            .sections()
            .iter()
            .map(|section| {
                let mut reading = ReadingSection::incomplete(section.clone());
                // Rows for ids no longer in the registry are ignored.
                if let Some(row) = rows.iter().find(|r| &r.section_id == section.id()) {
                    reading.mark_completed(row.reading_time_seconds);
                }
                reading
            })
            .collect();

        &self.sections
    }

    /// Mark a section as read, upserting the `(user, section)` row.
    ///
    /// Completion is idempotent: a second call for the same section only
    /// refreshes the timestamp and reading time. On backend failure the local
    /// state still advances (`LocalOnly`) so visible progress never regresses.
    /// Both write outcomes broadcast `ProgressUpdated`; an unknown section id
    /// changes nothing and broadcasts nothing.
    pub async fn mark_completed(
        &mut self,
        user_id: &UserId,
        section_id: &SectionId,
        reading_time_seconds: u32,
    ) -> MarkOutcome {
        let Some(section) = self.registry.find(section_id) else {
            warn!(section = %section_id, "mark_completed for unknown section id; ignoring");
            return MarkOutcome::UnknownSection;
        };

        let row = SectionProgress::new(
            user_id.clone(),
            section_id.clone(),
            section.title(),
            self.clock.now(),
            reading_time_seconds,
        );

        let outcome = match self.repository.upsert_progress(&row).await {
            Ok(()) => MarkOutcome::Persisted,
            Err(err) => {
                warn!(
                    user = %user_id,
                    section = %section_id,
                    error = %err,
                    "progress save failed; keeping local completion"
                );
                MarkOutcome::LocalOnly
            }
        };

        if let Some(reading) = self
            .sections
            .iter_mut()
            .find(|s| s.section().id() == section_id)
        {
            reading.mark_completed(reading_time_seconds);
        }

        self.events.publish(&AppEvent::ProgressUpdated);
        outcome
    }

    /// Percentage of required sections completed (nearest integer).
    #[must_use]
    pub fn completion_percentage(&self) -> u32 {
        completion_percentage(&self.sections)
    }

    /// True when the quiz gate is open.
    #[must_use]
    pub fn all_required_completed(&self) -> bool {
        all_required_completed(&self.sections)
    }

    /// First required section still unread, in registry order.
    #[must_use]
    pub fn next_incomplete(&self) -> Option<&ReadingSection> {
        next_incomplete(&self.sections)
    }

    #[must_use]
    pub fn sections(&self) -> &[ReadingSection] {
        &self.sections
    }

    /// Delete all progress rows for the user.
    ///
    /// Unlike the other operations this surfaces failure: masking a failed
    /// reset would leave the visible state out of step with the backend in a
    /// way that blocks legitimate progress. Local state is cleared and the
    /// update broadcast only after the delete succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the delete fails.
    pub async fn reset(&mut self, user_id: &UserId) -> Result<(), ProgressStoreError> {
        self.repository.delete_progress(user_id).await?;

        for reading in &mut self.sections {
            reading.clear();
        }
        self.events.publish(&AppEvent::ProgressUpdated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use storage::repository::{InMemoryRepository, StorageError};
    use training_core::model::Section;
    use training_core::time::fixed_clock;

    struct FailingRepository;

    #[async_trait]
    impl ProgressRepository for FailingRepository {
        async fn list_progress(&self, _: &UserId) -> Result<Vec<SectionProgress>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn upsert_progress(&self, _: &SectionProgress) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn delete_progress(&self, _: &UserId) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    fn registry() -> SectionRegistry {
        SectionRegistry::new(vec![
            Section::new(SectionId::new("intro").unwrap(), "Introduction", true),
            Section::new(SectionId::new("dialectic").unwrap(), "Dialectic", true),
        ])
    }

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn store_with(repo: Arc<dyn ProgressRepository>) -> (ProgressStore, EventBus) {
        let bus = EventBus::new();
        let store = ProgressStore::new(fixed_clock(), registry(), repo, bus.clone());
        (store, bus)
    }

    #[tokio::test]
    async fn load_merges_backend_rows_with_registry() {
        let repo = InMemoryRepository::new();
        let (mut store, _bus) = store_with(Arc::new(repo.clone()));

        store
            .mark_completed(&user(), &SectionId::new("intro").unwrap(), 42)
            .await;

        let (mut fresh, _bus) = store_with(Arc::new(repo));
        let sections = fresh.load(&user()).await;
        assert!(sections[0].completed());
        assert_eq!(sections[0].reading_time_seconds(), 42);
        assert!(!sections[1].completed());
    }

    #[tokio::test]
    async fn load_fails_closed_on_backend_error() {
        let (mut store, _bus) = store_with(Arc::new(FailingRepository));
        let sections = store.load(&user()).await;
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|s| !s.completed()));
        assert!(!store.all_required_completed());
    }

    #[tokio::test]
    async fn mark_completed_gates_halfway_then_fully() {
        let (mut store, _bus) = store_with(Arc::new(InMemoryRepository::new()));

        // Scenario A: one of two required sections read.
        let outcome = store
            .mark_completed(&user(), &SectionId::new("intro").unwrap(), 42)
            .await;
        assert_eq!(outcome, MarkOutcome::Persisted);
        assert_eq!(store.completion_percentage(), 50);
        assert_eq!(
            store.next_incomplete().unwrap().section().id().as_str(),
            "dialectic"
        );
        assert!(!store.all_required_completed());

        // Scenario B: the gate opens with the second section.
        store
            .mark_completed(&user(), &SectionId::new("dialectic").unwrap(), 18)
            .await;
        assert_eq!(store.completion_percentage(), 100);
        assert!(store.all_required_completed());
        assert!(store.next_incomplete().is_none());
    }

    #[tokio::test]
    async fn mark_completed_twice_is_idempotent() {
        let repo = InMemoryRepository::new();
        let (mut store, _bus) = store_with(Arc::new(repo.clone()));
        let section = SectionId::new("intro").unwrap();

        store.mark_completed(&user(), &section, 42).await;
        store.mark_completed(&user(), &section, 55).await;

        assert_eq!(store.completion_percentage(), 50);
        let rows = repo.list_progress(&user()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reading_time_seconds, 55);
    }

    #[tokio::test]
    async fn write_failure_falls_back_to_local_state() {
        let (mut store, bus) = store_with(Arc::new(FailingRepository));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe(move |event| {
            assert_eq!(*event, AppEvent::ProgressUpdated);
            h.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = store
            .mark_completed(&user(), &SectionId::new("intro").unwrap(), 42)
            .await;

        assert_eq!(outcome, MarkOutcome::LocalOnly);
        assert_eq!(store.completion_percentage(), 50);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_section_changes_nothing_and_stays_silent() {
        let (mut store, bus) = store_with(Arc::new(InMemoryRepository::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = store
            .mark_completed(&user(), &SectionId::new("ghost").unwrap(), 10)
            .await;

        assert_eq!(outcome, MarkOutcome::UnknownSection);
        assert_eq!(store.completion_percentage(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reset_clears_state_and_broadcasts() {
        let repo = InMemoryRepository::new();
        let (mut store, bus) = store_with(Arc::new(repo.clone()));
        store
            .mark_completed(&user(), &SectionId::new("intro").unwrap(), 42)
            .await;

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = bus.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        store.reset(&user()).await.unwrap();
        assert_eq!(store.completion_percentage(), 0);
        assert!(repo.list_progress(&user()).await.unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_failure_is_surfaced_and_keeps_state() {
        let repo = InMemoryRepository::new();
        let (mut store, _bus) = store_with(Arc::new(repo));
        store
            .mark_completed(&user(), &SectionId::new("intro").unwrap(), 42)
            .await;

        // Swap in a failing backend for the destructive call.
        store.repository = Arc::new(FailingRepository);
        let err = store.reset(&user()).await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::Storage(_)));
        assert_eq!(store.completion_percentage(), 50);
    }
}
