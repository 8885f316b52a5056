use std::sync::Arc;

use storage::repository::Storage;
use training_core::model::SectionRegistry;

use crate::Clock;
use crate::events::EventBus;
use crate::identity::IdentityProvider;
use crate::progress_store::ProgressStore;
use crate::quiz_service::QuizSessionService;

/// Assembles the app-facing services around one shared event bus.
///
/// One instance per user session/request context; nothing here is global, so
/// tests can build as many isolated assemblies as they need.
pub struct AppServices {
    events: EventBus,
    progress: ProgressStore,
    quiz: QuizSessionService,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        registry: SectionRegistry,
        identity: Arc<dyn IdentityProvider>,
        clock: Clock,
    ) -> Self {
        let events = EventBus::new();
        let progress = ProgressStore::new(
            clock,
            registry,
            Arc::clone(&storage.progress),
            events.clone(),
        );
        let quiz = QuizSessionService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.results),
            identity,
        );

        Self {
            events,
            progress,
            quiz,
        }
    }

    /// Convenience assembly over the in-memory storage backend.
    #[must_use]
    pub fn in_memory(
        registry: SectionRegistry,
        identity: Arc<dyn IdentityProvider>,
        clock: Clock,
    ) -> Self {
        Self::new(&Storage::in_memory(), registry, identity, clock)
    }

    /// Shared broadcast channel; clone it into every surface that needs to
    /// observe or publish.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressStore {
        &mut self.progress
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizSessionService {
        &self.quiz
    }

    pub fn quiz_mut(&mut self) -> &mut QuizSessionService {
        &mut self.quiz
    }
}
