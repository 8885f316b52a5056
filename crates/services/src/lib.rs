#![forbid(unsafe_code)]

pub mod app_services;
pub mod backend;
pub mod error;
pub mod events;
pub mod identity;
pub mod progress_store;
pub mod quiz_service;

pub use training_core::Clock;

pub use app_services::AppServices;
pub use backend::HttpBackend;
pub use error::{ProgressStoreError, QuizError};
pub use events::{AppEvent, EventBus, Subscription};
pub use identity::{CurrentUser, IdentityProvider, StaticIdentity};
pub use progress_store::{MarkOutcome, ProgressStore};
pub use quiz_service::{PersistOutcome, QuizCompletion, QuizSessionService, SaveWarning};
