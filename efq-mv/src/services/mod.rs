//! Run orchestration and external collaborators

pub mod authorizer;
pub mod notifier;
pub mod runner;
pub mod store;

pub use authorizer::{Authorizer, AuthorizerError, SqliteAuthorizer};
pub use notifier::{
    EmailMessage, EmailSender, NotificationDispatcher, NotificationOutcome, NotificationPort,
    NotifyError, ResendClient,
};
pub use runner::{
    Clock, RunError, RunRequest, RunState, RunTrace, RunnerConfig, ValidationRunner,
};
pub use store::{MaterialStore, SqliteMaterialStore, StoreError};
