pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, ProgressStore, QuestionSource, ResumeTokenRepository, Storage, StorageError,
    SubmissionSink,
};
