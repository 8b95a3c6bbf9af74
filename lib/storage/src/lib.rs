pub mod csv_source;
pub mod github;
pub mod manager;
pub mod sqlite_source;

pub use csv_source::CsvSource;
pub use github::{GithubConfig, GithubSync, SyncOutcome};
pub use manager::{SourceConfig, StorageManager};
pub use sqlite_source::{SqliteSource, DEFAULT_TABLE};
