pub mod metadata_cache;
pub mod score_store;
pub mod snapshot;

mod macros;

pub use metadata_cache::MetadataCache;
pub use score_store::{ScoreBook, ScoreEntry};
pub use snapshot::{CollectionSnapshot, SnapshotItem};
