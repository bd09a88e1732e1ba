mod limits;
mod loader;
mod source;

pub use limits::{
    clamp_limit_mb, SizeLimit, DEFAULT_SIZE_LIMIT_MB, MAX_SIZE_LIMIT_MB, MIN_SIZE_LIMIT_MB,
    SIZE_LIMIT_ENV,
};
pub use loader::{DatasetIngestor, IngestError, DEFAULT_FETCH_TIMEOUT};
pub use source::{DatasetSource, SourceType};
