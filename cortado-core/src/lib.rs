pub mod error;

pub use error::{EngineError, EngineResult, StorageError};
