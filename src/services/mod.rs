//! Collaborator services the pipeline calls out to.
//!
//! Each concern is a trait so the pipeline stages stay testable with fakes;
//! the `Http*` implementations talk to external endpoints with bounded
//! timeouts and surface failures as retryable transient errors.

pub mod generate;
pub mod retrieval;
pub mod speech;
pub mod storage;
pub mod translate;

pub use generate::{Draft, Generator, HttpGenerator};
pub use retrieval::{Chunk, HttpRetriever, Retriever};
pub use speech::{HttpSpeechEngine, SpeechEngine};
pub use storage::{InMemoryMediaStorage, MediaStorage};
pub use translate::{HttpTranslator, Translator};
