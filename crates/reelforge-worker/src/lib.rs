//! Job processing for ReelForge.
//!
//! The worker side of the system: a registry mapping job types to
//! processors, thin per-type processors that drive external generation
//! providers, and an executor that polls the store for pending work.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod processors;
pub mod provider;
pub mod registry;

pub use config::WorkerConfig;
pub use context::JobContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use processors::register_default_processors;
pub use provider::{Artifact, GenerationProvider, MemoryStorage, ObjectStorage, StaticProvider};
pub use registry::{JobProcessor, ProcessorRegistry};
