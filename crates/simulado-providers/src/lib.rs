//! simulado-providers — generator and store implementations.
//!
//! Implements the `ContentGenerator` trait for the OpenAI API plus a
//! deterministic mock, and the `SessionStore` trait in-memory and on disk.

pub mod config;
pub mod mock;
pub mod openai;
pub mod store;

pub use config::{
    create_generator, create_store, load_config, load_config_from, GeneratorConfig, SimuladoConfig,
};
pub use mock::MockGenerator;
pub use openai::OpenAiGenerator;
pub use store::{JsonFileStore, MemoryStore};
