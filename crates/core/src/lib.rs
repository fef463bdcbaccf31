pub mod config;
pub mod error;
pub mod skill;
pub mod store;
pub mod types;

pub use config::{FailureMode, ProviderConfig, RunConfig};
pub use error::{Error, Result};
pub use skill::{FieldKind, Modality, OutputField, OutputSchema, SkillDefinition};
pub use store::SkillStore;
pub use types::{ChatMessage, ProviderResponse, Record, RenderedRequest};
