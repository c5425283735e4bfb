pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use config::{EnhancerConfig, WaitPolicy};
pub use error::{Error, Result};
pub use models::GenerativeModel;
pub use storage::ArticleStore;
pub use types::{
    Article, ArticleUpdate, CompetitorDigest, GenerationResult, ModelDescriptor, ModelReference,
};
