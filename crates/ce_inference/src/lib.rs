pub mod generator;
pub mod models;
pub mod prompt;
pub mod resolver;

pub use generator::RewriteGenerator;
pub use models::{create_model, GeminiModel};
pub use resolver::{select_model, ModelResolver};

pub mod prelude {
    pub use super::generator::RewriteGenerator;
    pub use super::models::create_model;
    pub use super::resolver::ModelResolver;
    pub use ce_core::{GenerationResult, GenerativeModel, ModelReference, Result, Error};
}
