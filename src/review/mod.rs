pub mod gemini;
pub mod generator;
pub mod prompt;
pub mod types;

pub use gemini::GeminiClient;
pub use generator::{GenerationError, ReviewGenerator};
pub use prompt::build_prompt;
