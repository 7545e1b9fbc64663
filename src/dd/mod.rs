pub mod context;
pub mod openai;
pub mod scorecard;

pub use context::DdContext;
pub use openai::OpenAiClient;
