pub mod config;
pub mod pipeline;
pub mod prompts;

pub use config::{load_config, ChatConfig};
pub use pipeline::{ChatError, ChatInput, ChatPipeline, ChatTurnOutcome, StreamEvent};
