pub mod config;
pub mod interface;
pub mod openai;
pub mod service;

pub use config::{load_config, SttConfig};
pub use interface::{SttError, SttProvider};
pub use service::SttService;
