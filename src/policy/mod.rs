pub mod card;
pub mod config;
pub mod engine;

pub use card::{build_card, AltLink, CardButton, SuggestionCard};
pub use config::PolicyConfig;
pub use engine::{Decision, PreferenceSnapshot, ProactivePolicy, SuggestAction, SuggestionType};
