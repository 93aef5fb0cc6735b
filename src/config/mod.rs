//! Configuration management.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts, SuggestPrompts};
pub use settings::{
    AnswerSettings, AuthSettings, EmbeddingSettings, FetchSettings, GeneralSettings,
    PromptSettings, RetrievalSettings, ServerSettings, Settings, StoreSettings, SuggestSettings,
    WeatherSettings,
};
