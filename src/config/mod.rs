//! Configuration module for the lecture relay.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnalysisPrompts, Prompts};
pub use settings::{
    AnalysisSettings, CaptionSettings, DownloadSettings, GeminiSettings, GeneralSettings,
    PromptSettings, ServerSettings, Settings,
};
