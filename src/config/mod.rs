//! Configuration module for Clipbot.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    GeneralSettings, ProcessingSettings, ServerSettings, SessionSettings, Settings,
    SurfaceKind, SurfaceSettings, TelegramSettings, BOT_TOKEN_ENV,
};
