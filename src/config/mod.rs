pub mod settings;

pub use settings::{BackendSettings, Settings, SettingsOverrides, DEFAULT_LISTEN};
