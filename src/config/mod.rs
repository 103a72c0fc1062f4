mod settings;

pub use settings::{Settings, SettingsFile};
