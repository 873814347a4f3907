//! Data models for the environment manager.
//!
//! - [`SettingsDocument`]: The persisted user configuration (`settings.json`) and its sub-records
//! - [`Location`]: Logical names of the well-known filesystem locations
//!
//! The settings records are plain serde structs. Loading, normalization and
//! persistence are handled by [`SettingsStore`](crate::config::SettingsStore).

pub mod paths;
pub mod settings;

pub use paths::Location;
pub use settings::{
    AudioOptions, AutoplayMode, DeviceKind, DeviceOptions, DisplayOptions, GameOptions,
    InputDeviceOptions, IoOptions, ModOptions, RenderQuality, SettingsDocument,
};
