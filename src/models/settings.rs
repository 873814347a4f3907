use serde::{Deserialize, Deserializer, Serialize};

/// Declares an option enum that serializes by variant name and deserializes
/// by name ignoring ASCII case (`"enable"`, `"Enable"` and `"ENABLE"` are the
/// same value). Ordinals are rejected.
macro_rules! named_option {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            #[default]
            $default:ident,
            $($variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
        pub enum $name {
            #[default]
            $default,
            $($variant),+
        }

        impl $name {
            pub const VARIANTS: &'static [&'static str] =
                &[stringify!($default), $(stringify!($variant)),+];

            /// Look up a variant by name, ignoring ASCII case
            pub fn from_name(name: &str) -> Option<Self> {
                if name.eq_ignore_ascii_case(stringify!($default)) {
                    return Some(Self::$default);
                }
                $(
                    if name.eq_ignore_ascii_case(stringify!($variant)) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Self::from_name(&name)
                    .ok_or_else(|| serde::de::Error::unknown_variant(&name, Self::VARIANTS))
            }
        }
    };
}

named_option! {
    /// Rendering quality preset
    pub enum RenderQuality {
        #[default]
        High,
        Medium,
        Low,
    }
}

named_option! {
    /// Hardware backing an input device
    pub enum DeviceKind {
        #[default]
        Keyboard,
        Hid,
        Serial,
    }
}

named_option! {
    pub enum AutoplayMode {
        #[default]
        Disable,
        Enable,
        Random,
        DJAuto,
    }
}

/// The persisted user configuration.
///
/// Keys are written in PascalCase. Every record falls back to its defaults
/// for missing keys, so partial documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SettingsDocument {
    pub game: GameOptions,
    pub display: DisplayOptions,
    pub audio: AudioOptions,
    #[serde(rename = "IO")]
    pub io: IoOptions,
    /// Session-scoped; replaced with defaults on every load
    #[serde(rename = "Mod")]
    pub mod_options: ModOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GameOptions {
    pub tap_speed: f32,
    pub touch_speed: f32,
    pub slide_fade_in_offset: f32,
    pub language: String,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            tap_speed: 7.5,
            touch_speed: 7.5,
            slide_fade_in_offset: 0.0,
            language: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DisplayOptions {
    pub skin: String,
    pub resolution: String,
    pub render_quality: RenderQuality,
    /// Clamped to `[0, 1]` on load
    pub inner_judge_distance: f32,
    /// Clamped to `[0, 1]` on load
    pub outer_judge_distance: f32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            skin: "default".to_string(),
            resolution: "Auto".to_string(),
            render_quality: RenderQuality::default(),
            inner_judge_distance: 1.0,
            outer_judge_distance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AudioOptions {
    pub global: f32,
    pub answer: f32,
    pub tap: f32,
    pub slide: f32,
    #[serde(rename = "Break")]
    pub break_note: f32,
    pub bgm: f32,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            global: 0.8,
            answer: 0.8,
            tap: 0.3,
            slide: 0.3,
            break_note: 0.3,
            bgm: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct IoOptions {
    pub input_device: InputDeviceOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InputDeviceOptions {
    pub button_ring: DeviceOptions,
    pub touch_panel: DeviceOptions,
}

impl Default for InputDeviceOptions {
    fn default() -> Self {
        Self {
            button_ring: DeviceOptions::default(),
            touch_panel: DeviceOptions {
                kind: DeviceKind::Serial,
                ..DeviceOptions::default()
            },
        }
    }
}

/// Polling and debounce tuning for one input device.
///
/// The integer fields are signed so that hand-edited negative values still
/// decode; load floors them to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceOptions {
    #[serde(rename = "Type")]
    pub kind: DeviceKind,
    pub polling_rate_ms: i32,
    pub debounce_threshold_ms: i32,
    pub debounce: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            polling_rate_ms: 0,
            debounce_threshold_ms: 16,
            debounce: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModOptions {
    pub play_speed: f32,
    pub auto_play: AutoplayMode,
    pub all_break: bool,
    pub all_ex: bool,
    pub all_touch: bool,
    pub slide_no_head: bool,
    pub button_ring_for_touch: bool,
}

impl Default for ModOptions {
    fn default() -> Self {
        Self {
            play_speed: 1.0,
            auto_play: AutoplayMode::default(),
            all_break: false,
            all_ex: false,
            all_touch: false,
            slide_no_head: false,
            button_ring_for_touch: false,
        }
    }
}

impl DeviceOptions {
    fn normalize(&mut self) {
        self.polling_rate_ms = self.polling_rate_ms.max(0);
        self.debounce_threshold_ms = self.debounce_threshold_ms.max(0);
    }
}

impl SettingsDocument {
    /// Floor device timings at zero and clamp judge distances into `[0, 1]`.
    ///
    /// A NaN judge distance is replaced by the default.
    pub fn normalize(&mut self) {
        self.io.input_device.button_ring.normalize();
        self.io.input_device.touch_panel.normalize();
        self.display.inner_judge_distance = clamp_unit(self.display.inner_judge_distance);
        self.display.outer_judge_distance = clamp_unit(self.display.outer_judge_distance);
    }

    /// Drop whatever mod options were carried over from a previous session
    pub fn reset_session_state(&mut self) {
        self.mod_options = ModOptions::default();
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_option_ignores_case() {
        assert_eq!(AutoplayMode::from_name("enable"), Some(AutoplayMode::Enable));
        assert_eq!(AutoplayMode::from_name("DJAUTO"), Some(AutoplayMode::DJAuto));
        assert_eq!(RenderQuality::from_name("mEdIuM"), Some(RenderQuality::Medium));
        assert_eq!(RenderQuality::from_name("Ultra"), None);
    }

    #[test]
    fn test_named_option_serializes_by_name() {
        let json = serde_json::to_string(&DeviceKind::Hid).unwrap();
        assert_eq!(json, "\"Hid\"");

        let kind: DeviceKind = serde_json::from_str("\"serial\"").unwrap();
        assert_eq!(kind, DeviceKind::Serial);
    }

    #[test]
    fn test_named_option_rejects_ordinals() {
        assert!(serde_json::from_str::<DeviceKind>("1").is_err());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let doc: SettingsDocument =
            serde_json::from_str(r#"{ "Display": { "Skin": "midnight" } }"#).unwrap();
        assert_eq!(doc.display.skin, "midnight");
        assert_eq!(doc.display.inner_judge_distance, 1.0);
        assert_eq!(doc.game, GameOptions::default());
    }

    #[test]
    fn test_normalize_floors_and_clamps() {
        let mut doc = SettingsDocument::default();
        doc.io.input_device.button_ring.polling_rate_ms = -3;
        doc.io.input_device.touch_panel.debounce_threshold_ms = -20;
        doc.display.inner_judge_distance = -0.5;
        doc.display.outer_judge_distance = 1.7;

        doc.normalize();

        assert_eq!(doc.io.input_device.button_ring.polling_rate_ms, 0);
        assert_eq!(doc.io.input_device.touch_panel.debounce_threshold_ms, 0);
        assert_eq!(doc.display.inner_judge_distance, 0.0);
        assert_eq!(doc.display.outer_judge_distance, 1.0);
    }

    #[test]
    fn test_normalize_replaces_nan_distance() {
        let mut doc = SettingsDocument::default();
        doc.display.inner_judge_distance = f32::NAN;
        doc.normalize();
        assert_eq!(doc.display.inner_judge_distance, 1.0);
    }

    #[test]
    fn test_reset_session_state() {
        let mut doc = SettingsDocument::default();
        doc.mod_options.all_break = true;
        doc.mod_options.auto_play = AutoplayMode::Random;

        doc.reset_session_state();

        assert_eq!(doc.mod_options, ModOptions::default());
    }

    mod props {
        use crate::models::settings::SettingsDocument;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalized_fields_stay_in_range(
                polling in any::<i32>(),
                debounce in any::<i32>(),
                inner in -10.0f32..10.0,
                outer in -10.0f32..10.0,
            ) {
                let mut doc = SettingsDocument::default();
                doc.io.input_device.button_ring.polling_rate_ms = polling;
                doc.io.input_device.touch_panel.debounce_threshold_ms = debounce;
                doc.display.inner_judge_distance = inner;
                doc.display.outer_judge_distance = outer;

                doc.normalize();

                prop_assert!(doc.io.input_device.button_ring.polling_rate_ms >= 0);
                prop_assert!(doc.io.input_device.touch_panel.debounce_threshold_ms >= 0);
                prop_assert!((0.0..=1.0).contains(&doc.display.inner_judge_distance));
                prop_assert!((0.0..=1.0).contains(&doc.display.outer_judge_distance));
            }

            #[test]
            fn normalize_is_idempotent(polling in any::<i32>(), inner in -10.0f32..10.0) {
                let mut doc = SettingsDocument::default();
                doc.io.input_device.button_ring.polling_rate_ms = polling;
                doc.display.inner_judge_distance = inner;
                doc.normalize();
                let once = doc.clone();
                doc.normalize();
                prop_assert_eq!(once, doc);
            }
        }
    }
}
