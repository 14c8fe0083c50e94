//! Per-user settings with a closed key schema.
//!
//! Settings arrive as a free-form JSON object. Every key must be one of the
//! [`SettingKey`] variants and every value must match that key's kind; the
//! validated [`Settings`] map is what gets stored and merged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Validation errors raised while parsing a settings object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsValidationError {
    /// Top-level payload was not a JSON object.
    #[error("settings must be a JSON object")]
    NotAnObject,
    /// Key is not part of the settings schema.
    #[error("unknown setting '{key}'")]
    UnknownKey {
        /// The rejected key.
        key: String,
    },
    /// Value does not match the kind the key requires.
    #[error("setting '{key}' expects {expected}")]
    WrongKind {
        /// Key whose value was rejected.
        key: SettingKey,
        /// Human-readable description of the expected kind.
        expected: &'static str,
    },
}

/// Value kind accepted by a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// JSON boolean.
    Bool,
    /// `HH:MM` string.
    TimeOfDay,
    /// One of `light`, `dark` or `system`.
    Theme,
}

impl SettingKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::TimeOfDay => "a time of day formatted HH:MM",
            Self::Theme => "one of 'light', 'dark' or 'system'",
        }
    }
}

/// Recognised settings keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingKey {
    /// Master notification switch.
    NotificationsEnabled,
    /// Notify on likes.
    NotifyLikes,
    /// Notify on comments.
    NotifyComments,
    /// Notify on new followers.
    NotifyFollowers,
    /// Notify on private messages.
    NotifyMessages,
    /// Enable the quiet-hours window.
    QuietHoursEnabled,
    /// Start of the quiet-hours window.
    QuietHoursStart,
    /// End of the quiet-hours window.
    QuietHoursEnd,
    /// Show sensitive content.
    SensitiveContent,
    /// Display theme.
    Theme,
}

impl SettingKey {
    /// Every key in the schema.
    pub const ALL: [Self; 10] = [
        Self::NotificationsEnabled,
        Self::NotifyLikes,
        Self::NotifyComments,
        Self::NotifyFollowers,
        Self::NotifyMessages,
        Self::QuietHoursEnabled,
        Self::QuietHoursStart,
        Self::QuietHoursEnd,
        Self::SensitiveContent,
        Self::Theme,
    ];

    /// Wire name of the key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotificationsEnabled => "notificationsEnabled",
            Self::NotifyLikes => "notifyLikes",
            Self::NotifyComments => "notifyComments",
            Self::NotifyFollowers => "notifyFollowers",
            Self::NotifyMessages => "notifyMessages",
            Self::QuietHoursEnabled => "quietHoursEnabled",
            Self::QuietHoursStart => "quietHoursStart",
            Self::QuietHoursEnd => "quietHoursEnd",
            Self::SensitiveContent => "sensitiveContent",
            Self::Theme => "theme",
        }
    }

    /// Value kind this key accepts.
    pub fn kind(self) -> SettingKind {
        match self {
            Self::QuietHoursStart | Self::QuietHoursEnd => SettingKind::TimeOfDay,
            Self::Theme => SettingKind::Theme,
            _ => SettingKind::Bool,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SettingsValidationError::UnknownKey { key: s.to_owned() })
    }
}

/// Display theme choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Light palette.
    Light,
    /// Dark palette.
    Dark,
    /// Follow the client platform.
    System,
}

impl Theme {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Wall-clock time with minute precision, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    const FORMAT: &'static str = "%H:%M";

    fn parse(raw: &str) -> Option<Self> {
        if raw.len() != 5 {
            return None;
        }
        NaiveTime::parse_from_str(raw, Self::FORMAT).ok().map(Self)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Typed setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean toggle.
    Bool(bool),
    /// `HH:MM` time.
    TimeOfDay(TimeOfDay),
    /// Theme choice.
    Theme(Theme),
}

impl SettingValue {
    /// Parse `raw` as the kind `key` requires.
    pub fn parse(key: SettingKey, raw: &Value) -> Result<Self, SettingsValidationError> {
        let kind = key.kind();
        let parsed = match (kind, raw) {
            (SettingKind::Bool, Value::Bool(flag)) => Some(Self::Bool(*flag)),
            (SettingKind::TimeOfDay, Value::String(text)) => {
                TimeOfDay::parse(text).map(Self::TimeOfDay)
            }
            (SettingKind::Theme, Value::String(text)) => Theme::parse(text).map(Self::Theme),
            _ => None,
        };
        parsed.ok_or(SettingsValidationError::WrongKind {
            key,
            expected: kind.describe(),
        })
    }
}

/// Validated settings map.
///
/// # Examples
/// ```
/// use postboard::domain::{SettingKey, SettingValue, Settings};
/// use serde_json::json;
///
/// let settings = Settings::from_json(&json!({"notifyLikes": false, "theme": "dark"})).unwrap();
/// assert_eq!(settings.get(SettingKey::NotifyLikes), Some(SettingValue::Bool(false)));
/// assert!(Settings::from_json(&json!({"fontSize": 12})).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<SettingKey, SettingValue>);

impl Settings {
    /// Validate a JSON object against the key schema.
    pub fn from_json(raw: &Value) -> Result<Self, SettingsValidationError> {
        let object = raw
            .as_object()
            .ok_or(SettingsValidationError::NotAnObject)?;
        Self::from_map(object)
    }

    /// Validate an already-split JSON object.
    pub fn from_map(object: &Map<String, Value>) -> Result<Self, SettingsValidationError> {
        let mut values = BTreeMap::new();
        for (raw_key, raw_value) in object {
            let key = raw_key.parse::<SettingKey>()?;
            values.insert(key, SettingValue::parse(key, raw_value)?);
        }
        Ok(Self(values))
    }

    /// Render as a JSON object for storage.
    pub fn to_json(&self) -> Value {
        let object = self
            .0
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    SettingValue::Bool(flag) => Value::Bool(*flag),
                    SettingValue::TimeOfDay(time) => Value::String(time.to_string()),
                    SettingValue::Theme(theme) => Value::String(theme_name(*theme).to_owned()),
                };
                (key.as_str().to_owned(), rendered)
            })
            .collect();
        Value::Object(object)
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Look up one key.
    pub fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.0.get(&key).copied()
    }

    /// True when no key is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys set.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn theme_name(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
        Theme::System => "system",
    }
}
