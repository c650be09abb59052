use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Nil,
}

impl SettingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            SettingValue::Number(n) => Some(*n != 0.0),
            SettingValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            SettingValue::Nil => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Number(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Boolean(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

/// Read side of a namespaced key-value settings store.
///
/// Components read what they need once, at construction time.
pub trait SettingsProvider {
    fn get(&self, category: &str, key: &str, default: SettingValue) -> SettingValue;
}

/// In-memory settings keyed by `(category, key)`.
#[derive(Debug, Default)]
pub struct SettingsStore {
    values: HashMap<(String, String), SettingValue>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: &str, key: &str, value: impl Into<SettingValue>) {
        self.values
            .insert((category.to_string(), key.to_string()), value.into());
    }

    pub fn category(&self, category: &str) -> Vec<(&str, &SettingValue)> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .filter(|((c, _), _)| c == category)
            .map(|((_, k), v)| (k.as_str(), v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl SettingsProvider for SettingsStore {
    fn get(&self, category: &str, key: &str, default: SettingValue) -> SettingValue {
        match self.values.get(&(category.to_string(), key.to_string())) {
            Some(SettingValue::Nil) | None => default,
            Some(value) => value.clone(),
        }
    }
}
