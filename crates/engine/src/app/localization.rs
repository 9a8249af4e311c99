use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Translation lookup used for level titles and dialog text.
pub trait Localizer {
    /// Unknown keys translate to themselves. `{name}` placeholders are replaced
    /// by the matching argument.
    fn translate(&self, key: &str, args: &[(String, String)]) -> String;
}

/// Returns every key unchanged, with arguments still substituted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untranslated;

impl Localizer for Untranslated {
    fn translate(&self, key: &str, args: &[(String, String)]) -> String {
        substitute_args(key, args)
    }
}

#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("failed to read language file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse language file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct LanguageFile {
    name: String,
    #[serde(default)]
    translations: serde_json::Map<String, Value>,
}

/// One `langs/<code>.json` file. Nested objects and arrays flatten into dotted keys
/// (`menu.start`, `credits.0.name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    code: String,
    name: String,
    mappings: HashMap<String, String>,
}

impl Language {
    pub fn load(path: &Path) -> Result<Self, LocalizationError> {
        let raw = fs::read_to_string(path).map_err(|source| LocalizationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let code = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let language = Self::parse(code, &raw).map_err(|source| LocalizationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            code = %language.code,
            entries = language.mappings.len(),
            "language_loaded"
        );
        Ok(language)
    }

    pub fn parse(code: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        let file: LanguageFile = serde_json::from_str(json)?;
        let mut mappings = HashMap::new();
        for (key, value) in &file.translations {
            flatten_into(&mut mappings, key.clone(), value);
        }
        Ok(Self {
            code: code.into(),
            name: file.name,
            mappings,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Localizer for Language {
    fn translate(&self, key: &str, args: &[(String, String)]) -> String {
        let template = self.mappings.get(key).map(String::as_str).unwrap_or(key);
        substitute_args(template, args)
    }
}

fn flatten_into(mappings: &mut HashMap<String, String>, key: String, value: &Value) {
    match value {
        Value::Object(entries) => {
            for (child, value) in entries {
                flatten_into(mappings, format!("{key}.{child}"), value);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(mappings, format!("{key}.{index}"), value);
            }
        }
        Value::Null => {}
        Value::String(text) => {
            mappings.insert(key, text.clone());
        }
        other => {
            mappings.insert(key, other.to_string());
        }
    }
}

fn substitute_args(template: &str, args: &[(String, String)]) -> String {
    let mut text = template.to_string();
    for (name, value) in args {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}
