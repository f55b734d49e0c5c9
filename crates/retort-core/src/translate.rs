//! Localization seam
//!
//! Error factories stamp a `message_key` alongside their literal text; the
//! key is resolved here during serialization, so the same reply can render
//! in different locales without recreating its errors.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Fault;

/// External translation collaborator
///
/// `Ok(None)` means the key is unknown; callers fall back to the error's
/// literal message.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Resolve a message key for the given locale
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the backing service fails; unknown keys are
    /// `Ok(None)`, not errors
    async fn translate(
        &self,
        key: &str,
        data: Option<&Value>,
        locale: Option<&str>,
    ) -> Result<Option<String>, Fault>;
}

/// In-memory catalog translator
///
/// Templates may reference fields of the error's `message_data` with
/// `{name}` placeholders.
#[derive(Debug, Default)]
pub struct TableTranslator {
    default_locale: Option<String>,
    tables: HashMap<String, HashMap<String, String>>,
}

impl TableTranslator {
    /// Create an empty catalog with a fallback locale
    #[must_use]
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: Some(default_locale.into()),
            tables: HashMap::new(),
        }
    }

    /// Register a template for a locale and key
    pub fn insert(
        &mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> &mut Self {
        self.tables
            .entry(locale.into())
            .or_default()
            .insert(key.into(), template.into());
        self
    }

    fn lookup(&self, key: &str, locale: Option<&str>) -> Option<&str> {
        let requested = locale
            .and_then(|l| self.tables.get(l))
            .and_then(|table| table.get(key));

        requested
            .or_else(|| {
                self.default_locale
                    .as_deref()
                    .and_then(|l| self.tables.get(l))
                    .and_then(|table| table.get(key))
            })
            .map(String::as_str)
    }
}

#[async_trait]
impl Translator for TableTranslator {
    async fn translate(
        &self,
        key: &str,
        data: Option<&Value>,
        locale: Option<&str>,
    ) -> Result<Option<String>, Fault> {
        Ok(self.lookup(key, locale).map(|template| substitute(template, data)))
    }
}

/// Replace `{name}` placeholders with values from a JSON object
fn substitute(template: &str, data: Option<&Value>) -> String {
    let Some(Value::Object(fields)) = data else {
        return template.to_owned();
    };

    let mut rendered = template.to_owned();
    for (name, value) in fields {
        let needle = format!("{{{name}}}");
        if !rendered.contains(&needle) {
            continue;
        }
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&needle, &replacement);
    }
    rendered
}
