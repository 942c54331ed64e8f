//! Localized user-facing strings
//!
//! Every message shown on screen or in a desktop notification goes through
//! [`Translator::t`]. Tables are flat JSON objects of `key -> template`, with
//! `{name}` placeholders. `en` and `fi` are compiled in; a file
//! `$XDG_CONFIG_HOME/todaytasks/lang/<code>.json` takes precedence.

use crate::config::Config;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

const BUILTIN_EN: &str = include_str!("../lang/en.json");
const BUILTIN_FI: &str = include_str!("../lang/fi.json");

/// Key-to-template lookup with placeholder interpolation.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    table: HashMap<String, String>,
}

impl Translator {
    /// Load the table for `code`, preferring an override file in the
    /// configuration directory.
    pub fn load(code: &str) -> Result<Self> {
        Self::load_with_overrides(code, &Config::lang_dir())
    }

    /// Load the table for `code`, preferring `<dir>/<code>.json`.
    pub fn load_with_overrides(code: &str, dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{code}.json"));
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let translator = Self::from_json(&content).map_err(|e| {
                Error::Translation(format!("{}: {}", path.display(), e))
            })?;
            tracing::info!(path = %path.display(), "Loaded translation override");
            return Ok(translator);
        }

        let builtin = match code {
            "en" => BUILTIN_EN,
            "fi" => BUILTIN_FI,
            other => {
                return Err(Error::Translation(format!(
                    "no translation table for language '{}' (looked for {})",
                    other,
                    path.display()
                )))
            }
        };
        Self::from_json(builtin)
    }

    /// Parse a flat JSON object of strings.
    pub fn from_json(content: &str) -> Result<Self> {
        let table: HashMap<String, String> = serde_json::from_str(content)?;
        if table.is_empty() {
            return Err(Error::Translation("translation table is empty".to_string()));
        }
        Ok(Self { table })
    }

    /// A translator that knows no keys; every lookup returns the key.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Look up `key` and substitute `params` into its template.
    ///
    /// A missing key yields the key itself. A template referencing a
    /// parameter that was not supplied, or with unbalanced braces, yields
    /// `FORMAT_ERROR_FOR_KEY: <key>`. Without parameters the template is
    /// returned untouched.
    pub fn t(&self, key: &str, params: &[(&str, &dyn Display)]) -> String {
        let template = self.table.get(key).map(String::as_str).unwrap_or(key);
        if params.is_empty() {
            return template.to_string();
        }
        interpolate(template, params).unwrap_or_else(|| format!("FORMAT_ERROR_FOR_KEY: {key}"))
    }
}

fn interpolate(template: &str, params: &[(&str, &dyn Display)]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        '{' => return None,
                        other => name.push(other),
                    }
                }
                let (_, value) = params.iter().find(|(p, _)| *p == name)?;
                out.push_str(&value.to_string());
            }
            '}' => return None,
            other => out.push(other),
        }
    }

    Some(out)
}
