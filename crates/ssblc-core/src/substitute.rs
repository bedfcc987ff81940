//! Variable substitution for templated links.
//!
//! Links may embed `{{ vars.<dotted.path> }}` placeholders that are resolved
//! against a JSON context file loaded once at startup.
//!
//! # Example
//!
//! ```rust
//! use ssblc_core::substitute::{Context, substitute};
//!
//! let context = Context::from_value(serde_json::json!({"api": {"host": "http://x"}}));
//! assert_eq!(
//!     substitute("{{ vars.api.host }}/health", Some(&context)),
//!     "http://x/health"
//! );
//! ```

use std::path::Path;
use std::sync::LazyLock;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::AppError;
use crate::models::Link;

/// Characters escaped when re-encoding a substituted link.
///
/// Reserved URI delimiters (`/ ? # & = : @` ...) are kept so the result stays
/// a usable URL.
const URI_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*vars\.(.*?)\s*\}\}").expect("placeholder pattern is valid")
});

/// Read-only variables referenced by templated links.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    vars: Value,
}

impl Context {
    pub fn from_value(vars: Value) -> Self {
        Self { vars }
    }

    /// Load variables from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ContextError(format!(
                "Context file not found or unreadable: {} ({e})",
                path.display()
            ))
        })?;

        let vars: Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::ContextError(format!("Invalid JSON in {}: {e}", path.display()))
        })?;

        Ok(Self { vars })
    }

    /// Walk a dotted path (`a.b.c`) and render the scalar found there.
    ///
    /// Missing segments, objects, arrays and `null` resolve to `None`.
    pub fn lookup(&self, dotted: &str) -> Option<String> {
        let value = dotted
            .split('.')
            .try_fold(&self.vars, |node, key| node.get(key))?;

        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Resolve every placeholder in `link`.
///
/// The link is percent-decoded first so encoded placeholders are found,
/// then re-encoded after substitution. Unresolvable placeholders are left
/// as they were. Without a context the link is returned untouched.
pub fn substitute(link: &str, context: Option<&Context>) -> Link {
    let Some(context) = context else {
        return link.to_string();
    };

    let decoded = percent_decode_str(link).decode_utf8_lossy();
    let replaced = PLACEHOLDER.replace_all(&decoded, |caps: &Captures<'_>| {
        context
            .lookup(&caps[1])
            .unwrap_or_else(|| caps[0].to_string())
    });

    utf8_percent_encode(&replaced, URI_ESCAPE).to_string()
}
