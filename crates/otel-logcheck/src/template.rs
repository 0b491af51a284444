//! Placeholder template rendering.
//!
//! Expectation templates are JSON documents with `{{name}}` placeholders.
//! Names are resolved through [`ValidationContext::variable`]; unknown
//! names render as an empty string.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::Result;
use crate::traits::TemplateRenderer;
use crate::types::ValidationContext;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap_or_else(|_| unreachable!())
});

/// Renders `{{name}}` placeholders from the validation context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    /// Creates a renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Substitutes placeholders without any further checks.
    #[must_use]
    pub fn substitute<'t>(template: &'t str, context: &ValidationContext) -> Cow<'t, str> {
        PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match context.variable(name) {
                Some(value) => escape_json(value),
                None => {
                    debug!(name, "unknown template variable");
                    String::new()
                }
            }
        })
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, context: &ValidationContext) -> Result<String> {
        Ok(Self::substitute(template, context).into_owned())
    }
}

// Values land inside JSON string literals.
fn escape_json(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
