use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// `{{ env.VAR | default("fallback") }}` substitutes the fallback when the
/// variable is unset. Comment lines pass through untouched so commented-out
/// settings never fail expansion.
pub fn expand_env(input: &str) -> Result<String, String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER.get_or_init(|| {
        Regex::new(r#"\{\{\s*env\.([A-Za-z0-9_]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder pattern is valid")
    });

    let mut failure: Option<String> = None;
    let mut output = String::with_capacity(input.len());

    for (index, line) in input.lines().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let expanded = placeholder.replace_all(line, |captures: &Captures<'_>| {
            let name = &captures[1];
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => captures.get(2).map_or_else(
                    || {
                        failure.get_or_insert_with(|| {
                            format!("environment variable not found: `{name}`")
                        });
                        String::new()
                    },
                    |default| default.as_str().to_owned(),
                ),
            }
        });
        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    match failure {
        Some(message) => Err(message),
        None => Ok(output),
    }
}
