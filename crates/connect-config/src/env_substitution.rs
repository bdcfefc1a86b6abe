use connect_core::{ConnectError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::env;

// ${VAR} and ${VAR:-default}
static ENV_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern")
});

/// Substitute environment variables in every string inside `value`
pub fn substitute_env_vars(value: &mut Value) -> Result<()> {
    let mut missing = Vec::new();
    substitute_value(value, &mut missing);

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(ConnectError::Config(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn substitute_value(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if s.contains("${") {
                *s = substitute_in_string(s, missing);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, missing);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                substitute_value(v, missing);
            }
        }
        _ => {}
    }
}

fn substitute_in_string(input: &str, missing: &mut Vec<String>) -> String {
    ENV_VAR_REGEX
        .replace_all(input, |cap: &regex::Captures| {
            let var_name = &cap[1];
            match (env::var(var_name), cap.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    missing.push(var_name.to_string());
                    cap[0].to_string()
                }
            }
        })
        .into_owned()
}
