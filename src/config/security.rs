use serde_yaml::Value;
use crate::errors::FuzzchainError;

/// Substrings no config value may contain (case-insensitive).
const DANGEROUS_PATTERNS: &[&str] = &[
    "../",
    "..\\",
    "<script",
    "javascript:",
    "vbscript:",
    "data:",
    "file:",
];

/// Reject the document if any string value contains a dangerous pattern.
/// The error names the dotted key path of the offending value.
pub fn validate_security_patterns(value: &Value) -> Result<(), FuzzchainError> {
    match find_dangerous(value, &mut Vec::new()) {
        Some((pattern, path)) => Err(FuzzchainError::Config(format!(
            "Dangerous pattern '{}' found at config path: {}",
            pattern, path
        ))),
        None => Ok(()),
    }
}

fn find_dangerous(value: &Value, path: &mut Vec<String>) -> Option<(&'static str, String)> {
    match value {
        Value::String(s) => {
            let lower = s.to_lowercase();
            DANGEROUS_PATTERNS
                .iter()
                .find(|p| lower.contains(*p))
                .map(|p| (*p, if path.is_empty() { "root".to_string() } else { path.join(".") }))
        }
        Value::Mapping(map) => map.iter().find_map(|(k, v)| {
            path.push(k.as_str().unwrap_or("unknown").to_string());
            let hit = find_dangerous(v, path);
            path.pop();
            hit
        }),
        Value::Sequence(seq) => seq.iter().enumerate().find_map(|(i, v)| {
            path.push(format!("[{}]", i));
            let hit = find_dangerous(v, path);
            path.pop();
            hit
        }),
        _ => None,
    }
}
