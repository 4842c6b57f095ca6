//! Schema validation for deploy configuration files.
//!
//! Validation runs on the raw JSON value before typed decoding so that every
//! violation in a file is reported at once, not only the first one serde
//! trips over.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single schema violation, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

const OVERRIDE_KEYS: &[&str] = &["name", "profile", "region", "tags", "artifacts"];
const ARTIFACT_KEYS: &[&str] = &["docker", "lambda", "s3"];
const PROFILE_KEYS: &[&str] = &[
    "region",
    "github",
    "tags",
    "accountId",
    "accessKeyId",
    "secretAccessKey",
    "sessionToken",
];

/// Validate a per-repository `.deploy` document.
pub fn validate_override(value: &Value) -> Vec<Violation> {
    let mut v = Validator::default();
    let Some(obj) = v.object("", value) else {
        return v.finish();
    };

    v.unknown_keys("", obj, OVERRIDE_KEYS);
    v.optional_string("/name", obj.get("name"));
    v.optional_string("/profile", obj.get("profile"));
    v.optional_region("/region", obj.get("region"));
    if let Some(tags) = obj.get("tags") {
        v.tags("/tags", tags);
    }
    if let Some(artifacts) = obj.get("artifacts")
        && let Some(artifacts) = v.object("/artifacts", artifacts)
    {
        v.unknown_keys("/artifacts", artifacts, ARTIFACT_KEYS);
        for key in ARTIFACT_KEYS {
            if let Some(setting) = artifacts.get(*key) {
                v.artifact_setting(&format!("/artifacts/{}", key), setting);
            }
        }
    }

    v.finish()
}

/// Validate a global `~/.deployrc.json` profile store.
pub fn validate_store(value: &Value) -> Vec<Violation> {
    let mut v = Validator::default();
    let Some(profiles) = v.object("", value) else {
        return v.finish();
    };

    for (name, profile) in profiles {
        let base = format!("/{}", escape_pointer(name));
        if name.trim().is_empty() {
            v.push(&base, "profile name must not be empty");
        }
        let Some(profile) = v.object(&base, profile) else {
            continue;
        };
        v.unknown_keys(&base, profile, PROFILE_KEYS);
        v.optional_region(&format!("{}/region", base), profile.get("region"));
        v.optional_string(&format!("{}/github", base), profile.get("github"));
        for key in ["accountId", "accessKeyId", "secretAccessKey", "sessionToken"] {
            v.optional_string(&format!("{}/{}", base, key), profile.get(key));
        }
        if let Some(tags) = profile.get("tags") {
            v.tags(&format!("{}/tags", base), tags);
        }
    }

    v.finish()
}

#[derive(Default)]
struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn finish(self) -> Vec<Violation> {
        self.violations
    }

    fn object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(obj) => Some(obj),
            other => {
                self.push(path, format!("must be an object, found {}", kind_of(other)));
                None
            }
        }
    }

    fn unknown_keys(&mut self, path: &str, obj: &Map<String, Value>, allowed: &[&str]) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.push(
                    &format!("{}/{}", path, escape_pointer(key)),
                    "is not a recognised property",
                );
            }
        }
    }

    fn optional_string(&mut self, path: &str, value: Option<&Value>) {
        match value {
            None => {}
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => self.push(path, "must not be empty"),
            Some(other) => self.push(path, format!("must be a string, found {}", kind_of(other))),
        }
    }

    fn optional_region(&mut self, path: &str, value: Option<&Value>) {
        match value {
            Some(Value::String(s)) if !is_region(s) => {
                self.push(path, format!("'{}' is not a valid region name", s));
            }
            other => self.optional_string(path, other),
        }
    }

    fn tags(&mut self, path: &str, value: &Value) {
        let Value::Array(items) = value else {
            self.push(path, format!("must be an array, found {}", kind_of(value)));
            return;
        };

        for (idx, item) in items.iter().enumerate() {
            let item_path = format!("{}/{}", path, idx);
            match item {
                Value::String(s) if !s.trim().is_empty() => {}
                Value::String(_) => self.push(&item_path, "tag name must not be empty"),
                Value::Object(obj) => {
                    self.unknown_keys(&item_path, obj, &["Key", "Value"]);
                    match obj.get("Key") {
                        Some(Value::String(k)) if !k.trim().is_empty() => {}
                        Some(_) => self.push(
                            &format!("{}/Key", item_path),
                            "must be a non-empty string",
                        ),
                        None => self.push(&item_path, "missing required property 'Key'"),
                    }
                    match obj.get("Value") {
                        Some(Value::String(_)) => {}
                        Some(_) => self.push(&format!("{}/Value", item_path), "must be a string"),
                        None => self.push(&item_path, "missing required property 'Value'"),
                    }
                }
                other => self.push(
                    &item_path,
                    format!(
                        "must be a tag name or {{\"Key\", \"Value\"}} object, found {}",
                        kind_of(other)
                    ),
                ),
            }
        }
    }

    fn artifact_setting(&mut self, path: &str, value: &Value) {
        match value {
            Value::Bool(false) => {}
            Value::Bool(true) => self.push(path, "may only be false (to disable) or a pattern"),
            Value::String(s) if !s.trim().is_empty() => {}
            Value::String(_) => self.push(path, "pattern must not be empty"),
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    match item {
                        Value::String(s) if !s.trim().is_empty() => {}
                        _ => self.push(
                            &format!("{}/{}", path, idx),
                            "must be a non-empty pattern string",
                        ),
                    }
                }
            }
            other => self.push(
                path,
                format!(
                    "must be false, a pattern, or a list of patterns, found {}",
                    kind_of(other)
                ),
            ),
        }
    }
}

/// Region names look like `us-east-1`: lowercase words joined by dashes.
fn is_region(s: &str) -> bool {
    !s.is_empty()
        && s.contains('-')
        && s.starts_with(|c: char| c.is_ascii_lowercase())
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.ends_with('-')
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
