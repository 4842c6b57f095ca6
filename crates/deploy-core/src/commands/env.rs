//! `deploy env`: shell exports for the resolved profile.

use crate::context::Context;

/// `export` lines for the context's region and access keys.
pub fn env_exports(context: &Context) -> Vec<String> {
    let keys = &context.credentials;
    let mut lines = vec![
        export("AWS_DEFAULT_REGION", &context.region),
        export("AWS_REGION", &context.region),
        export("AWS_ACCESS_KEY_ID", &keys.access_key_id),
        export("AWS_SECRET_ACCESS_KEY", &keys.secret_access_key),
    ];
    if let Some(token) = &keys.session_token {
        lines.push(export("AWS_SESSION_TOKEN", token));
    }
    lines
}

fn export(name: &str, value: &str) -> String {
    format!("export {}={}", name, shell_quote(value))
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '+' | '=' | ':'));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
