const MAX_VISIBLE_CHARS: usize = 100;

const SECRET_PREFIXES: [&str; 5] = ["Bearer ", "api_key=", "password=", "secret=", "token="];

/// Flattens, truncates and redacts chat text before it goes into a log line.
pub fn sanitize_prompt(prompt: &str) -> String {
    let flattened = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.is_empty() {
        return String::from("[EMPTY]");
    }

    let redacted = SECRET_PREFIXES
        .iter()
        .fold(flattened, |text, prefix| redact_after(&text, prefix));

    let total_chars = redacted.chars().count();
    match redacted.char_indices().nth(MAX_VISIBLE_CHARS) {
        Some((cut, _)) => format!("{}... ({} chars total)", &redacted[..cut], total_chars),
        None => redacted,
    }
}

/// Replaces the value following every occurrence of `prefix`.
fn redact_after(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(prefix) {
        let value_start = idx + prefix.len();
        out.push_str(&rest[..value_start]);
        out.push_str("[REDACTED]");
        let value_len = rest[value_start..]
            .find(|c: char| c.is_whitespace() || matches!(c, '&' | '"' | '\''))
            .unwrap_or(rest.len() - value_start);
        rest = &rest[value_start + value_len..];
    }
    out.push_str(rest);
    out
}
