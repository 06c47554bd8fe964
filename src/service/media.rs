//! Upload naming and tag parsing for new capsule items.

/// `{millis}-{name}`, with the name reduced to a single safe path segment.
pub fn object_path(now_millis: i64, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let name = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("{now_millis}-{name}")
}

/// Splits `#city, #Memory  city` into `["city", "memory"]`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let name = token.trim().trim_start_matches('#').trim().to_lowercase();
        if !name.is_empty() && !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags
}
