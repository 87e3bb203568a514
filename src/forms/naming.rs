use regex::Regex;
use std::sync::OnceLock;

/// Framework prefixes stripped from wrapper-level identifiers (`field-email` → `email`).
pub const WRAPPER_PREFIXES: &[&str] = &["field-", "form-", "input-", "field_", "form_", "input_"];

const DEDUPE_PREFIXES: &[&str] = &["field_", "input_", "form_"];
const DEDUPE_SUFFIXES: &[&str] = &["_field", "_input", "_value"];

fn non_name_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s_]").expect("static regex"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("static regex"))
}

fn identifier_separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Name derived from visible text: lowercase, non-alphanumerics stripped, spaces to `_`,
/// repeats collapsed. `"E-mail Address *"` → `"email_address"`.
pub fn name_from_text(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let stripped = non_name_chars().replace_all(&lowered, "");
    let joined = separators().replace_all(stripped.trim(), "_");
    let name = joined.trim_matches('_').to_string();
    (!name.is_empty()).then_some(name)
}

/// Wrapper identifier with one known framework prefix removed.
pub fn strip_wrapper_prefix(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let stripped = WRAPPER_PREFIXES
        .iter()
        .find(|p| lowered.starts_with(*p) && lowered.len() > p.len())
        .map(|p| &trimmed[p.len()..])
        .unwrap_or(trimmed);
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Comparison key used for form-wide dedupe: two names collide when their keys are equal.
pub fn canonical_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut key = identifier_separators()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string();

    if let Some(prefix) = DEDUPE_PREFIXES
        .iter()
        .find(|p| key.starts_with(*p) && key.len() > p.len())
    {
        key = key[prefix.len()..].to_string();
    }
    if let Some(suffix) = DEDUPE_SUFFIXES
        .iter()
        .find(|s| key.ends_with(*s) && key.len() > s.len())
    {
        key.truncate(key.len() - suffix.len());
    }
    key
}

pub fn same_field(a: &str, b: &str) -> bool {
    canonical_name(a) == canonical_name(b)
}
