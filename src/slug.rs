//! Identifier slugs for generated field and section ids.

use std::collections::HashSet;

/// Lower-case alphanumerics with whitespace runs joined by `_`, capped at `max_len` chars.
/// e.g. "Principal Investigator (PI)" -> "principal_investigator_pi"
pub fn slugify(label: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.chars() {
        if c.is_whitespace() {
            pending_sep = !out.is_empty();
        } else if c.is_ascii_alphanumeric() {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c.to_ascii_lowercase());
        }
    }
    let truncated: String = out.chars().take(max_len).collect();
    let trimmed = truncated.trim_end_matches('_');
    if trimmed.is_empty() {
        "field".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Claim `base`, or `base_2`, `base_3`, ... if taken.
pub fn unique_id(base: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slugify("Principal Investigator (PI)", 50), "principal_investigator_pi");
        assert_eq!(slugify("  Study   Title: ", 50), "study_title");
        assert_eq!(slugify("Sponsor name here", 8), "sponsor");
        assert_eq!(slugify("???", 50), "field");
    }

    #[test]
    fn duplicates_get_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(unique_id("a.x".into(), &mut taken), "a.x");
        assert_eq!(unique_id("a.x".into(), &mut taken), "a.x_2");
        assert_eq!(unique_id("a.x".into(), &mut taken), "a.x_3");
    }
}
