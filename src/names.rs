//! Relaxed property-name binding
//!
//! `fooBar`, `foo-bar`, `foo_bar` and `FOO_BAR` all name the same logical
//! property. The canonical form drops separators and case.

/// Canonical form used to compare names loosely.
pub fn canonical_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two names bind to the same property under relaxed rules.
pub fn relaxed_eq(a: &str, b: &str) -> bool {
    a == b || canonical_name(a) == canonical_name(b)
}

/// `fooBar` for `foo-bar` / `foo_bar`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `foo-bar` for `fooBar` / `foo_bar`.
pub fn hyphenated(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c == '_' {
            out.push('-');
        } else if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Distinct spellings a user might type for `name`, the declared one first.
pub fn relaxed_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    for candidate in [hyphenated(name), camel_case(name)] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("fooBar"), "foobar");
        assert_eq!(canonical_name("foo-bar"), "foobar");
        assert_eq!(canonical_name("FOO_BAR"), "foobar");
        assert!(relaxed_eq("maxRetries", "max_retries"));
        assert!(!relaxed_eq("max", "min"));
    }

    #[test]
    fn test_variants() {
        assert_eq!(camel_case("max-retries"), "maxRetries");
        assert_eq!(camel_case("max_retries"), "maxRetries");
        assert_eq!(hyphenated("maxRetries"), "max-retries");
        assert_eq!(hyphenated("max_retries"), "max-retries");
        assert_eq!(
            relaxed_variants("maxRetries"),
            vec!["maxRetries".to_string(), "max-retries".to_string()]
        );
        assert_eq!(relaxed_variants("name"), vec!["name".to_string()]);
    }
}
