//! `{{KEY}}` template substitution, applied before structural parsing

use regex::Regex;
use snapdiff_core::{Result, SnapdiffError};
use std::collections::HashMap;

/// Replace every `{{KEY}}` placeholder with its supplied value.
///
/// Substitution runs line by line so an unresolved placeholder can be
/// reported with its line number. A missing key fails the whole file rather
/// than leaking literal placeholder text into rendered pages and golden
/// comparisons.
pub fn substitute(source: &str, vars: &HashMap<String, String>) -> Result<String> {
    let placeholder = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex");
    let mut resolved = String::with_capacity(source.len());

    for (idx, line) in source.lines().enumerate() {
        let mut last = 0;
        let mut substituted = 0;
        for caps in placeholder.captures_iter(line) {
            let whole = caps.get(0).expect("capture group 0");
            let key = &caps[1];
            let value = vars.get(key).ok_or_else(|| SnapdiffError::Parse {
                line: idx + 1,
                message: format!("unresolved template variable {{{{{}}}}}", key),
            })?;
            resolved.push_str(&line[last..whole.start()]);
            resolved.push_str(value);
            last = whole.end();
            substituted += 1;
        }
        // a `{{` that the placeholder shape did not match would otherwise
        // leak literally into navigation and comparison
        if line.matches("{{").count() != substituted {
            return Err(SnapdiffError::Parse {
                line: idx + 1,
                message: "malformed template placeholder".to_string(),
            });
        }
        resolved.push_str(&line[last..]);
        resolved.push('\n');
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_keys() {
        let out = substitute(
            "navigate {{ORIGIN}}/index.html\n",
            &vars(&[("ORIGIN", "http://localhost:8080")]),
        )
        .unwrap();
        assert_eq!(out, "navigate http://localhost:8080/index.html\n");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_multiple_placeholders_on_one_line() {
        let out = substitute(
            "navigate {{A}}/{{B}}\n",
            &vars(&[("A", "x"), ("B", "y")]),
        )
        .unwrap();
        assert_eq!(out, "navigate x/y\n");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let out = substitute("navigate {{ ORIGIN }}\n", &vars(&[("ORIGIN", "o")])).unwrap();
        assert_eq!(out, "navigate o\n");
    }

    #[test]
    fn test_missing_key_is_parse_error_with_line() {
        let err = substitute("test a\nnavigate {{NOPE}}\n", &vars(&[])).unwrap_err();
        match err {
            SnapdiffError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("NOPE"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let source = "test a\nnavigate /page\n";
        assert_eq!(substitute(source, &vars(&[])).unwrap(), source);
    }

    #[test]
    fn test_malformed_placeholder_rejected() {
        let err = substitute("navigate {{BAD KEY}}\n", &vars(&[("BAD", "x")])).unwrap_err();
        assert!(matches!(err, SnapdiffError::Parse { line: 1, .. }));
    }
}
