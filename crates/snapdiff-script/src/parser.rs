//! Script parsing: source text to ordered test cases
//!
//! The parser is pure and side-effect-free: no I/O, deterministic output for
//! a given input. Unknown verbs, malformed operands, and structural mistakes
//! are rejected with the offending line number instead of being coerced.

use snapdiff_core::{
    Action, Result, SnapdiffError, TestCase, Viewport, WaitCondition, DEFAULT_VIEWPORT,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::template::substitute;

/// Parse one script file into test cases.
///
/// `script_name` is the file stem; test identifiers become
/// `<script_name>/<case name>`. Template variables are substituted before
/// any structural parsing happens.
pub fn parse_script(
    script_name: &str,
    source: &str,
    vars: &HashMap<String, String>,
) -> Result<Vec<TestCase>> {
    let resolved = substitute(source, vars)?;

    let mut cases: Vec<TestCase> = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut current: Option<CaseBuilder> = None;

    for (idx, raw) in resolved.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        let (verb, rest) = split_directive(line);
        if verb == "test" {
            let name = rest.trim();
            check_token(name, "test name", line_no)?;
            if !seen_names.insert(name.to_string()) {
                return Err(parse_err(
                    line_no,
                    format!("duplicate test name '{}'", name),
                ));
            }
            if let Some(done) = current.take() {
                cases.push(done.finish()?);
            }
            current = Some(CaseBuilder::new(script_name, name, line_no));
        } else {
            let builder = current.as_mut().ok_or_else(|| {
                parse_err(
                    line_no,
                    format!("directive '{}' before any 'test' block", verb),
                )
            })?;
            builder.push_directive(verb, rest.trim(), line_no)?;
        }
    }

    if let Some(done) = current.take() {
        cases.push(done.finish()?);
    }

    debug!(
        "parsed {} test case(s) from script '{}'",
        cases.len(),
        script_name
    );
    Ok(cases)
}

/// Accumulates one `test` block until the next block or end of file
struct CaseBuilder {
    id: String,
    declared_line: usize,
    viewport: Option<Viewport>,
    tolerance: Option<f64>,
    actions: Vec<Action>,
    capture_labels: HashSet<String>,
}

impl CaseBuilder {
    fn new(script_name: &str, case_name: &str, line_no: usize) -> Self {
        Self {
            id: format!("{}/{}", script_name, case_name),
            declared_line: line_no,
            viewport: None,
            tolerance: None,
            actions: Vec::new(),
            capture_labels: HashSet::new(),
        }
    }

    fn push_directive(&mut self, verb: &str, rest: &str, line_no: usize) -> Result<()> {
        match verb {
            "viewport" => {
                let (width, height) = parse_viewport(rest, line_no)?;
                // the first declaration doubles as the case's declared
                // viewport; later ones are mid-script resizes
                if self.viewport.is_none() {
                    self.viewport = Some(Viewport { width, height });
                }
                self.actions.push(Action::SetViewport { width, height });
            }
            "navigate" => {
                if rest.is_empty() {
                    return Err(parse_err(line_no, "navigate requires a URL"));
                }
                self.actions.push(Action::Navigate {
                    url: rest.to_string(),
                });
            }
            "wait" => {
                let condition = parse_wait(rest, line_no)?;
                self.actions.push(Action::Wait { condition });
            }
            "click" => {
                if rest.is_empty() {
                    return Err(parse_err(line_no, "click requires a CSS selector"));
                }
                self.actions.push(Action::Click {
                    selector: rest.to_string(),
                });
            }
            "capture" => {
                let label = if rest.is_empty() { "default" } else { rest };
                check_token(label, "capture label", line_no)?;
                if !self.capture_labels.insert(label.to_string()) {
                    return Err(parse_err(
                        line_no,
                        format!("duplicate capture label '{}'", label),
                    ));
                }
                self.actions.push(Action::Capture {
                    label: label.to_string(),
                });
            }
            "tolerance" => {
                let value: f64 = rest.parse().map_err(|_| {
                    parse_err(line_no, format!("invalid tolerance '{}'", rest))
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(parse_err(
                        line_no,
                        format!("tolerance must be within [0, 1], got {}", value),
                    ));
                }
                self.tolerance = Some(value);
            }
            other => {
                return Err(parse_err(
                    line_no,
                    format!("unknown directive '{}'", other),
                ));
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<TestCase> {
        if self.actions.is_empty() {
            return Err(parse_err(
                self.declared_line,
                format!("test '{}' has no actions", self.id),
            ));
        }
        Ok(TestCase {
            id: self.id,
            viewport: self.viewport.unwrap_or(DEFAULT_VIEWPORT),
            actions: self.actions,
            tolerance: self.tolerance,
        })
    }
}

fn parse_viewport(rest: &str, line_no: usize) -> Result<(u32, u32)> {
    let mut parts = rest.split_whitespace();
    let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(parse_err(
            line_no,
            "viewport requires exactly two positive integers",
        ));
    };
    let width: u32 = w
        .parse()
        .map_err(|_| parse_err(line_no, format!("invalid viewport width '{}'", w)))?;
    let height: u32 = h
        .parse()
        .map_err(|_| parse_err(line_no, format!("invalid viewport height '{}'", h)))?;
    if width == 0 || height == 0 {
        return Err(parse_err(
            line_no,
            "viewport dimensions must be positive",
        ));
    }
    Ok((width, height))
}

fn parse_wait(rest: &str, line_no: usize) -> Result<WaitCondition> {
    if rest.is_empty() {
        return Err(parse_err(
            line_no,
            "wait requires 'idle', a delay like '250ms', or a CSS selector",
        ));
    }
    if rest == "idle" {
        return Ok(WaitCondition::NetworkIdle);
    }
    // a delay is digits followed by "ms"; anything else is a selector
    if let Some(digits) = rest.strip_suffix("ms") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let millis: u64 = digits
                .parse()
                .map_err(|_| parse_err(line_no, format!("invalid wait delay '{}'", rest)))?;
            return Ok(WaitCondition::Delay(millis));
        }
    }
    Ok(WaitCondition::Selector(rest.to_string()))
}

/// Comments are whole lines starting with `#`. Trailing comments are not
/// supported: selectors and URL fragments legitimately contain `#`.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        ""
    } else {
        line
    }
}

fn split_directive(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    }
}

/// Test names and capture labels become storage paths, so they are held to
/// a conservative character set.
fn check_token(token: &str, what: &str, line_no: usize) -> Result<()> {
    if token.is_empty() {
        return Err(parse_err(line_no, format!("{} is required", what)));
    }
    let ok = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(parse_err(
            line_no,
            format!(
                "{} '{}' may only contain letters, digits, '-', '_' and '.'",
                what, token
            ),
        ));
    }
    Ok(())
}

fn parse_err(line: usize, message: impl Into<String>) -> SnapdiffError {
    SnapdiffError::Parse {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_vars() -> HashMap<String, String> {
        HashMap::new()
    }

    fn parse(source: &str) -> Result<Vec<TestCase>> {
        parse_script("suite", source, &no_vars())
    }

    #[test]
    fn test_parses_full_case() {
        let cases = parse(
            "# homepage checks\n\
             test homepage\n\
             \x20 viewport 1280 800\n\
             \x20 navigate /index.html\n\
             \x20 wait idle\n\
             \x20 click #accept-cookies\n\
             \x20 wait 250ms\n\
             \x20 capture hero\n",
        )
        .unwrap();

        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.id, "suite/homepage");
        assert_eq!(
            case.viewport,
            Viewport {
                width: 1280,
                height: 800
            }
        );
        assert_eq!(case.actions.len(), 6);
        assert_eq!(
            case.actions[3],
            Action::Click {
                selector: "#accept-cookies".to_string()
            }
        );
        assert_eq!(
            case.actions[4],
            Action::Wait {
                condition: WaitCondition::Delay(250)
            }
        );
        assert_eq!(
            case.actions[5],
            Action::Capture {
                label: "hero".to_string()
            }
        );
    }

    #[test]
    fn test_template_resolution_leaves_no_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("ORIGIN".to_string(), "http://localhost:3000".to_string());
        let cases = parse_script(
            "suite",
            "test home\n navigate {{ORIGIN}}/\n capture\n",
            &vars,
        )
        .unwrap();
        let Action::Navigate { url } = &cases[0].actions[0] else {
            panic!("expected navigate");
        };
        assert_eq!(url, "http://localhost:3000/");
        assert!(!url.contains("{{"));
    }

    #[test]
    fn test_unresolved_variable_fails() {
        let err = parse("test home\n navigate {{ORIGIN}}/\n capture\n").unwrap_err();
        assert!(matches!(err, SnapdiffError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unknown_verb_rejected() {
        let err = parse("test a\n hover .menu\n").unwrap_err();
        let SnapdiffError::Parse { line, message } = err else {
            panic!("expected parse error");
        };
        assert_eq!(line, 2);
        assert!(message.contains("hover"));
    }

    #[test]
    fn test_nonpositive_viewport_rejected() {
        assert!(parse("test a\n viewport 0 600\n capture\n").is_err());
        assert!(parse("test a\n viewport 800 -5\n capture\n").is_err());
        assert!(parse("test a\n viewport 800\n capture\n").is_err());
        assert!(parse("test a\n viewport wide tall\n capture\n").is_err());
    }

    #[test]
    fn test_directive_before_test_block_rejected() {
        let err = parse("navigate /\n").unwrap_err();
        assert!(matches!(err, SnapdiffError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_case_names_rejected() {
        let err = parse("test a\n capture\ntest a\n capture\n").unwrap_err();
        assert!(matches!(err, SnapdiffError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_duplicate_capture_labels_rejected() {
        let err = parse("test a\n navigate /\n capture x\n capture x\n").unwrap_err();
        let SnapdiffError::Parse { line, message } = err else {
            panic!("expected parse error");
        };
        assert_eq!(line, 4);
        assert!(message.contains("duplicate capture label"));
    }

    #[test]
    fn test_default_viewport_and_label() {
        let cases = parse("test a\n navigate /\n capture\n").unwrap();
        assert_eq!(cases[0].viewport, DEFAULT_VIEWPORT);
        assert_eq!(
            cases[0].actions[1],
            Action::Capture {
                label: "default".to_string()
            }
        );
    }

    #[test]
    fn test_wait_variants() {
        let cases = parse(
            "test a\n wait idle\n wait 100ms\n wait .spinner-gone\n capture\n",
        )
        .unwrap();
        assert_eq!(
            cases[0].actions[0],
            Action::Wait {
                condition: WaitCondition::NetworkIdle
            }
        );
        assert_eq!(
            cases[0].actions[1],
            Action::Wait {
                condition: WaitCondition::Delay(100)
            }
        );
        assert_eq!(
            cases[0].actions[2],
            Action::Wait {
                condition: WaitCondition::Selector(".spinner-gone".to_string())
            }
        );
    }

    #[test]
    fn test_empty_test_block_rejected() {
        let err = parse("test a\ntest b\n capture\n").unwrap_err();
        let SnapdiffError::Parse { message, .. } = err else {
            panic!("expected parse error");
        };
        assert!(message.contains("no actions"));
    }

    #[test]
    fn test_tolerance_override() {
        let cases = parse("test a\n tolerance 0.02\n navigate /\n capture\n").unwrap();
        assert_eq!(cases[0].tolerance, Some(0.02));
        assert!(parse("test a\n tolerance 2.0\n capture\n").is_err());
    }

    #[test]
    fn test_hash_selectors_are_not_comments() {
        let cases = parse("test a\n click #save\n navigate /page#section\n capture\n").unwrap();
        assert_eq!(
            cases[0].actions[0],
            Action::Click {
                selector: "#save".to_string()
            }
        );
        assert_eq!(
            cases[0].actions[1],
            Action::Navigate {
                url: "/page#section".to_string()
            }
        );
    }

    #[test]
    fn test_deterministic_output() {
        let source = "test a\n navigate /\n capture one\n capture two\n";
        let first = parse(source).unwrap();
        let second = parse(source).unwrap();
        assert_eq!(first, second);
    }
}
