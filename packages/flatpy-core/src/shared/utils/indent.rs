//! Indentation utilities for source text
//!
//! The callable facade uses `remove_indent` to dedent function sources
//! captured from an indented context; the remaining helpers are the
//! inverse operations for callers that re-embed generated text.

pub fn code_to_lines(code: &str) -> Vec<String> {
    code.split('\n').map(|line| line.trim_end().to_string()).collect()
}

pub fn lines_to_code(lines: &[String]) -> String {
    lines.join("\n")
}

/// Indent every line of `code` by `levels` levels of four spaces.
pub fn add_indent(code: &str, levels: usize) -> String {
    let indent = " ".repeat(4 * levels);
    let lines: Vec<String> = code_to_lines(code)
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                line
            } else {
                format!("{indent}{line}")
            }
        })
        .collect();
    lines_to_code(&lines)
}

/// Strip the common leading indentation, measured on the first non-empty line.
pub fn remove_indent(code: &str) -> String {
    let lines = code_to_lines(code);
    let indent: String = match lines.iter().find(|line| !line.is_empty()) {
        Some(first) => first.chars().take_while(|c| c.is_whitespace()).collect(),
        None => return String::new(),
    };
    if indent.is_empty() {
        return lines_to_code(&lines);
    }
    let stripped: Vec<String> = lines
        .into_iter()
        .map(|line| match line.strip_prefix(&indent) {
            Some(rest) => rest.to_string(),
            None => line,
        })
        .collect();
    lines_to_code(&stripped)
}

/// Normalize to `levels` levels of indentation.
pub fn reindent(code: &str, levels: usize) -> String {
    add_indent(&remove_indent(code), levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_indent_skips_blank_lines() {
        assert_eq!(add_indent("a\n\nb", 1), "    a\n\n    b");
    }

    #[test]
    fn test_remove_indent_uses_first_nonempty_line() {
        let code = "\n    def f(x):\n        return x\n";
        assert_eq!(remove_indent(code), "\ndef f(x):\n    return x\n");
    }

    #[test]
    fn test_remove_indent_leaves_flush_code_alone() {
        let code = "def f(x):\n    return x";
        assert_eq!(remove_indent(code), code);
    }

    #[test]
    fn test_reindent() {
        assert_eq!(reindent("    x = 1\n    y = 2", 2), "        x = 1\n        y = 2");
    }

    proptest! {
        #[test]
        fn prop_indent_round_trip(lines in proptest::collection::vec("[a-z]([a-z0-9_ ]{0,10}[a-z0-9_])?", 1..8)) {
            let code = lines.join("\n");
            prop_assert_eq!(remove_indent(&add_indent(&code, 1)), code);
        }
    }
}
