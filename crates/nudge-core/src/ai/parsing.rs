//! Parsing helpers for model responses

use std::sync::OnceLock;

use regex::Regex;

/// Lines shorter than this (in characters) are noise
pub const MIN_LINE_CHARS: usize = 8;

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•·]+\s*|\d{1,2}(?:[.)]|\s*[-:])\s+)").expect("valid regex")
    })
}

/// Split a completion into clean lines
///
/// Leading bullet or number markers and surrounding markdown emphasis are
/// stripped, short lines are dropped, and at most `max_lines` are kept.
pub fn parse_lines(response: &str, max_lines: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            let stripped = list_marker_re().replace(line, "");
            stripped
                .trim()
                .trim_matches(|c| c == '*' || c == '_' || c == '"')
                .trim()
                .to_string()
        })
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .take(max_lines)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markers() {
        let lines = parse_lines(
            "1. First useful line\n2) Second useful line\n- Third useful line\n• Fourth useful line",
            10,
        );
        assert_eq!(
            lines,
            vec![
                "First useful line",
                "Second useful line",
                "Third useful line",
                "Fourth useful line"
            ]
        );
    }

    #[test]
    fn test_drops_short_and_blank_lines() {
        let lines = parse_lines("\n\n- ok\n   \n**Cut delivery spending**\n", 3);
        assert_eq!(lines, vec!["Cut delivery spending"]);
    }

    #[test]
    fn test_caps_line_count() {
        let text = (0..10)
            .map(|i| format!("- Suggestion number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_lines(&text, 3).len(), 3);
    }

    #[test]
    fn test_keeps_numbers_inside_text() {
        let lines = parse_lines("Spend 20% less on transport", 3);
        assert_eq!(lines, vec!["Spend 20% less on transport"]);
    }

    #[test]
    fn test_keeps_leading_numbers_that_are_content() {
        let lines = parse_lines(
            "10-minute review of subscriptions
3.5% of income went to fees
4 - Move savings first
5: Track delivery weekly",
            10,
        );
        assert_eq!(
            lines,
            vec![
                "10-minute review of subscriptions",
                "3.5% of income went to fees",
                "Move savings first",
                "Track delivery weekly"
            ]
        );
    }
}
