use crate::report::SectionResult;
use unicode_normalization::UnicodeNormalization;

/// Clean one page of extracted marking-scheme text before it is split.
pub fn normalize_page_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").nfkc().collect::<String>();
    let text = sanitize_control_chars(&text);
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn sanitize_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| ch == '\n' || ch == '\t' || !ch.is_control())
        .collect()
}

/// Join section transcripts into the text scanned for marks.
pub fn combine_sections(sections: &[SectionResult]) -> String {
    sections
        .iter()
        .map(|s| format!("{}\n{}\n{}", s.name, "=".repeat(80), s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_line_endings_and_controls() {
        let raw = "Q1:\u{FB01}ne  \r\nanswer\u{0007}\tkey \r\n";
        assert_eq!(normalize_page_text(raw), "Q1:fine\nanswer\tkey");
    }

    #[test]
    fn combines_with_headers() {
        let sections = vec![
            SectionResult {
                name: "A".into(),
                content: "one".into(),
            },
            SectionResult {
                name: "B".into(),
                content: "two".into(),
            },
        ];
        let bar = "=".repeat(80);
        assert_eq!(
            combine_sections(&sections),
            format!("A\n{bar}\none\n\nB\n{bar}\ntwo")
        );
    }
}
