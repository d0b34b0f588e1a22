//! Multi-occurrence highlighting of a candidate pair in its source text.
//!
//! The formal name is marked first. The abbreviation is then searched in the
//! *output* of that pass, so it can match inside the formal name's inserted
//! markup when the two overlap textually. A needle that never occurs gets a
//! "not found" note appended to the text.

/// Markup wrapped around one needle's occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedleStyle {
    pub open: &'static str,
    pub close: &'static str,
    /// Written before the missing needle in the appended note.
    pub missing_open: &'static str,
    /// Written after the missing needle in the appended note.
    pub missing_close: &'static str,
}

/// Styles for the formal-name and abbreviation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markup {
    pub formal: NeedleStyle,
    pub abbr: NeedleStyle,
}

impl Markup {
    /// HTML spans with the `formal-found`/`abbr-found` classes used by the review UI.
    pub const fn html() -> Self {
        Self {
            formal: NeedleStyle {
                open: r#"<span class="formal-found">"#,
                close: "</span>",
                missing_open: r#"<br/><span class="formal-missing">[not found: "#,
                missing_close: "]</span>",
            },
            abbr: NeedleStyle {
                open: r#"<span class="abbr-found">"#,
                close: "</span>",
                missing_open: r#"<br/><span class="abbr-missing">[not found: "#,
                missing_close: "]</span>",
            },
        }
    }

    /// ANSI colours for terminal output.
    pub const fn ansi() -> Self {
        Self {
            formal: NeedleStyle {
                open: "\x1b[1;32m",
                close: "\x1b[0m",
                missing_open: "\n  \x1b[31m[formal not found: ",
                missing_close: "]\x1b[0m",
            },
            abbr: NeedleStyle {
                open: "\x1b[1;36m",
                close: "\x1b[0m",
                missing_open: "\n  \x1b[31m[abbr not found: ",
                missing_close: "]\x1b[0m",
            },
        }
    }
}

/// Result of highlighting one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub marked_text: String,
    pub formal_found: bool,
    pub abbr_found: bool,
}

impl Highlight {
    /// Both needles occur in the source text.
    pub fn is_valid(&self) -> bool {
        self.formal_found && self.abbr_found
    }
}

/// Wrap every non-overlapping, leftmost-first occurrence of `needle`.
///
/// Returns the marked text and the number of occurrences. The empty needle
/// is a single zero-width match at position 0: it counts as found and emits
/// no markup.
pub fn mark_all(text: &str, needle: &str, open: &str, close: &str) -> (String, usize) {
    if needle.is_empty() {
        return (text.to_string(), 1);
    }

    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut rest = text;
    while let Some(pos) = rest.find(needle) {
        out.push_str(&rest[..pos]);
        out.push_str(open);
        out.push_str(needle);
        out.push_str(close);
        rest = &rest[pos + needle.len()..];
        count += 1;
    }
    out.push_str(rest);
    (out, count)
}

fn push_missing_note(marked: &mut String, needle: &str, style: &NeedleStyle) {
    marked.push_str(style.missing_open);
    marked.push_str(needle);
    marked.push_str(style.missing_close);
}

fn pass(text: &str, needle: &str, style: &NeedleStyle) -> (String, bool) {
    let (mut marked, count) = mark_all(text, needle, style.open, style.close);
    let found = count > 0;
    if !found {
        push_missing_note(&mut marked, needle, style);
    }
    (marked, found)
}

/// Highlight with the review UI's HTML markup.
pub fn highlight(source: &str, formal: &str, abbr: &str) -> Highlight {
    highlight_with(source, formal, abbr, &Markup::html())
}

pub fn highlight_with(source: &str, formal: &str, abbr: &str, markup: &Markup) -> Highlight {
    let (after_formal, formal_found) = pass(source, formal, &markup.formal);
    let (marked_text, abbr_found) = pass(&after_formal, abbr, &markup.abbr);
    Highlight {
        marked_text,
        formal_found,
        abbr_found,
    }
}

/// Highlight only the first `max_chars` characters of `source`.
///
/// The found flags and missing notes are decided on the whole text, so a
/// needle that only occurs past the cut still counts as found. A cut text
/// ends with `...`.
pub fn highlight_excerpt(
    source: &str,
    formal: &str,
    abbr: &str,
    markup: &Markup,
    max_chars: usize,
) -> Highlight {
    let full = highlight_with(source, formal, abbr, markup);
    let Some((cut, _)) = source.char_indices().nth(max_chars) else {
        return full;
    };

    let excerpt = format!("{}...", &source[..cut]);
    let (after_formal, _) = mark_all(&excerpt, formal, markup.formal.open, markup.formal.close);
    let (mut marked_text, _) = mark_all(&after_formal, abbr, markup.abbr.open, markup.abbr.close);
    if !full.formal_found {
        push_missing_note(&mut marked_text, formal, &markup.formal);
    }
    if !full.abbr_found {
        push_missing_note(&mut marked_text, abbr, &markup.abbr);
    }
    Highlight {
        marked_text,
        ..full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_every_occurrence_and_reports_missing_abbr() {
        let h = highlight("the Foo Bar Act (Foo Bar Act)", "Foo Bar Act", "FBA");
        assert!(h.formal_found);
        assert!(!h.abbr_found);
        assert!(!h.is_valid());
        assert_eq!(h.marked_text.matches(r#"<span class="formal-found">Foo Bar Act</span>"#).count(), 2);
        assert!(h.marked_text.ends_with(r#"<br/><span class="abbr-missing">[not found: FBA]</span>"#));
        assert!(!h.marked_text.contains("formal-missing"));
    }

    #[test]
    fn both_found() {
        let h = highlight("the Foo Bar Act (hereinafter FBA)", "Foo Bar Act", "FBA");
        assert!(h.is_valid());
        assert_eq!(
            h.marked_text,
            r#"the <span class="formal-found">Foo Bar Act</span> (hereinafter <span class="abbr-found">FBA</span>)"#
        );
    }

    #[test]
    fn both_missing_get_independent_notes() {
        let h = highlight("unrelated text", "Foo Act", "FA");
        assert!(!h.formal_found);
        assert!(!h.abbr_found);
        assert_eq!(
            h.marked_text,
            concat!(
                "unrelated text",
                r#"<br/><span class="formal-missing">[not found: Foo Act]</span>"#,
                r#"<br/><span class="abbr-missing">[not found: FA]</span>"#
            )
        );
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let (marked, count) = mark_all("aaaa", "aa", "[", "]");
        assert_eq!(count, 2);
        assert_eq!(marked, "[aa][aa]");

        let (marked, count) = mark_all("aaa", "aa", "[", "]");
        assert_eq!(count, 1);
        assert_eq!(marked, "[aa]a");
    }

    #[test]
    fn empty_needle_is_zero_width_found() {
        let (marked, count) = mark_all("text", "", "[", "]");
        assert_eq!(count, 1);
        assert_eq!(marked, "text");

        let h = highlight("", "", "");
        assert!(h.formal_found);
        assert!(h.abbr_found);
        assert_eq!(h.marked_text, "");
    }

    #[test]
    fn abbr_inside_formal_is_found_in_marked_text() {
        let h = highlight("Foo Bar Act", "Foo Bar Act", "Bar");
        assert!(h.abbr_found);
        assert_eq!(
            h.marked_text,
            r#"<span class="formal-found">Foo <span class="abbr-found">Bar</span> Act</span>"#
        );
    }

    #[test]
    fn abbr_can_match_inside_formal_markup() {
        // "formal" only appears in the inserted class attribute.
        let h = highlight("Foo Act", "Foo Act", "formal");
        assert!(h.formal_found);
        assert!(h.abbr_found);
    }

    #[test]
    fn missing_formal_note_can_satisfy_abbr() {
        // The formal pass appends its own name to the text before the abbr pass.
        let h = highlight("nothing here", "Foo Act", "Foo");
        assert!(!h.formal_found);
        assert!(h.abbr_found);
    }

    #[test]
    fn multibyte_text() {
        let h = highlight("労働基準法（以下「労基法」という。）", "労働基準法", "労基法");
        assert!(h.is_valid());
        assert!(h.marked_text.starts_with(r#"<span class="formal-found">労働基準法</span>"#));
    }

    #[test]
    fn excerpt_judges_needles_on_the_whole_text() {
        let text = format!("{}Foo Act (FA)", "x".repeat(700));
        let h = highlight_excerpt(&text, "Foo Act", "FA", &Markup::html(), 600);
        assert!(h.is_valid());
        assert_eq!(h.marked_text, format!("{}...", "x".repeat(600)));
    }

    #[test]
    fn excerpt_keeps_notes_for_needles_missing_everywhere() {
        let text = format!("Foo Act {}", "y".repeat(700));
        let h = highlight_excerpt(&text, "Foo Act", "FA", &Markup::html(), 600);
        assert!(h.formal_found);
        assert!(!h.abbr_found);
        assert!(h.marked_text.starts_with(r#"<span class="formal-found">Foo Act</span> y"#));
        assert!(h.marked_text.ends_with(r#"...<br/><span class="abbr-missing">[not found: FA]</span>"#));
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        let text = "労".repeat(605);
        let h = highlight_excerpt(&text, "", "", &Markup::html(), 600);
        assert_eq!(h.marked_text.chars().count(), 603);
        assert!(h.marked_text.ends_with("労..."));

        let short = highlight_excerpt("Foo Act (FA)", "Foo Act", "FA", &Markup::html(), 600);
        assert_eq!(short, highlight("Foo Act (FA)", "Foo Act", "FA"));
    }

    #[test]
    fn ansi_markup_wraps_with_escape_codes() {
        let h = highlight_with("Foo Act (FA)", "Foo Act", "FA", &Markup::ansi());
        assert_eq!(h.marked_text, "\x1b[1;32mFoo Act\x1b[0m (\x1b[1;36mFA\x1b[0m)");
    }
}
