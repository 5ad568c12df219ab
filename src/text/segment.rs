//! Sentence Segmentation
//!
//! Heuristic sentence boundaries: a unit ends right after `.`, `!` or `?`
//! when the next character is whitespace. The whitespace run between units
//! is consumed. Abbreviations and decimals are not special-cased.

/// Characters that may end a sentence unit.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

/// Whitespace as the segmenter sees it: Unicode whitespace plus the ASCII
/// information separators (U+001C..U+001F), which also count as spaces when
/// splitting and trimming.
pub fn is_boundary_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Trim leading and trailing boundary whitespace.
pub fn trim_unit(s: &str) -> &str {
    s.trim_matches(is_boundary_space)
}

/// Split `text` into raw candidate units (untrimmed, possibly empty).
///
/// Concatenating the units with the consumed whitespace runs restores the
/// input exactly.
pub fn split_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut unit_start = 0usize;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let at_boundary = is_boundary_space(c)
            && prev.is_some_and(|p| SENTENCE_TERMINATORS.contains(&p));

        if at_boundary {
            units.push(&text[unit_start..pos]);

            // Swallow the rest of the whitespace run
            let mut next_start = pos + c.len_utf8();
            while let Some(&(p, ws)) = chars.peek() {
                if !is_boundary_space(ws) {
                    break;
                }
                next_start = p + ws.len_utf8();
                chars.next();
            }
            unit_start = next_start;
            prev = None;
            continue;
        }

        prev = Some(c);
    }

    units.push(&text[unit_start..]);
    units
}

/// Split `text` into trimmed, non-empty sentence units in input order.
pub fn sentences(text: &str) -> Vec<&str> {
    split_units(text)
        .into_iter()
        .map(trim_unit)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_punctuation() {
        let units = split_units("One. Two! Three? Four");
        assert_eq!(units, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn test_split_consumes_whitespace_run() {
        let units = split_units("First.\n\n  Second.");
        assert_eq!(units, vec!["First.", "Second."]);
    }

    #[test]
    fn test_no_split_without_following_whitespace() {
        assert_eq!(split_units("v1.2 is out.Really"), vec!["v1.2 is out.Really"]);
    }

    #[test]
    fn test_abbreviations_over_split() {
        let units = sentences("Dr. Smith arrived. Dr. Smith left.");
        assert_eq!(units, vec!["Dr.", "Smith arrived.", "Dr.", "Smith left."]);
    }

    #[test]
    fn test_trailing_whitespace_gives_empty_unit() {
        let units = split_units("Done.   ");
        assert_eq!(units, vec!["Done.", ""]);
        assert_eq!(sentences("Done.   "), vec!["Done."]);
    }

    #[test]
    fn test_leading_whitespace_not_a_boundary() {
        let units = split_units("   Hello.");
        assert_eq!(units, vec!["   Hello."]);
        assert_eq!(sentences("   Hello."), vec!["Hello."]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(split_units(""), vec![""]);
        assert!(sentences("").is_empty());
        assert!(sentences(" \t\n ").is_empty());
    }

    #[test]
    fn test_information_separator_counts_as_space() {
        assert_eq!(sentences("A.\u{1f}B."), vec!["A.", "B."]);
    }

    #[test]
    fn test_non_ascii_text() {
        let units = sentences("Über Straße. 日本語です。 終わり! ok");
        assert_eq!(units, vec!["Über Straße.", "日本語です。 終わり!", "ok"]);
    }
}
