//! Text cleanup before speech synthesis

/// Characters used for markdown emphasis, headers and inline code
const MARKUP_CHARS: [char; 4] = ['*', '_', '#', '`'];

/// Strip markdown markers and collapse whitespace so TTS reads plain prose
///
/// Idempotent: cleaning already-clean text returns it unchanged.
#[must_use]
pub fn clean_text_for_speech(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !MARKUP_CHARS.contains(c)).collect();
    normalize_whitespace(&stripped)
}

/// Collapse runs of whitespace to single spaces and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown() {
        let text = "## Summary\n\n**Bold** and *italic* with `code` and __under__";
        assert_eq!(
            clean_text_for_speech(text),
            "Summary Bold and italic with code and under"
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean_text_for_speech("  a\t\tb \n\n c  "), "a b c");
    }

    #[test]
    fn idempotent() {
        let samples = [
            "",
            "   ",
            "**hi**   there",
            "# Title\n- item *one*\n- item `two`",
            "snake_case_name and ***triple***",
            "I don't have real-time access, but I can help with other questions!",
        ];
        for s in samples {
            let once = clean_text_for_speech(s);
            assert_eq!(clean_text_for_speech(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn plain_text_only_normalizes_whitespace() {
        let plain = "Hello,  world.\nHow are   you?";
        assert_eq!(clean_text_for_speech(plain), normalize_whitespace(plain));
    }

    #[test]
    fn markup_only_becomes_empty() {
        assert_eq!(clean_text_for_speech("** __ ## ``"), "");
    }
}
