//! Decides how much of a growing response buffer may be shown to the user.
//!
//! Text is released left to right from the last released offset. Complete
//! directive blocks are stepped over without being released, an unterminated
//! block stops the scan at its open tag and so does a trailing `<` whose
//! remaining characters could still grow into the open tag.

use super::{CLOSE_TAG, OPEN_TAG};

/// Text that became safe to show, and how far the released offset moves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    pub text: String,
    /// Bytes of the buffer consumed by this release, including skipped blocks
    pub consumed: usize,
}

impl Release {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Release everything after `released` that cannot belong to a directive block.
pub fn safe_prefix(buffer: &str, released: usize) -> Release {
    scan(buffer, released, false)
}

/// Release for a finished stream: a trailing partial open tag can no longer
/// grow into a block and is released as plain text. Unterminated blocks stay
/// withheld.
pub fn final_release(buffer: &str, released: usize) -> Release {
    scan(buffer, released, true)
}

fn scan(buffer: &str, released: usize, at_end: bool) -> Release {
    debug_assert!(buffer.is_char_boundary(released));
    let mut text = String::new();
    let mut pos = released.min(buffer.len());

    while pos < buffer.len() {
        let rest = &buffer[pos..];
        let Some(lt) = rest.find('<') else {
            text.push_str(rest);
            pos = buffer.len();
            break;
        };

        let tag_pos = pos + lt;
        text.push_str(&rest[..lt]);
        let candidate = &buffer[tag_pos..];

        if candidate.starts_with(OPEN_TAG) {
            let body_start = tag_pos + OPEN_TAG.len();
            match buffer[body_start..].find(CLOSE_TAG) {
                Some(close) => pos = body_start + close + CLOSE_TAG.len(),
                None => {
                    // Inside an unterminated block
                    pos = tag_pos;
                    break;
                }
            }
        } else if !at_end && OPEN_TAG.starts_with(candidate) {
            pos = tag_pos;
            break;
        } else {
            text.push('<');
            pos = tag_pos + 1;
        }
    }

    Release {
        text,
        consumed: pos - released.min(buffer.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `chunks` one by one and collect every released piece
    fn stream_through(chunks: &[&str]) -> (Vec<String>, String, usize) {
        let mut buffer = String::new();
        let mut released = 0;
        let mut pieces = Vec::new();
        for chunk in chunks {
            buffer.push_str(chunk);
            let release = safe_prefix(&buffer, released);
            released += release.consumed;
            if !release.is_empty() {
                pieces.push(release.text);
            }
        }
        (pieces, buffer, released)
    }

    #[test]
    fn test_plain_text_is_released_whole() {
        let release = safe_prefix("Hello there", 0);
        assert_eq!(release.text, "Hello there");
        assert_eq!(release.consumed, 11);
    }

    #[test]
    fn test_empty_tail_releases_nothing() {
        assert_eq!(safe_prefix("Hello", 5), Release::default());
        assert_eq!(safe_prefix("", 0), Release::default());
    }

    #[test]
    fn test_partial_open_tag_is_withheld() {
        for tail in ["<", "<t", "<to", "<tool", "<tool_cal"] {
            let buffer = format!("Hi {tail}");
            let release = safe_prefix(&buffer, 0);
            assert_eq!(release.text, "Hi ", "tail {tail:?}");
            assert_eq!(release.consumed, 3);
        }
    }

    #[test]
    fn test_diverging_tag_is_released() {
        let release = safe_prefix("a <table> b", 0);
        assert_eq!(release.text, "a <table> b");

        let release = safe_prefix("x < y and <to", 0);
        assert_eq!(release.text, "x < y and ");
    }

    #[test]
    fn test_unterminated_block_is_withheld() {
        let release = safe_prefix("Before <tool_call><tool_name>x</tool", 0);
        assert_eq!(release.text, "Before ");
        assert_eq!(release.consumed, 7);
    }

    #[test]
    fn test_complete_block_is_skipped() {
        let buffer = "Hello <tool_call><tool_name>x</tool_name></tool_call> world";
        let release = safe_prefix(buffer, 6);
        assert_eq!(release.text, " world");
        assert_eq!(release.consumed, buffer.len() - 6);
    }

    #[test]
    fn test_hello_world_scenario() {
        let block = "<tool_call><tool_name>generate_quote</tool_name><parameters><customer_name>Acme</customer_name></parameters></tool_call>";
        let (pieces, buffer, released) = stream_through(&["Hello ", block, " world"]);
        assert_eq!(pieces, vec!["Hello ", " world"]);
        assert_eq!(released, buffer.len());
    }

    #[test]
    fn test_never_releases_block_text_at_any_chunk_size() {
        let text = "Intro <b>bold</b> <tool_call><tool_name>t</tool_name><parameters><a>1</a></parameters></tool_call> outro <to";
        let chars: Vec<char> = text.chars().collect();
        for size in 1..=chars.len() {
            let chunks: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();
            let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
            let (pieces, buffer, released) = stream_through(&refs);
            let shown = pieces.concat();
            assert!(!shown.contains("tool_"), "chunk size {size}: {shown:?}");
            assert_eq!(shown, "Intro <b>bold</b>  outro ", "chunk size {size}");

            let tail = final_release(&buffer, released);
            assert_eq!(tail.text, "<to", "chunk size {size}");
        }
    }

    #[test]
    fn test_final_release_keeps_unterminated_block() {
        let buffer = "Done <tool_call><tool_name>x";
        let release = final_release(buffer, 0);
        assert_eq!(release.text, "Done ");
        assert_eq!(release.consumed, 5);
    }

    #[test]
    fn test_multibyte_text_around_tags() {
        let (pieces, _, released) = stream_through(&["Grüße <", "b>ä</b> ✓"]);
        assert_eq!(pieces.concat(), "Grüße <b>ä</b> ✓");
        assert_eq!(released, "Grüße <b>ä</b> ✓".len());
    }
}
