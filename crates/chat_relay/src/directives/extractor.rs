use super::markup::{parse_element_body, MarkupError};
use super::{BlockSpans, Directive, OPEN_TAG};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectiveParseError {
    #[error("Malformed directive block: {0}")]
    Markup(#[from] MarkupError),
    #[error("Directive block has no tool_name")]
    MissingName,
    #[error("Directive block has no parameters")]
    MissingParameters,
}

/// Lazily parses the complete directive blocks of a text, in order.
///
/// Blocks that fail to parse are skipped. The iterator keeps no state beyond
/// its position, so extracting the same text again yields the same directives.
pub struct DirectiveIter<'a> {
    text: &'a str,
    spans: BlockSpans<'a>,
}

impl Iterator for DirectiveIter<'_> {
    type Item = Directive;

    fn next(&mut self) -> Option<Directive> {
        for span in self.spans.by_ref() {
            let body = &self.text[span.body_start..span.body_end];
            match parse_directive(body) {
                Ok(directive) => return Some(directive),
                Err(e) => debug!("Skipping directive block at offset {}: {}", span.start, e),
            }
        }
        None
    }
}

/// Find every directive in `text`.
pub fn extract_directives(text: &str) -> DirectiveIter<'_> {
    DirectiveIter {
        text,
        spans: BlockSpans::new(text),
    }
}

/// Parse the body between the open and close tags of a block
pub fn parse_directive(body: &str) -> Result<Directive, DirectiveParseError> {
    let root = parse_element_body("tool_call", body)?;

    let name = root
        .child("tool_name")
        .map(|element| element.text.trim())
        .filter(|name| !name.is_empty())
        .ok_or(DirectiveParseError::MissingName)?;
    let params = root
        .child("parameters")
        .ok_or(DirectiveParseError::MissingParameters)?;

    let mut parameters = IndexMap::new();
    for param in &params.children {
        let value = param.text.trim();
        if !value.is_empty() {
            parameters.insert(param.name.clone(), value.to_string());
        }
    }

    Ok(Directive::new(name, parameters))
}

fn blank_lines() -> &'static Regex {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid blank line pattern"))
}

/// The user-visible form of a finished response: complete directive blocks
/// removed, an unterminated block cut off, runs of blank lines collapsed into
/// one and surrounding whitespace trimmed.
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut pos = 0;
    for span in BlockSpans::new(text) {
        stripped.push_str(&text[pos..span.start]);
        pos = span.end;
    }
    let tail = &text[pos..];
    match tail.find(OPEN_TAG) {
        Some(open) => stripped.push_str(&tail[..open]),
        None => stripped.push_str(tail),
    }

    blank_lines()
        .replace_all(&stripped, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote_block(customer: &str) -> String {
        format!(
            "<tool_call><tool_name>generate_quote</tool_name><parameters><customer_name>{customer}</customer_name><quantity>5</quantity></parameters></tool_call>"
        )
    }

    #[test]
    fn test_extracts_name_and_ordered_parameters() {
        let text = format!("Sure! {}", quote_block("Acme Corp"));
        let directives: Vec<_> = extract_directives(&text).collect();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].name, "generate_quote");
        let keys: Vec<_> = directives[0].parameters.keys().cloned().collect();
        assert_eq!(keys, vec!["customer_name", "quantity"]);
        assert_eq!(directives[0].parameters["customer_name"], "Acme Corp");
    }

    #[test]
    fn test_values_are_trimmed_and_empty_values_dropped() {
        let text = "<tool_call>\n  <tool_name> create_approval_flow </tool_name>\n  <parameters>\n    <flow_name>\n  Budget  </flow_name>\n    <notes>   </notes>\n    <approvers/>\n  </parameters>\n</tool_call>";
        let directive = extract_directives(text).next().unwrap();
        assert_eq!(directive.name, "create_approval_flow");
        assert_eq!(directive.parameters.len(), 1);
        assert_eq!(directive.parameters["flow_name"], "Budget");
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let text = format!(
            "<tool_call><tool_name>broken</tool_name><parameters><a>1</b></parameters></tool_call>\
             <tool_call><parameters></parameters></tool_call>\
             <tool_call><tool_name>no_params</tool_name></tool_call>\
             {}",
            quote_block("Globex")
        );
        let directives: Vec<_> = extract_directives(&text).collect();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].parameters["customer_name"], "Globex");
    }

    #[test]
    fn test_parse_errors_are_classified() {
        assert_eq!(
            parse_directive("<parameters/>"),
            Err(DirectiveParseError::MissingName)
        );
        assert_eq!(
            parse_directive("<tool_name>x</tool_name>"),
            Err(DirectiveParseError::MissingParameters)
        );
        assert!(matches!(
            parse_directive("<tool_name>x</tool_name><parameters>"),
            Err(DirectiveParseError::Markup(_))
        ));
    }

    #[test]
    fn test_extraction_is_restartable() {
        let text = format!("{} and {}", quote_block("A"), quote_block("B"));
        let first: Vec<_> = extract_directives(&text).collect();
        let second: Vec<_> = extract_directives(&text).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unterminated_block_yields_nothing() {
        let text = "<tool_call><tool_name>generate_quote</tool_name><parameters>";
        assert_eq!(extract_directives(text).count(), 0);
    }

    #[test]
    fn test_clean_text_removes_blocks_and_collapses_blank_lines() {
        let text = format!("Hello {} world", quote_block("Acme"));
        assert_eq!(clean_text(&text), "Hello  world");

        let text = format!("Line one\n\n{}\n\n\nLine two\n", quote_block("Acme"));
        assert_eq!(clean_text(&text), "Line one\n\nLine two");
    }

    #[test]
    fn test_clean_text_drops_unterminated_block() {
        let text = format!("Here you go. {} Wait <tool_call><tool_name>x", quote_block("A"));
        assert_eq!(clean_text(&text), "Here you go.  Wait");
    }

    #[test]
    fn test_clean_text_keeps_other_markup() {
        assert_eq!(clean_text("  <b>bold</b> and <to  "), "<b>bold</b> and <to");
    }
}
