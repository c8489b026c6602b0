//! Minimal well-formedness checking parser for directive block bodies.
//!
//! Supports nested elements, self-closing elements, the predefined and numeric
//! character references, comments and CDATA sections. Attributes are accepted
//! and ignored. Anything else that is not well-formed is an error.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("Unterminated tag")]
    UnterminatedTag,
    #[error("Invalid element name: '{0}'")]
    InvalidName(String),
    #[error("Closing tag '{0}' has no matching opening tag")]
    UnexpectedClose(String),
    #[error("Expected closing tag for '{expected}', found '{found}'")]
    MismatchedClose { expected: String, found: String },
    #[error("Element '{0}' is never closed")]
    Unclosed(String),
    #[error("Unknown character reference: '{0}'")]
    UnknownEntity(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub children: Vec<Element>,
    /// All character data directly inside this element
    pub text: String,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Parse `content` as the body of an element called `root_name`.
pub fn parse_element_body(root_name: &str, content: &str) -> Result<Element, MarkupError> {
    let mut stack = vec![Element::new(root_name)];
    let mut rest = content;

    while !rest.is_empty() {
        let Some(special) = rest.find(['<', '&']) else {
            current(&mut stack).text.push_str(rest);
            break;
        };
        current(&mut stack).text.push_str(&rest[..special]);
        rest = &rest[special..];

        if rest.starts_with('&') {
            let end = rest.find(';').ok_or_else(|| {
                MarkupError::UnknownEntity(rest.chars().take(8).collect())
            })?;
            let decoded = decode_entity(&rest[1..end])?;
            current(&mut stack).text.push(decoded);
            rest = &rest[end + 1..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->").ok_or(MarkupError::UnterminatedTag)?;
            rest = &after[end + 3..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("<![CDATA[") {
            let end = after.find("]]>").ok_or(MarkupError::UnterminatedTag)?;
            current(&mut stack).text.push_str(&after[..end]);
            rest = &after[end + 3..];
            continue;
        }

        let close = rest.find('>').ok_or(MarkupError::UnterminatedTag)?;
        let tag = &rest[1..close];
        rest = &rest[close + 1..];

        if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim_end();
            validate_name(name)?;
            if stack.len() == 1 {
                return Err(MarkupError::UnexpectedClose(name.to_string()));
            }
            let element = stack.pop().ok_or(MarkupError::UnterminatedTag)?;
            if element.name != name {
                return Err(MarkupError::MismatchedClose {
                    expected: element.name,
                    found: name.to_string(),
                });
            }
            current(&mut stack).children.push(element);
        } else {
            let self_closing = tag.ends_with('/');
            let tag = tag.strip_suffix('/').unwrap_or(tag);
            let name = tag.split_whitespace().next().unwrap_or_default();
            if tag.starts_with(char::is_whitespace) {
                return Err(MarkupError::InvalidName(tag.to_string()));
            }
            validate_name(name)?;
            let element = Element::new(name);
            if self_closing {
                current(&mut stack).children.push(element);
            } else {
                stack.push(element);
            }
        }
    }

    if stack.len() > 1 {
        let open = stack.pop().map(|element| element.name).unwrap_or_default();
        return Err(MarkupError::Unclosed(open));
    }
    stack.pop().ok_or(MarkupError::UnterminatedTag)
}

fn current(stack: &mut [Element]) -> &mut Element {
    let last = stack.len() - 1;
    &mut stack[last]
}

fn validate_name(name: &str) -> Result<(), MarkupError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(MarkupError::InvalidName(name.to_string()))
    }
}

fn decode_entity(entity: &str) -> Result<char, MarkupError> {
    let decoded = match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => entity
            .strip_prefix("#x")
            .map(|hex| u32::from_str_radix(hex, 16))
            .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
            .and_then(Result::ok)
            .and_then(char::from_u32),
    };
    decoded.ok_or_else(|| MarkupError::UnknownEntity(entity.to_string()))
}
