use crate::types::{LLMRequest, Message, MessageRole};
use std::fmt;

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.role, self.content.replace('\n', "\n    "))
    }
}

impl fmt::Display for LLMRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LLMRequest:")?;
        writeln!(f, "  System prompt: {} characters", self.system_prompt.len())?;
        writeln!(f, "  Messages:")?;
        for (i, message) in self.messages.iter().enumerate() {
            write!(f, "    [{i}] {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_display_lists_messages() {
        let request = LLMRequest {
            messages: vec![Message::user("Hi"), Message::assistant("Hello\nthere")],
            system_prompt: "Be brief.".to_string(),
            ..Default::default()
        };

        let rendered = request.to_string();
        assert!(rendered.contains("System prompt: 9 characters"));
        assert!(rendered.contains("[0] user: Hi"));
        assert!(rendered.contains("[1] assistant: Hello\n    there"));
    }
}
