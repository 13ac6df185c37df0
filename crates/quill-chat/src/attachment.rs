//! User input with an optional attachment reference

use quill_ai::Message;
use std::path::Path;

use crate::error::{Error, Result};

/// A reference to an already-hosted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Use the last path segment of `url` as the name
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self { name, url }
    }

    /// Markup that embeds the attachment in a message
    pub fn render(&self) -> String {
        let extension = self.url.rsplit('.').next().unwrap_or_default();
        match extension {
            "jpg" | "png" | "gif" => format!("![image]({})", self.url),
            "mp4" => format!("<video src=\"{}\" controls></video>", self.url),
            _ => format!("[{}]({})", self.name, self.url),
        }
    }
}

/// Placeholder for the file upload endpoint.
///
/// Only hosted URLs can be attached; every upload is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadStub;

impl UploadStub {
    pub fn upload(&self, path: &Path) -> Result<Attachment> {
        tracing::debug!(path = %path.display(), "upload requested");
        Err(Error::UploadUnavailable(path.display().to_string()))
    }
}

/// Whether `reference` names a hosted file rather than a local path
pub fn is_hosted(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// What the user typed, plus the pending attachment if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// True when there is neither text nor an attachment URL
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.attachment.as_ref().is_none_or(|a| a.url.is_empty())
    }

    /// Build the user turn, or `None` if the input is empty
    pub fn into_message(self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        let content = match self.attachment {
            Some(attachment) if !attachment.url.is_empty() => {
                format!("{} {}", attachment.render(), self.text)
            }
            _ => self.text,
        };
        Some(Message::user(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_image() {
        let a = Attachment::new("cat.png", "https://cdn.example.com/cat.png");
        assert_eq!(a.render(), "![image](https://cdn.example.com/cat.png)");
    }

    #[test]
    fn test_render_video() {
        let a = Attachment::new("clip", "https://cdn.example.com/clip.mp4");
        assert_eq!(
            a.render(),
            "<video src=\"https://cdn.example.com/clip.mp4\" controls></video>"
        );
    }

    #[test]
    fn test_render_other_is_link() {
        let a = Attachment::from_url("https://cdn.example.com/files/report.pdf");
        assert_eq!(a.name, "report.pdf");
        assert_eq!(a.render(), "[report.pdf](https://cdn.example.com/files/report.pdf)");
    }

    #[test]
    fn test_upload_is_refused() {
        let err = UploadStub.upload(Path::new("/tmp/cat.png")).unwrap_err();
        assert!(matches!(err, Error::UploadUnavailable(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_is_hosted() {
        assert!(is_hosted("https://cdn.example.com/a.png"));
        assert!(is_hosted("http://localhost/a.png"));
        assert!(!is_hosted("./a.png"));
        assert!(!is_hosted("/tmp/a.png"));
    }

    #[test]
    fn test_empty_input() {
        assert!(UserInput::text("").is_empty());
        assert!(UserInput::text("  \n").is_empty());
        assert!(UserInput::text("").with_attachment(Attachment::new("x", "")).is_empty());
        assert!(UserInput::text("").into_message().is_none());
    }

    #[test]
    fn test_attachment_only_is_not_empty() {
        let input = UserInput::text("").with_attachment(Attachment::new(
            "cat.gif",
            "https://cdn.example.com/cat.gif",
        ));
        assert!(!input.is_empty());
        assert_eq!(
            input.into_message(),
            Some(Message::user("![image](https://cdn.example.com/cat.gif) "))
        );
    }

    #[test]
    fn test_attachment_prefixes_text() {
        let input = UserInput::text("what is this?")
            .with_attachment(Attachment::from_url("https://cdn.example.com/a.png"));
        assert_eq!(
            input.into_message().unwrap().content,
            "![image](https://cdn.example.com/a.png) what is this?"
        );
    }
}
