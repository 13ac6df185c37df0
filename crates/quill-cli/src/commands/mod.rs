//! Slash commands for interactive mode

use quill_chat::{Attachment, UploadStub, is_hosted};
use std::path::Path;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Regenerate the latest reply
    Regenerate,
    /// Copy the latest reply to the clipboard
    Copy,
    /// Attach a hosted file to the next message
    Attach(Attachment),
    /// Drop the pending attachment
    Detach,
    /// Switch the model used for new requests
    ChangeModel(String),
    /// Show a message to the user (not sent upstream)
    Message(String),
    /// Show an error to the user
    Error(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
///
/// Returns `None` when `input` is not a command.
pub fn execute_command(input: &str, current_model: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command.to_lowercase(), args.trim()),
        None => (rest.to_lowercase(), ""),
    };

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "clear" | "c" => CommandResult::Clear,
        "retry" | "r" => CommandResult::Regenerate,
        "copy" | "y" => CommandResult::Copy,
        "attach" | "a" => attach(args),
        "detach" => CommandResult::Detach,
        "model" | "m" => {
            if args.is_empty() {
                CommandResult::Message(format!("Current model: {}", current_model))
            } else {
                CommandResult::ChangeModel(args.to_string())
            }
        }
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

fn attach(args: &str) -> CommandResult {
    let mut parts = args.split_whitespace();
    let Some(reference) = parts.next() else {
        return CommandResult::Error("Usage: /attach <url> [name]".to_string());
    };

    if !is_hosted(reference) {
        return match UploadStub.upload(Path::new(reference)) {
            Ok(attachment) => CommandResult::Attach(attachment),
            Err(e) => CommandResult::Error(e.to_string()),
        };
    }

    let name: Vec<&str> = parts.collect();
    let attachment = if name.is_empty() {
        Attachment::from_url(reference)
    } else {
        Attachment::new(name.join(" "), reference)
    };
    CommandResult::Attach(attachment)
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?           Show this help message
  /attach, /a <url> [name] Attach a hosted file to the next message
  /detach                 Drop the pending attachment
  /retry, /r              Regenerate the latest reply
  /copy, /y               Copy the latest reply to the clipboard
  /model, /m [name]       Show or switch the model
  /clear, /c              Clear conversation history
  /quit, /exit, /q        Exit quill

Keys:
  Enter                   Send message
  Shift+Enter, Alt+Enter  New line
  Esc                     Stop the streaming reply
  Ctrl+R / Ctrl+Y         Retry / copy the latest reply
  Ctrl+L                  Clear conversation
  Ctrl+C                  Stop, or quit when idle"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_command() {
        assert_eq!(execute_command("hello", "m"), None);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(execute_command("/clear", "m"), Some(CommandResult::Clear));
        assert_eq!(execute_command(" /RETRY ", "m"), Some(CommandResult::Regenerate));
        assert_eq!(execute_command("/y", "m"), Some(CommandResult::Copy));
        assert_eq!(execute_command("/q", "m"), Some(CommandResult::Exit));
        assert_eq!(
            execute_command("/nope", "m"),
            Some(CommandResult::Unknown("nope".into()))
        );
    }

    #[test]
    fn test_attach_url() {
        assert_eq!(
            execute_command("/attach https://cdn.example.com/cat.png", "m"),
            Some(CommandResult::Attach(Attachment::new(
                "cat.png",
                "https://cdn.example.com/cat.png"
            )))
        );
        assert_eq!(
            execute_command("/a https://cdn.example.com/f?id=1 quarterly report", "m"),
            Some(CommandResult::Attach(Attachment::new(
                "quarterly report",
                "https://cdn.example.com/f?id=1"
            )))
        );
    }

    #[test]
    fn test_attach_local_path_is_refused() {
        match execute_command("/attach ./notes.txt", "m") {
            Some(CommandResult::Error(msg)) => assert!(msg.contains("not supported")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            execute_command("/attach", "m"),
            Some(CommandResult::Error(_))
        ));
    }

    #[test]
    fn test_model() {
        assert_eq!(
            execute_command("/model", "gpt-4-all"),
            Some(CommandResult::Message("Current model: gpt-4-all".into()))
        );
        assert_eq!(
            execute_command("/model gpt-4o", "gpt-4-all"),
            Some(CommandResult::ChangeModel("gpt-4o".into()))
        );
    }
}
