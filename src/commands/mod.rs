//! Terminal frontend: REPL command parsing and the chat loop.
//!
//! Each input line is either a message for the model or a `/command`.

pub mod chat;

use std::path::PathBuf;

/// Help line printed at startup and for unknown commands.
pub const COMMAND_HELP: &str = "Commands: /image <path> [text], /history, /reset, /quit";

/// One parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A text-only turn.
    Say(String),
    /// A turn with an image read from `path`, plus optional text.
    Image { path: PathBuf, text: Option<String> },
    /// Print the conversation transcript.
    History,
    /// Forget the conversation so far.
    Reset,
    /// Leave the REPL.
    Quit,
    /// Blank line.
    Empty,
    /// `/image` without a path.
    MissingImagePath,
    /// Any other `/word`.
    Unknown(String),
}

/// Parse one line of REPL input.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Say(line.to_string());
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/quit" | "/exit" => Command::Quit,
        "/history" => Command::History,
        "/reset" => Command::Reset,
        "/image" => {
            if rest.is_empty() {
                return Command::MissingImagePath;
            }
            let (path, text) = match rest.split_once(char::is_whitespace) {
                Some((path, text)) => (path, Some(text.trim().to_string())),
                None => (rest, None),
            };
            Command::Image {
                path: PathBuf::from(path),
                text: text.filter(|t| !t.is_empty()),
            }
        }
        other => Command::Unknown(other.to_string()),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_turn() {
        assert_eq!(
            parse_command("  What is the capital of France?  "),
            Command::Say("What is the capital of France?".into())
        );
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn test_control_commands() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/reset"), Command::Reset);
        assert_eq!(parse_command("/help"), Command::Unknown("/help".into()));
    }

    #[test]
    fn test_image_with_and_without_text() {
        assert_eq!(
            parse_command("/image cat.jpg"),
            Command::Image {
                path: PathBuf::from("cat.jpg"),
                text: None
            }
        );
        assert_eq!(
            parse_command("/image /tmp/cat.jpg   What breed is this?"),
            Command::Image {
                path: PathBuf::from("/tmp/cat.jpg"),
                text: Some("What breed is this?".into())
            }
        );
        assert_eq!(parse_command("/image"), Command::MissingImagePath);
        assert_eq!(parse_command("/image   "), Command::MissingImagePath);
    }
}
