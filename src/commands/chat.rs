//! The chat loop behind the terminal frontend.
//!
//! `ChatSession` owns the chatbot and the session's memory and executes one
//! parsed [`Command`] at a time. Turn failures are logged and shown as a
//! generic message; the loop always continues.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::conversation::{Chatbot, ConversationMemory};
use crate::inference::errors::InferenceError;
use crate::inference::types::ImageData;

use super::{parse_command, Command, COMMAND_HELP};

/// Shown in place of an answer when a turn fails.
pub const FAILURE_MESSAGE: &str = "Sorry, I couldn't get an answer. Please try again.";

/// Shown when a turn has neither text nor an image.
const EMPTY_TURN_MESSAGE: &str = "Type a message or attach an image with /image <path>.";

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

// ─── ChatSession ────────────────────────────────────────────────────────────

/// One interactive session: a chatbot plus the memory it writes to.
pub struct ChatSession {
    chatbot: Chatbot,
    memory: ConversationMemory,
}

impl ChatSession {
    pub fn new(chatbot: Chatbot) -> Self {
        Self {
            chatbot,
            memory: ConversationMemory::new(),
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Execute one command, writing everything user-facing to `out`.
    ///
    /// Only write errors on `out` are returned; turn failures are reported
    /// inline.
    pub async fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        match command {
            Command::Empty => {}
            Command::Quit => return Ok(Flow::Quit),
            Command::History => {
                if self.memory.is_empty() {
                    writeln!(out, "No conversation history.")?;
                } else {
                    writeln!(out, "{}", self.memory.to_context_string())?;
                    writeln!(
                        out,
                        "({} exchanges, ~{} tokens)",
                        self.memory.len(),
                        self.memory.estimated_tokens()
                    )?;
                }
            }
            Command::Reset => {
                self.memory.reset();
                tracing::info!(session_id = %self.chatbot.session_id(), "memory reset");
                writeln!(out, "History cleared.")?;
            }
            Command::MissingImagePath => {
                writeln!(out, "Usage: /image <path> [text]")?;
            }
            Command::Unknown(name) => {
                writeln!(out, "Unknown command: {name}")?;
                writeln!(out, "{COMMAND_HELP}")?;
            }
            Command::Say(text) => {
                self.turn(Some(text.as_str()), None, out).await?;
            }
            Command::Image { path, text } => match load_image(&path).await {
                Ok(image) => self.turn(text.as_deref(), Some(&image), out).await?,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load image");
                    writeln!(out, "Could not read image {}: {e:#}", path.display())?;
                }
            },
        }
        Ok(Flow::Continue)
    }

    async fn turn<W: Write>(
        &mut self,
        text: Option<&str>,
        image: Option<&ImageData>,
        out: &mut W,
    ) -> Result<()> {
        match self
            .chatbot
            .converse(text, image, Some(&mut self.memory))
            .await
        {
            Ok(answer) => writeln!(out, "{answer}\n")?,
            Err(InferenceError::EmptyTurn) => writeln!(out, "{EMPTY_TURN_MESSAGE}")?,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.chatbot.session_id(),
                    error = %e,
                    status = ?e.http_status(),
                    "turn failed"
                );
                writeln!(out, "{FAILURE_MESSAGE}\n")?;
            }
        }
        Ok(())
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Read an image file and encode it for a turn.
pub async fn load_image(path: &Path) -> Result<ImageData> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }
    Ok(ImageData::from_bytes(&bytes))
}

/// Run the REPL until `/quit` or end of input.
pub async fn run_repl<R, W>(session: &mut ChatSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "You> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        if session.handle(parse_command(&line), out).await? == Flow::Quit {
            break;
        }
    }
    writeln!(out, "\nGoodbye!")?;
    Ok(())
}

/// Run one turn without memory and return the answer.
pub async fn run_single_turn(
    chatbot: &Chatbot,
    prompt: Option<&str>,
    image_path: Option<&Path>,
) -> Result<String> {
    let image = match image_path {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };
    chatbot
        .converse(prompt, image.as_ref(), None)
        .await
        .context("no answer from the model")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::inference::config::ModelConfig;
    use crate::inference::transport::testing::{paris_reply, StubTransport};

    fn session(transport: &Arc<StubTransport>) -> ChatSession {
        ChatSession::new(Chatbot::new(transport.clone(), ModelConfig::default()))
    }

    fn printed(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_repl_turn_then_history() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let mut chat = session(&transport);
        let mut out = Vec::new();

        let input: &[u8] = b"What is the capital of France?\n/history\n/quit\nignored\n";
        run_repl(&mut chat, input, &mut out).await.unwrap();

        let text = printed(out);
        assert!(text.contains("Paris\nis the capital."));
        assert!(text.contains("Human: What is the capital of France?\nAI: Paris\nis the capital."));
        assert!(text.contains("(1 exchanges, ~"));
        assert!(text.ends_with("Goodbye!\n"));
        // The line after /quit is never sent.
        assert_eq!(transport.call_count(), 1);
        assert_eq!(chat.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_repl_stops_at_end_of_input() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let mut chat = session(&transport);
        let mut out = Vec::new();

        let input: &[u8] = b"\n\nHi";
        run_repl(&mut chat, input, &mut out).await.unwrap();
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_turn_prints_generic_message_and_continues() {
        let transport = Arc::new(StubTransport::failing(503));
        let mut chat = session(&transport);
        let mut out = Vec::new();

        let flow = chat
            .handle(Command::Say("Hello".into()), &mut out)
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);
        let text = printed(out);
        assert!(text.contains(FAILURE_MESSAGE));
        assert!(!text.contains("503"));
        assert!(chat.memory().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_memory() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let mut chat = session(&transport);
        let mut out = Vec::new();

        chat.handle(Command::Say("Hi".into()), &mut out).await.unwrap();
        assert_eq!(chat.memory().len(), 1);
        chat.handle(Command::Reset, &mut out).await.unwrap();
        assert!(chat.memory().is_empty());

        let mut out = Vec::new();
        chat.handle(Command::History, &mut out).await.unwrap();
        assert_eq!(printed(out), "No conversation history.\n");
    }

    #[tokio::test]
    async fn test_image_command_sends_file_contents() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let mut chat = session(&transport);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let mut out = Vec::new();
        chat.handle(
            Command::Image {
                path,
                text: Some("What is this?".into()),
            },
            &mut out,
        )
        .await
        .unwrap();

        let sent = transport.sent_body(0);
        let content = &sent["messages"][0]["content"];
        assert_eq!(content[0]["text"], "What is this?");
        assert_eq!(content[1]["source"]["data"], "/9j/");
        assert_eq!(chat.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_image_file_makes_no_call() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let mut chat = session(&transport);
        let mut out = Vec::new();

        chat.handle(
            Command::Image {
                path: "/definitely/not/here.jpg".into(),
                text: None,
            },
            &mut out,
        )
        .await
        .unwrap();

        assert!(printed(out).starts_with("Could not read image"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_turn() {
        let transport = Arc::new(StubTransport::replying(paris_reply()));
        let bot = Chatbot::new(transport.clone(), ModelConfig::default());
        let answer = run_single_turn(&bot, Some("Capital of France?"), None)
            .await
            .unwrap();
        assert_eq!(answer, "Paris\nis the capital.");

        let err = run_single_turn(&bot, None, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InferenceError>(),
            Some(InferenceError::EmptyTurn)
        ));
    }

    #[tokio::test]
    async fn test_load_image_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_image(file.path()).await.is_err());
    }
}
