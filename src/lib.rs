pub mod commands;
pub mod conversation;
pub mod inference;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use commands::chat::{run_repl, run_single_turn, ChatSession};
use conversation::Chatbot;
use inference::config::{load_config, load_or_env, AppConfig};

/// Return the platform-standard data directory for Bedrock Chat.
///
/// - macOS: `~/Library/Application Support/bedrock-chat/`
/// - Windows: `{FOLDERID_RoamingAppData}\bedrock-chat\`
/// - Linux: `$XDG_DATA_HOME/bedrock-chat/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.bedrock-chat/` only if none of the above can be resolved.
pub(crate) fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("bedrock-chat");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bedrock-chat")
}

/// Initialize the tracing subscriber, writing to `chat.log` in the data directory.
///
/// Stdout belongs to the conversation, so logs only go to the file.
/// On each startup the previous logs are rotated (keeps the last 3) and a
/// banner with the log location is written. Returns the log file path.
pub fn init_tracing() -> Result<PathBuf> {
    use tracing_subscriber::fmt;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_path = log_dir.join("chat.log");

    // Rotate: chat.log.2 → .3, .1 → .2, chat.log → .1
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    fmt::fmt()
        .with_env_filter(log_filter())
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== Bedrock Chat starting ==="
    );

    Ok(log_path)
}

/// `RUST_LOG` if set (including from `.env`), else `bedrock_chat=info,warn`.
fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bedrock_chat=info,warn"))
}

/// Rotate log files: `chat.log` → `chat.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk even if the process dies mid-turn.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Startup ────────────────────────────────────────────────────────────────

/// Options collected by the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit config file; otherwise discovered or read from the environment.
    pub config: Option<PathBuf>,
    pub model_id: Option<String>,
    pub max_tokens: Option<u32>,
    /// Headless mode: one turn with this text, then exit.
    pub prompt: Option<String>,
    /// Headless mode: one turn with this image, then exit.
    pub image: Option<PathBuf>,
}

impl RunOptions {
    fn is_headless(&self) -> bool {
        self.prompt.is_some() || self.image.is_some()
    }
}

/// Resolve configuration: explicit file, discovered file, or environment,
/// then command-line overrides.
///
/// Expects `.env` to be loaded already.
pub fn resolve_config(options: &RunOptions) -> Result<AppConfig> {
    let config = match &options.config {
        Some(path) => load_config(path)?,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            load_or_env(&cwd)?
        }
    };
    apply_overrides(config, options)
}

fn apply_overrides(mut config: AppConfig, options: &RunOptions) -> Result<AppConfig> {
    if let Some(model_id) = &options.model_id {
        config.model = config.model.with_model_id(model_id.as_str());
    }
    if let Some(max_tokens) = options.max_tokens {
        config.model = config.model.with_max_tokens(max_tokens);
    }
    config.model.validate()?;
    Ok(config)
}

/// Start the chatbot: one headless turn when a prompt or image is given,
/// otherwise the interactive REPL on stdin/stdout.
pub async fn run(options: RunOptions) -> Result<()> {
    // Before tracing, so RUST_LOG from .env applies. A missing .env is fine.
    dotenv::dotenv().ok();
    let log_path = init_tracing()?;

    let config = resolve_config(&options)?;
    let chatbot = Chatbot::from_app_config(&config).context("cannot start chatbot")?;

    let model = chatbot.config();
    tracing::info!(
        session_id = %chatbot.session_id(),
        model_id = %model.model_id(),
        max_tokens = model.max_tokens(),
        replay_history = config.memory.replay_history,
        "chatbot ready"
    );

    if options.is_headless() {
        let answer =
            run_single_turn(&chatbot, options.prompt.as_deref(), options.image.as_deref()).await?;
        println!("{answer}");
        return Ok(());
    }

    println!("Bedrock Chat ({})", model.model_id());
    println!("{}", commands::COMMAND_HELP);
    println!("Logs: {}\n", log_path.display());

    let mut session = ChatSession::new(chatbot);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_repl(&mut session, stdin, &mut stdout).await
}

// ─── Tests ──────────────────────────────────────────────────────────────────
