//! Terminal chatbot for Claude models on Amazon Bedrock.
//!
//! ```bash
//! # Interactive REPL (credentials from bedrock-chat.yaml, .env or the environment)
//! bedrock-chat
//!
//! # Headless single turn
//! bedrock-chat --prompt "What is the capital of France?"
//! bedrock-chat --image cat.jpg --prompt "What breed is this?"
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use bedrock_chat::RunOptions;

/// Chat with a Claude model hosted on Amazon Bedrock.
#[derive(Parser, Debug)]
#[command(name = "bedrock-chat", version, about)]
struct Args {
    /// Path to the config file (default: discover bedrock-chat.yaml, then the environment).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bedrock model id, e.g. anthropic.claude-3-haiku-20240307-v1:0.
    #[arg(short, long)]
    model_id: Option<String>,

    /// Upper bound on tokens generated per reply.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Single prompt to run (headless mode). Runs one turn and exits.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Image to attach (headless mode). JPEG is expected.
    #[arg(short, long)]
    image: Option<PathBuf>,
}

impl From<Args> for RunOptions {
    fn from(args: Args) -> Self {
        Self {
            config: args.config,
            model_id: args.model_id,
            max_tokens: args.max_tokens,
            prompt: args.prompt,
            image: args.image,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    bedrock_chat::run(args.into()).await
}
