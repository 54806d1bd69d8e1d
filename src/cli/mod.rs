//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `serve` (default) -- start the web UI and API
//! - `chat` -- talk to the chat model from the terminal
//! - `analyze` -- run one media analysis and print the result
//! - `config show` -- print the effective configuration
//! - `config path` -- print the default config file location
//! - `version` -- print build/version info

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::ai::gemini::GeminiClient;
use crate::ai::GenerativeBackend;
use crate::config::Config;
use crate::media::{Analyzer, MediaKind, MediaUpload};
use crate::session::{ChatSession, SessionError};

/// Multimodal playground for hosted generative models.
#[derive(Parser, Debug)]
#[command(
    name = "genai-studio",
    version = env!("CARGO_PKG_VERSION"),
    about = "Chat with and analyze images, audio and video using Gemini"
)]
pub struct Cli {
    /// Path to a JSON5 config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web UI and API (default when no subcommand is given).
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Interactive chat in the terminal.
    Chat,

    /// Analyze one image, audio or video file.
    Analyze {
        /// Media kind: image, audio or video.
        #[arg(short, long)]
        kind: MediaKind,

        /// File to analyze.
        #[arg(short, long)]
        file: PathBuf,

        /// Question or instruction for the model.
        #[arg(short = 'q', long)]
        prompt: String,

        /// Declared MIME type (audio only, e.g. "wav" or "audio/mpeg").
        #[arg(long)]
        mime: Option<String>,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (API key redacted) as JSON.
    Show,

    /// Print the default configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

/// Run the `serve` subcommand.
pub async fn handle_serve(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;
    crate::server::serve(config).await?;
    Ok(())
}

/// Run the `chat` subcommand.
pub async fn handle_chat(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let backend = GeminiClient::from_config(&config)?;
    let mut session = ChatSession::new();

    let mut stdout = tokio::io::stdout();
    for turn in session.turns() {
        stdout
            .write_all(format!("{}: {}\n", turn.role.as_str(), turn.text).as_bytes())
            .await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            _ => {}
        }
        match session.send(&backend, &config.models.chat, &line).await {
            Ok(reply) => {
                stdout.write_all(format!("model: {reply}\n").as_bytes()).await?;
            }
            Err(SessionError::Backend(e)) => eprintln!("error: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Run the `analyze` subcommand.
pub async fn handle_analyze(
    config: Config,
    kind: MediaKind,
    file: PathBuf,
    prompt: String,
    mime: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend: Arc<dyn GenerativeBackend> = Arc::new(GeminiClient::from_config(&config)?);
    let analyzer = Analyzer::new(backend, &config);

    let data = tokio::fs::read(&file).await?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut upload = MediaUpload::new(filename, data);
    if let Some(mime) = mime {
        upload = upload.with_content_type(mime);
    }

    let text = analyzer.analyze(kind, &prompt, upload).await?;
    println!("{text}");
    Ok(())
}

/// Run the `config show` subcommand.
pub fn handle_config_show(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path() {
    match crate::config::default_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(no config directory on this platform)"),
    }
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("genai-studio {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("GENAI_STUDIO_BUILD_DATE"));
    println!("  Git commit: {}", env!("GENAI_STUDIO_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}
