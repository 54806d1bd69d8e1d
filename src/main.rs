use clap::Parser;

use genai_studio::cli::{self, Cli, Command, ConfigCommand};
use genai_studio::config::{self, Config};
use genai_studio::logging::init_logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = config::find_dotenv(&std::env::current_dir()?) {
        config::load_dotenv(&path)?;
    }

    let args = Cli::parse();
    let config_path = args.config.as_deref();

    match args.command {
        Some(Command::Version) => {
            cli::handle_version();
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Path)) => {
            cli::handle_config_path();
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = Config::resolve(config_path)?;
            cli::handle_config_show(&config)
        }
        Some(Command::Chat) => {
            let config = load(config_path)?;
            cli::handle_chat(config).await
        }
        Some(Command::Analyze {
            kind,
            file,
            prompt,
            mime,
        }) => {
            let config = load(config_path)?;
            cli::handle_analyze(config, kind, file, prompt, mime).await
        }
        Some(Command::Serve { bind, port }) => {
            let config = load(config_path)?;
            cli::handle_serve(config, bind, port).await
        }
        None => {
            let config = load(config_path)?;
            cli::handle_serve(config, None, None).await
        }
    }
}

/// Load and validate configuration, then install logging.
fn load(path: Option<&std::path::Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load(path)?;
    init_logging(&config.logging)?;
    tracing::debug!(
        base_url = %config.base_url,
        chat_model = %config.models.chat,
        video_model = %config.models.video,
        "configuration loaded"
    );
    Ok(config)
}
