//! Socratic Loom - interactive terminal driver
//!
//! Starts one synthesis session over the topics given on the command line and
//! relays student messages to the dialogue engine until the thesis is achieved
//! or stdin closes.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use socratic_loom::adapters::{
    AnthropicConfig, AnthropicGenerator, InMemorySessionRepository, MockGenerator,
};
use socratic_loom::application::{SubmitMessageCommand, SubmitMessageHandler};
use socratic_loom::config::{AppConfig, LogFormat};
use socratic_loom::domain::foundation::SessionId;
use socratic_loom::domain::synthesis::{SynthesisSession, Topic, TopicSet};
use socratic_loom::ports::{StructuredGenerator, SynthesisSessionRepository};

/// Command-line arguments for socratic-loom
#[derive(Parser, Debug)]
#[command(name = "socratic-loom")]
#[command(about = "Socratic synthesis dialogue over two to four topics")]
#[command(version)]
struct Args {
    /// Topic titles to connect (2 to 4)
    #[arg(required = true, num_args = 2..=4)]
    topics: Vec<String>,

    /// Use the scripted offline generator instead of the Anthropic API
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    if args.offline {
        config.dialogue.validate()?;
    } else {
        config.validate()?;
    }

    let topics = topic_set(&args.topics)?;
    let generator = build_generator(&config, args.offline)?;

    let repository = Arc::new(InMemorySessionRepository::new());
    let session = SynthesisSession::new(SessionId::new(), topics, Vec::new());
    let session_id = *session.id();
    repository.save(&session).await?;

    let handler = SubmitMessageHandler::new(repository, generator)
        .with_retry_policy(config.dialogue.retry_policy())
        .with_sanitizer(config.dialogue.sanitizer())
        .with_gate_policy(config.dialogue.thesis_gate);

    info!(session_id = %session_id, topics = ?args.topics, "Synthesis session started");
    println!("Connect these topics: {}", args.topics.join(", "));
    println!("Type your thinking and press enter. Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = SubmitMessageCommand {
            session_id,
            message: line,
        };

        match handler.handle(cmd).await {
            Ok(result) => {
                println!("\n{}\n", result.turn.socratic_response());
                if let Some(thread) = result.turn.crystallized_thread() {
                    println!("  thread: {}", thread);
                }
                if let Some(achievement) = result.session.achievement() {
                    println!("Thesis achieved.");
                    for (i, thread) in achievement.outline().iter().enumerate() {
                        println!("  {}. {}", i + 1, thread);
                    }
                    println!("Proof: {}", achievement.proof_of_cognition());
                    println!("Digest: {}", achievement.proof_digest());
                    break;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Turn failed");
                println!("{}", err.user_message());
            }
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn topic_set(titles: &[String]) -> Result<TopicSet> {
    let topics = titles
        .iter()
        .enumerate()
        .map(|(i, title)| Topic::new(format!("topic-{}", i + 1), title.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TopicSet::new(topics)?)
}

fn build_generator(config: &AppConfig, offline: bool) -> Result<Arc<dyn StructuredGenerator>> {
    if offline {
        return Ok(Arc::new(MockGenerator::new()));
    }

    let Some(api_key) = config.ai.anthropic_api_key.clone() else {
        bail!("SOCRATIC_LOOM__AI__ANTHROPIC_API_KEY is not set");
    };

    let anthropic = AnthropicConfig::new(api_key)
        .with_model(config.ai.model.clone())
        .with_base_url(config.ai.base_url.clone())
        .with_timeout(config.ai.timeout())
        .with_max_tokens(config.ai.max_tokens);

    Ok(Arc::new(AnthropicGenerator::new(anthropic)?))
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}
