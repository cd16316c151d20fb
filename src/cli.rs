//! The `chatkit-formatters` demo binary: renders a message file the way a
//! chat screen would, and prints the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::MentionsConfig;
use crate::directory::InMemoryDirectory;
use crate::formatter::{BubbleAlignment, FormatterRegistry, FormattingType, Span};
use crate::mentions::MentionsFormatter;
use crate::model::{Message, User};
use crate::session::ChatSession;

#[derive(Parser, Debug)]
#[clap(name = "chatkit-formatters", version, about = "Render chat messages through the text formatters.")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable verbose logging output.
    #[clap(short, long, action, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one message (a JSON file) and print the text and its spans.
    Render {
        /// The message to render, as JSON.
        #[clap(long, value_parser)]
        message: PathBuf,

        /// A mentions config file, as JSON.
        #[clap(long, value_parser)]
        config: Option<PathBuf>,

        /// Where the message is displayed.
        #[clap(long = "as", value_enum, default_value_t = RenderTarget::Incoming)]
        target: RenderTarget,

        /// The uid of the logged-in user (defaults to the message's sender).
        #[clap(long)]
        me: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RenderTarget {
    Composer,
    Incoming,
    Outgoing,
    Conversation,
}

impl RenderTarget {
    fn context(self) -> (FormattingType, BubbleAlignment) {
        match self {
            Self::Composer => (FormattingType::MessageComposer, BubbleAlignment::Right),
            Self::Incoming => (FormattingType::MessageBubble, BubbleAlignment::Left),
            Self::Outgoing => (FormattingType::MessageBubble, BubbleAlignment::Right),
            Self::Conversation => (FormattingType::ConversationList, BubbleAlignment::Left),
        }
    }
}

#[derive(Serialize)]
struct RenderOutput<'a> {
    text: &'a str,
    spans: Vec<RenderedSpan<'a>>,
}

#[derive(Serialize)]
struct RenderedSpan<'a> {
    start: usize,
    end: usize,
    #[serde(flatten)]
    span: &'a Span,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Render { message, config, target, me } => render(message, config, target, me),
    }
}

fn render(message_path: PathBuf, config_path: Option<PathBuf>, target: RenderTarget, me: Option<String>) -> Result<()> {
    let contents = std::fs::read_to_string(&message_path)
        .with_context(|| format!("could not read message file {message_path:?}"))?;
    let message: Message = serde_json::from_str(&contents)
        .with_context(|| format!("{message_path:?} is not a valid message"))?;
    if message.text.is_empty() {
        bail!("message {} has no text to render", message.id);
    }

    let config = match config_path {
        Some(path) => MentionsConfig::load(&path)?,
        None => MentionsConfig::default(),
    };

    let logged_in_user = match (me, &message.sender) {
        (Some(uid), _) => message.mentioned_user(&uid).cloned().unwrap_or_else(|| User::new(uid.clone(), uid)),
        (None, Some(sender)) => sender.clone(),
        (None, None) => bail!("pass --me or give the message a sender"),
    };
    tracing::debug!("Rendering message {} as {target:?} for {}", message.id, logged_in_user.uid);

    let runtime = tokio::runtime::Runtime::new().context("could not start the async runtime")?;
    let directory = InMemoryDirectory::new(message.mentioned_users.clone());
    let session = Arc::new(ChatSession::new(logged_in_user, Arc::new(directory), runtime.handle().clone()));

    let mut mentions = MentionsFormatter::with_config(session, config)?;
    mentions.set_conversation_target(message.receiver.clone());
    let mut registry = FormatterRegistry::new();
    registry.register(Box::new(mentions));

    let (formatting_type, alignment) = target.context();
    let rendered = registry.format(&message, alignment, formatting_type);

    let output = RenderOutput {
        text: rendered.as_str(),
        spans: rendered.spans.iter()
            .map(|span| {
                let chars = rendered.char_range(span);
                RenderedSpan { start: chars.start, end: chars.end, span }
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
