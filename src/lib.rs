pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
pub mod model;
pub mod output;
pub mod payload;
pub mod registry;
pub mod repl;
pub mod transcript;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use reqwest::Client;
use tracing::info;

use api::stream::RenderStyle;
use cli::Cli;
use config::Settings;
use model::{FileSettings, Message};
use transcript::{EnsureOutcome, Transcript};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    if cli.list {
        println!("{}", registry::render_model_list());
        return Ok(());
    }
    if let Some(model) = cli.modelinfo.as_deref() {
        println!("{}", registry::render_model_info(model)?);
        return Ok(());
    }

    let token = config::resolve_access_token(cli.access_token.as_deref())?;
    let sys_prompt = cli
        .sys_prompt_file
        .as_deref()
        .map(read_system_prompt)
        .transpose()?;

    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    if let Some(prompt_arg) = cli.prompt.as_deref() {
        let prompt_text = read_prompt_arg(prompt_arg)?;
        return match cli.conversation_file.as_deref() {
            Some(raw_path) => {
                let path = expand_tilde(raw_path);
                prompt_turn_with_file(
                    &client,
                    &cli,
                    &token,
                    sys_prompt.as_deref(),
                    &prompt_text,
                    &path,
                )
                .await
            }
            None => {
                prompt_turn_stateless(&client, &cli, &token, sys_prompt.as_deref(), &prompt_text)
                    .await
            }
        };
    }

    interactive(&client, &cli, &token, sys_prompt.as_deref()).await
}

// Precedence: registry defaults, then the conversation file, then CLI flags.
fn resolve_settings(cli: &Cli, file: Option<&FileSettings>) -> Result<Settings> {
    let model = cli.model.as_deref().unwrap_or(registry::DEFAULT_MODEL);
    let mut settings = Settings::resolve(model, config::resolve_base_url(), file);
    settings.apply_overrides(&cli.param_overrides())?;
    settings.apply_stream_override(cli.stream_override());
    settings.apply_limit_override(cli.limit)?;
    settings.validate()?;

    info!(
        model = %settings.model,
        base_url = %settings.base_url,
        stream = settings.stream,
        history_limit = settings.history_limit,
        "loaded runtime configuration"
    );
    Ok(settings)
}

fn prepare_transcript(
    cli: &Cli,
    path: &Path,
    sys_prompt: Option<&str>,
) -> Result<(Transcript, Settings)> {
    let transcript = Transcript::new(path);
    let outcome = transcript.ensure(
        cli.stream_override().unwrap_or(config::DEFAULT_STREAM),
        cli.limit.unwrap_or(config::DEFAULT_HISTORY_LIMIT),
    )?;
    if let EnsureOutcome::Recreated { backup } = &outcome {
        output::status(&format!(
            "Warning: conversation file at {} was malformed. Backed up to {} and created a new one.",
            path.display(),
            backup.display()
        ));
    }

    let conversation = transcript.load()?;
    let settings = resolve_settings(cli, Some(&conversation.settings))?;

    if cli.save_settings {
        transcript.persist_settings(&settings)?;
        output::success(&format!("Settings persisted to {}", path.display()));
    }
    if cli.persist_system && let Some(system) = sys_prompt {
        transcript.set_system(system)?;
        output::success(&format!("System prompt persisted to {}", path.display()));
    }

    Ok((transcript, settings))
}

async fn prompt_turn_with_file(
    client: &Client,
    cli: &Cli,
    token: &str,
    sys_prompt: Option<&str>,
    prompt_text: &str,
    path: &Path,
) -> Result<()> {
    let (transcript, settings) = prepare_transcript(cli, path, sys_prompt)?;
    repl::run_turn(
        client,
        &settings,
        &transcript,
        token,
        sys_prompt,
        prompt_text,
        RenderStyle::Conversation,
    )
    .await
}

async fn prompt_turn_stateless(
    client: &Client,
    cli: &Cli,
    token: &str,
    sys_prompt: Option<&str>,
    prompt_text: &str,
) -> Result<()> {
    let settings = resolve_settings(cli, None)?;
    let history = [Message::user(prompt_text)];
    let messages = payload::assemble(&settings, sys_prompt.unwrap_or(""), &history);
    let request = payload::build(&settings, &messages);

    let mut stdout = io::stdout();
    let outcome = api::send_turn(
        client,
        &settings,
        token,
        &request,
        RenderStyle::Quiet,
        &mut stdout,
    )
    .await?;
    match outcome.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn interactive(
    client: &Client,
    cli: &Cli,
    token: &str,
    sys_prompt: Option<&str>,
) -> Result<()> {
    let path = match cli.conversation_file.as_deref() {
        Some(raw) => expand_tilde(raw),
        None => {
            let path = default_conversation_path();
            output::status(&format!("Creating conversation file: {}", path.display()));
            path
        }
    };

    let (transcript, mut settings) = prepare_transcript(cli, &path, sys_prompt)?;
    refuse_when_at_limit(&transcript, &settings)?;

    repl::run_shell(client, &mut settings, &transcript, token, sys_prompt).await
}

fn refuse_when_at_limit(transcript: &Transcript, settings: &Settings) -> Result<()> {
    let count = transcript.message_count()?;
    if count >= settings.history_limit {
        return Err(anyhow!(
            "Conversation message limit reached.\n\
             File: {}\n\
             Messages in file: {}\n\
             Configured limit: {}\n\n\
             Messages are never removed or rotated automatically.\n\
             Options:\n  \
             - Increase the limit with -L and re-run\n  \
             - Use a different conversation file\n  \
             - Manually edit the file to remove old messages",
            transcript.path().display(),
            count,
            settings.history_limit
        ));
    }
    Ok(())
}

fn read_system_prompt(path: &str) -> Result<String> {
    let content =
        fs::read_to_string(path).map_err(|_| anyhow!("System prompt file not found: {path}"))?;
    Ok(content.trim().to_string())
}

// Accepts literal prompt text, a path to a file holding the prompt, or `-`
// to read the prompt from stdin.
fn read_prompt_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read the prompt from stdin")?;
        return Ok(text);
    }
    let path = Path::new(arg);
    if path.is_file() {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file '{arg}'"));
    }
    Ok(arg.to_string())
}

fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn default_conversation_path() -> PathBuf {
    let cache_dir = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from(".cache"));
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    cache_dir
        .join("nvchat")
        .join(format!("conversation-{stamp}.json"))
}
