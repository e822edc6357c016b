use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rand::seq::SliceRandom;
use reqwest::Client;

use crate::api;
use crate::api::stream::RenderStyle;
use crate::config::Settings;
use crate::model::Message;
use crate::output;
use crate::payload;
use crate::registry;
use crate::transcript::Transcript;

#[derive(Debug, PartialEq, Eq)]
enum CommandOutcome {
    Continue,
    Exit,
}

// Messages span multiple lines and finish with Ctrl+D; lines starting with
// `/` run immediately as commands. EOF on an empty prompt ends the session.
pub async fn run_shell(
    client: &Client,
    settings: &mut Settings,
    transcript: &Transcript,
    token: &str,
    sys_prompt: Option<&str>,
) -> Result<()> {
    output::banner(settings, transcript.path());

    loop {
        output::prompt_you();
        let Some(first_line) = read_line(&mut io::stdin().lock())? else {
            output::status("");
            break;
        };

        let trimmed = first_line.trim();
        if trimmed.starts_with('/') {
            match handle_command(trimmed, settings, transcript) {
                Ok(CommandOutcome::Exit) => break,
                Ok(CommandOutcome::Continue) => {}
                Err(err) => output::error(&format!("Error: {err:#}")),
            }
            continue;
        }

        let block = read_until_eof(&mut io::stdin().lock(), first_line)?;
        let message = block.trim();
        if message.is_empty() {
            continue;
        }

        output::assistant_header();
        if let Err(err) = run_turn(
            client,
            settings,
            transcript,
            token,
            sys_prompt,
            message,
            RenderStyle::Conversation,
        )
        .await
        {
            output::error(&format!("Error: {err:#}"));
        }
    }

    Ok(())
}

// The appended user message stays even when the turn is refused over the
// history limit, and partial assistant text is still appended when the
// stream dies partway.
pub async fn run_turn(
    client: &Client,
    settings: &Settings,
    transcript: &Transcript,
    token: &str,
    sys_prompt: Option<&str>,
    user_input: &str,
    style: RenderStyle,
) -> Result<()> {
    let count = transcript.append_message(Message::user(user_input))?;
    if count > settings.history_limit {
        return Err(anyhow!(
            "after adding your message, the conversation file exceeded the limit ({}); \
             raise it with -L or /history_limit, or start a new file",
            settings.history_limit
        ));
    }

    let conversation = transcript.load()?;
    let system = sys_prompt
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(conversation.system.as_str());
    let messages = payload::assemble(settings, system, &conversation.messages);
    let request = payload::build(settings, &messages);

    let mut stdout = io::stdout();
    let outcome = api::send_turn(client, settings, token, &request, style, &mut stdout).await?;
    if !outcome.text.trim().is_empty() {
        transcript.append_message(Message::assistant(outcome.text.clone()))?;
    }
    match outcome.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn read_line(stdin: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let read = stdin.read_line(&mut line).context("Failed to read stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn read_until_eof(stdin: &mut impl BufRead, first_line: String) -> Result<String> {
    let mut block = first_line;
    loop {
        let mut line = String::new();
        let read = stdin.read_line(&mut line).context("Failed to read stdin")?;
        if read == 0 {
            break;
        }
        block.push_str(&line);
    }
    Ok(block)
}

fn split_command(line: &str) -> (&str, &str) {
    let body = line.strip_prefix('/').unwrap_or(line);
    match body.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (body, ""),
    }
}

fn handle_command(
    line: &str,
    settings: &mut Settings,
    transcript: &Transcript,
) -> Result<CommandOutcome> {
    let (name, args) = split_command(line);
    match name {
        "help" => output::status(&render_help()),
        "exit" | "quit" => return Ok(CommandOutcome::Exit),
        "history" => output::status(&transcript.raw_contents()?),
        "clear" => {
            transcript.clear_messages()?;
            output::success("Conversation messages cleared.");
        }
        "save" => {
            if args.is_empty() {
                return Err(anyhow!("usage: /save <file>"));
            }
            transcript.copy_to(Path::new(args))?;
            output::success(&format!("Conversation copied to {args}"));
        }
        "model" => {
            if args.is_empty() {
                return Err(anyhow!("usage: /model <name>"));
            }
            switch_to(args, settings, transcript)?;
        }
        "randomodel" => {
            let pick = registry::MODEL_IDS
                .choose(&mut rand::thread_rng())
                .copied()
                .ok_or_else(|| anyhow!("no models to pick from"))?;
            switch_to(pick, settings, transcript)?;
        }
        "modelinfo" => {
            if args.is_empty() {
                return Err(anyhow!("usage: /modelinfo <name>"));
            }
            output::status(&registry::render_model_info(args)?);
        }
        "persist-settings" => {
            transcript.persist_settings(settings)?;
            output::success("Settings persisted to the conversation file.");
        }
        "persist-system" => {
            if args.is_empty() {
                return Err(anyhow!("usage: /persist-system <file>"));
            }
            let prompt = fs::read_to_string(args)
                .map_err(|_| anyhow!("System prompt file not found: {args}"))?;
            transcript.set_system(prompt.trim())?;
            output::success("System prompt persisted to the conversation file.");
        }
        "exportlast" => {
            let (strip, rest) = parse_export_args(args);
            let [file] = rest.as_slice() else {
                return Err(anyhow!("usage: /exportlast [-t] <file>"));
            };
            write_export(file, &transcript.export_nth_last(1, strip)?)?;
        }
        "exportlastn" => {
            let (strip, rest) = parse_export_args(args);
            let [count, file] = rest.as_slice() else {
                return Err(anyhow!("usage: /exportlastn [-t] <count> <file>"));
            };
            let count: usize = count
                .parse()
                .map_err(|_| anyhow!("invalid count: {count}"))?;
            write_export(file, &transcript.export_last_n(count, strip)?)?;
        }
        "exportn" => {
            let (strip, rest) = parse_export_args(args);
            let [index, file] = rest.as_slice() else {
                return Err(anyhow!("usage: /exportn [-t] <index> <file>"));
            };
            let index: usize = index
                .parse()
                .map_err(|_| anyhow!("invalid index: {index}"))?;
            write_export(file, &transcript.export_nth_last(index, strip)?)?;
        }
        _ => return handle_setting_command(name, args, settings),
    }
    Ok(CommandOutcome::Continue)
}

// Fallthrough for /<setting> <value> and /<setting> unset.
fn handle_setting_command(
    name: &str,
    args: &str,
    settings: &mut Settings,
) -> Result<CommandOutcome> {
    let known = name == "stream"
        || name == "history_limit"
        || registry::param_union().contains_key(name);
    if !known {
        return Err(anyhow!("unknown command: /{name} (see /help)"));
    }
    if args.is_empty() {
        return Err(anyhow!("usage: /{name} <value> (or '/{name} unset')"));
    }
    if args == "unset" {
        settings.unset_param(name)?;
        output::success(&format!("{name} reset to its default"));
    } else {
        settings.set_param(name, args)?;
        output::success(&format!("{name} set to {args}"));
    }
    Ok(CommandOutcome::Continue)
}

fn switch_to(model: &str, settings: &mut Settings, transcript: &Transcript) -> Result<()> {
    if !registry::is_known(model) {
        return Err(anyhow!(
            "unknown model: {model} (use -l to list the supported models)"
        ));
    }
    let conversation = transcript.load()?;
    let mut next = settings.clone();
    let dropped = next.switch_model(model, Some(&conversation.settings));
    next.validate()?;
    *settings = next;
    if !dropped.is_empty() {
        output::status(&format!(
            "Dropped overrides the new model does not accept: {}",
            dropped.join(", ")
        ));
    }
    output::success(&format!("Model set to {model}"));
    Ok(())
}

fn parse_export_args(args: &str) -> (bool, Vec<&str>) {
    let mut tokens: Vec<&str> = args.split_whitespace().collect();
    let strip = tokens.first() == Some(&"-t");
    if strip {
        tokens.remove(0);
    }
    (strip, tokens)
}

fn write_export(file: &str, content: &str) -> Result<()> {
    fs::write(file, content).with_context(|| format!("Failed to write {file}"))?;
    output::success(&format!("Exported to {file}"));
    Ok(())
}

fn render_help() -> String {
    let mut out = String::new();
    out.push_str("Commands:\n");
    for (command, description) in [
        ("/help", "Show this help."),
        ("/exit, /quit", "Leave the shell."),
        ("/history", "Print the conversation file as stored on disk."),
        ("/clear", "Delete all conversation messages."),
        ("/save <file>", "Copy the conversation file to another path."),
        ("/model <name>", "Switch models for this session."),
        ("/randomodel", "Switch to a random supported model."),
        ("/modelinfo <name>", "Show a model's parameter schema."),
        (
            "/persist-settings",
            "Write the effective settings into the conversation file.",
        ),
        (
            "/persist-system <file>",
            "Store a system prompt from a file.",
        ),
        ("/exportlast [-t] <file>", "Export the last assistant reply."),
        (
            "/exportlastn [-t] <n> <file>",
            "Export the last n assistant replies.",
        ),
        (
            "/exportn [-t] <n> <file>",
            "Export the nth most recent assistant reply.",
        ),
    ] {
        out.push_str(&format!("  {command:<30} {description}\n"));
    }
    out.push_str("\nSettings (set with /<name> <value>, revert with /<name> unset):\n");
    out.push_str(&format!(
        "  {:<22} {}\n",
        "stream", "Stream responses (true or false)."
    ));
    out.push_str(&format!(
        "  {:<22} {}\n",
        "history_limit", "Maximum messages kept in the conversation file."
    ));
    for (name, param) in registry::param_union() {
        out.push_str(&format!("  {name:<22} {}\n", param.description));
    }
    out.push_str(
        "\n-t on exports strips reasoning blocks. Ranges and defaults vary per model; \
         see /modelinfo <name>.\n",
    );
    out
}
