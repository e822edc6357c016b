use std::io::Write;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use futures_util::StreamExt;
use regex::Regex;
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;

// Wrapped around reasoning output, on screen and in the stored message.
pub const REASONING_OPEN: &str = "[Begin of Assistant Reasoning]";
pub const REASONING_CLOSE: &str = "[/End of Assistant Reasoning]";

// The same shape covers streaming chunks (delta) and full responses
// (message).
#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Segment>,
    #[serde(default)]
    message: Option<Segment>,
}

#[derive(Debug, Default, Deserialize)]
struct Segment {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    // Content plus reasoning wrapped in colored sentinels.
    Conversation,
    // Content only; reasoning is neither shown nor accumulated.
    Quiet,
}

// A mid-stream failure is reported alongside the accumulated text so the
// caller can keep the partial reply.
#[derive(Debug)]
pub struct StreamOutcome {
    pub text: String,
    pub error: Option<anyhow::Error>,
}

struct TurnRenderer<'a> {
    style: RenderStyle,
    out: &'a mut (dyn Write + Send),
    text: String,
    in_reasoning: bool,
}

impl<'a> TurnRenderer<'a> {
    fn new(style: RenderStyle, out: &'a mut (dyn Write + Send)) -> Self {
        Self {
            style,
            out,
            text: String::new(),
            in_reasoning: false,
        }
    }

    fn push_segment(&mut self, segment: &Segment) -> Result<()> {
        if let Some(reasoning) = segment.reasoning_content.as_deref()
            && !reasoning.is_empty()
            && self.style == RenderStyle::Conversation
        {
            if !self.in_reasoning {
                // Shown with a leading blank line; stored without it.
                write!(self.out, "{}", format!("\n{REASONING_OPEN}\n").green())
                    .context("Failed to write assistant output")?;
                self.text.push_str(REASONING_OPEN);
                self.text.push('\n');
                self.in_reasoning = true;
            }
            write!(self.out, "{}", reasoning.green())
                .context("Failed to write assistant output")?;
            self.text.push_str(reasoning);
        }
        if let Some(content) = segment.content.as_deref()
            && !content.is_empty()
        {
            self.close_reasoning("\n\n")?;
            write!(self.out, "{content}").context("Failed to write assistant output")?;
            self.text.push_str(content);
        }
        self.out.flush().context("Failed to flush assistant output")?;
        Ok(())
    }

    fn close_reasoning(&mut self, trailer: &str) -> Result<()> {
        if !self.in_reasoning {
            return Ok(());
        }
        write!(
            self.out,
            "{}",
            format!("\n{REASONING_CLOSE}{trailer}").green()
        )
        .context("Failed to write assistant output")?;
        self.text.push('\n');
        self.text.push_str(REASONING_CLOSE);
        self.text.push_str(trailer);
        self.in_reasoning = false;
        Ok(())
    }

    // Closes a reasoning block the stream never terminated.
    fn finish(&mut self) -> Result<()> {
        self.close_reasoning("\n\n")?;
        self.out.flush().context("Failed to flush assistant output")?;
        Ok(())
    }

    fn into_text(self) -> String {
        self.text
    }
}

pub async fn consume(
    response: Response,
    style: RenderStyle,
    out: &mut (dyn Write + Send),
) -> StreamOutcome {
    let mut renderer = TurnRenderer::new(style, out);
    let mut error = drive(&mut renderer, response).await.err();
    if let Err(finish_err) = renderer.finish() {
        error = error.or(Some(finish_err));
    }
    if error.is_none()
        && let Err(newline_err) = writeln!(renderer.out)
    {
        error = Some(anyhow!(newline_err).context("Failed to write assistant output"));
    }
    StreamOutcome {
        text: renderer.into_text(),
        error,
    }
}

async fn drive(renderer: &mut TurnRenderer<'_>, response: Response) -> Result<()> {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.context("Stream interrupted while reading the response")?;
        buffer.extend_from_slice(&bytes);
        for line in drain_lines(&mut buffer) {
            handle_line(renderer, &line)?;
        }
    }
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).to_string();
        handle_line(renderer, &line)?;
    }
    Ok(())
}

// Splitting on the raw newline byte is safe for UTF-8 since 0x0A never
// appears inside a multi-byte sequence; partial trailing bytes stay
// buffered.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|byte| *byte == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).to_string());
    }
    lines
}

fn handle_line(renderer: &mut TurnRenderer<'_>, line: &str) -> Result<()> {
    let line = line.trim();
    // The `data: ` prefix is optional; some endpoints send bare JSON lines.
    let data = line.strip_prefix("data: ").unwrap_or(line);
    if data.is_empty() || data == "[DONE]" {
        return Ok(());
    }
    let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) else {
        debug!(line_len = data.len(), "skipping unparsable stream line");
        return Ok(());
    };
    for choice in &chunk.choices {
        if let Some(segment) = choice.delta.as_ref().or(choice.message.as_ref()) {
            renderer.push_segment(segment)?;
        }
    }
    Ok(())
}

// When nothing assistant-shaped parses out, the raw body is shown and an
// error returned.
pub async fn decode_single(
    response: Response,
    style: RenderStyle,
    out: &mut (dyn Write + Send),
) -> Result<String> {
    let raw = response
        .text()
        .await
        .context("Failed to read the response body")?;
    let parsed: ChatChunk = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "response body did not parse as a chat completion");
            ChatChunk::default()
        }
    };
    let mut renderer = TurnRenderer::new(style, out);
    for choice in &parsed.choices {
        renderer.push_segment(&merged_segment(choice))?;
    }
    renderer.finish()?;
    let text = renderer.into_text();
    if text.trim().is_empty() {
        writeln!(out, "{raw}").context("Failed to write assistant output")?;
        return Err(anyhow!("no assistant content parsed from response"));
    }
    Ok(text)
}

// delta wins per field; message fills whichever fields it left empty.
fn merged_segment(choice: &ChunkChoice) -> Segment {
    let from = |pick: fn(&Segment) -> Option<String>| {
        choice
            .delta
            .as_ref()
            .and_then(pick)
            .or_else(|| choice.message.as_ref().and_then(pick))
    };
    Segment {
        content: from(|segment| segment.content.clone()),
        reasoning_content: from(|segment| segment.reasoning_content.clone()),
    }
}

// Removes whole reasoning blocks along with the blank line that follows
// them.
pub fn strip_reasoning_blocks(text: &str) -> String {
    static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(&format!(
            r"(?s){}.*?{}\s*\n?",
            regex::escape(REASONING_OPEN),
            regex::escape(REASONING_CLOSE)
        ))
        .expect("reasoning block pattern compiles")
    });
    BLOCK.replace_all(text, "").to_string()
}
