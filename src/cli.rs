use clap::Parser;

use crate::registry::ParamValue;

#[derive(Parser, Debug, Default)]
#[command(
    name = "nvchat",
    version,
    about = "Chat with NVIDIA-hosted models from the terminal",
    after_help = "Inside the interactive shell, end each message with Ctrl+D and type /help for commands."
)]
pub struct Cli {
    /// Conversation file to create or continue. Without one, a timestamped
    /// file is created under the cache directory.
    pub conversation_file: Option<String>,

    /// Model identifier. Unlisted models get a generic parameter schema.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arg(short = 'T', long)]
    pub temperature: Option<f64>,

    /// Top-p sampling.
    #[arg(short = 'P', long)]
    pub top_p: Option<f64>,

    /// Frequency penalty.
    #[arg(short = 'f', long)]
    pub frequency_penalty: Option<f64>,

    /// Presence penalty.
    #[arg(short = 'r', long)]
    pub presence_penalty: Option<f64>,

    /// Maximum tokens to generate.
    #[arg(short = 'M', long)]
    pub max_tokens: Option<i64>,

    /// Reasoning effort (low, medium or high) for models that support it.
    #[arg(long, value_name = "EFFORT")]
    pub reasoning: Option<String>,

    /// Stop sequence. An empty string omits the field from requests.
    #[arg(long)]
    pub stop: Option<String>,

    /// Seed for reproducibility.
    #[arg(long)]
    pub seed: Option<i64>,

    /// Enable or disable thinking mode for models that support it.
    #[arg(long, value_name = "BOOL")]
    pub thinking: Option<bool>,

    /// Thinking token budget.
    #[arg(long)]
    pub thinking_budget: Option<i64>,

    /// Minimum thinking tokens.
    #[arg(long)]
    pub min_thinking_tokens: Option<i64>,

    /// Maximum thinking tokens.
    #[arg(long)]
    pub max_thinking_tokens: Option<i64>,

    /// Stream the response (true or false).
    #[arg(long, value_name = "BOOL", conflicts_with = "no_stream")]
    pub stream: Option<bool>,

    /// Disable streaming. Shorthand for --stream false.
    #[arg(long)]
    pub no_stream: bool,

    /// Maximum number of messages kept in the conversation file.
    #[arg(short = 'L', long)]
    pub limit: Option<usize>,

    /// Read the system prompt from a file.
    #[arg(short = 's', long, value_name = "PATH")]
    pub sys_prompt_file: Option<String>,

    /// Persist the system prompt from -s into the conversation file.
    #[arg(short = 'S', requires = "sys_prompt_file")]
    pub persist_system: bool,

    /// Persist the effective settings into the conversation file.
    #[arg(long)]
    pub save_settings: bool,

    /// API access token. Overrides the token environment variables.
    #[arg(short = 'k', long, value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// One-shot prompt: literal text, a file path, or - for stdin.
    #[arg(long, value_name = "TEXT|PATH|-")]
    pub prompt: Option<String>,

    /// List supported models and exit.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Show the parameter schema for a model and exit.
    #[arg(long, value_name = "MODEL")]
    pub modelinfo: Option<String>,
}

impl Cli {
    pub fn param_overrides(&self) -> Vec<(&'static str, ParamValue)> {
        let mut overrides = Vec::new();
        if let Some(value) = self.temperature {
            overrides.push(("temperature", ParamValue::Float(value)));
        }
        if let Some(value) = self.top_p {
            overrides.push(("top_p", ParamValue::Float(value)));
        }
        if let Some(value) = self.frequency_penalty {
            overrides.push(("frequency_penalty", ParamValue::Float(value)));
        }
        if let Some(value) = self.presence_penalty {
            overrides.push(("presence_penalty", ParamValue::Float(value)));
        }
        if let Some(value) = self.max_tokens {
            overrides.push(("max_tokens", ParamValue::Int(value)));
        }
        if let Some(value) = &self.reasoning {
            overrides.push(("reasoning_effort", ParamValue::Text(value.clone())));
        }
        if let Some(value) = &self.stop {
            overrides.push(("stop", ParamValue::Text(value.clone())));
        }
        if let Some(value) = self.seed {
            overrides.push(("seed", ParamValue::Int(value)));
        }
        if let Some(value) = self.thinking {
            overrides.push(("thinking", ParamValue::Flag(value)));
        }
        if let Some(value) = self.thinking_budget {
            overrides.push(("thinking_budget", ParamValue::Int(value)));
        }
        if let Some(value) = self.min_thinking_tokens {
            overrides.push(("min_thinking_tokens", ParamValue::Int(value)));
        }
        if let Some(value) = self.max_thinking_tokens {
            overrides.push(("max_thinking_tokens", ParamValue::Int(value)));
        }
        overrides
    }

    pub fn stream_override(&self) -> Option<bool> {
        if self.no_stream { Some(false) } else { self.stream }
    }
}
