use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use colored::Colorize;
use serde_json::{Value, json};

pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
pub const CATALOG_URL: &str = "https://build.nvidia.com/";

pub const MODEL_IDS: [&str; 17] = [
    "openai/gpt-oss-120b",
    "bytedance/seed-oss-36b-instruct",
    "qwen/qwen3-coder-480b-a35b-instruct",
    "nvidia/nvidia-nemotron-nano-9b-v2",
    "nvidia/llama-3.3-nemotron-super-49b-v1.5",
    "mistralai/mistral-nemotron",
    "mistralai/mistral-small-24b-instruct",
    "deepseek-ai/deepseek-v3.1",
    "deepseek-ai/deepseek-r1-distill-qwen-32b",
    "deepseek-ai/deepseek-r1-distill-llama-8b",
    "deepseek-ai/deepseek-r1-0528",
    "qwen/qwen3-next-80b-a3b-instruct",
    "qwen/qwen3-next-80b-a3b-thinking",
    "moonshotai/kimi-k2-instruct-0905",
    "google/codegemma-7b",
    "google/gemma-7b",
    "mistralai/mixtral-8x22b-instruct-v0.1",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
    Text,
    TextList,
    Flag,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Float => "float",
            ParamKind::Int => "int",
            ParamKind::Text => "text",
            ParamKind::TextList => "text list",
            ParamKind::Flag => "flag",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Text(String),
    Flag(bool),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Text(_) => ParamKind::Text,
            ParamValue::Flag(_) => ParamKind::Flag,
        }
    }

    // Text-list parameters are entered as a single string, not split.
    pub fn parse(kind: ParamKind, raw: &str) -> Option<ParamValue> {
        match kind {
            ParamKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ParamValue::Float),
            ParamKind::Int => raw.parse::<i64>().ok().map(ParamValue::Int),
            ParamKind::Text | ParamKind::TextList => Some(ParamValue::Text(raw.to_string())),
            ParamKind::Flag => match raw {
                "true" => Some(ParamValue::Flag(true)),
                "false" => Some(ParamValue::Flag(false)),
                _ => None,
            },
        }
    }

    // Numbers coerce loosely: an integer parameter accepts 4096.0, a float
    // parameter accepts 1.
    pub fn from_json(kind: ParamKind, value: &Value) -> Option<ParamValue> {
        match kind {
            ParamKind::Float => value.as_f64().filter(|v| v.is_finite()).map(ParamValue::Float),
            ParamKind::Int => value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f as i64))
                .map(ParamValue::Int),
            ParamKind::Text | ParamKind::TextList => {
                value.as_str().map(|s| ParamValue::Text(s.to_string()))
            }
            ParamKind::Flag => value.as_bool().map(ParamValue::Flag),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Float(v) => json!(v),
            ParamValue::Int(v) => json!(v),
            ParamValue::Text(v) => json!(v),
            ParamValue::Flag(v) => json!(v),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
            ParamValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub default: Option<ParamValue>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub options: &'static [&'static str],
    pub description: &'static str,
}

impl ParamSpec {
    pub fn range_label(&self) -> Option<String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(format!("{min}..{max}")),
            (Some(min), None) => Some(format!(">= {min}")),
            (None, Some(max)) => Some(format!("<= {max}")),
            (None, None) => None,
        }
    }

    pub fn validate(&self, name: &str, value: &ParamValue) -> Result<()> {
        if value.kind() != self.kind
            && !(self.kind == ParamKind::TextList && value.kind() == ParamKind::Text)
        {
            return Err(anyhow!(
                "{name} expects a {} value, got {}",
                self.kind.as_str(),
                value.kind().as_str()
            ));
        }
        let numeric = match value {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        };
        if let Some(v) = numeric {
            if let Some(min) = self.min
                && v < min
            {
                return Err(anyhow!(
                    "{name} out of range ({}): {value}",
                    self.range_label().unwrap_or_default()
                ));
            }
            if let Some(max) = self.max
                && v > max
            {
                return Err(anyhow!(
                    "{name} out of range ({}): {value}",
                    self.range_label().unwrap_or_default()
                ));
            }
        }
        if self.kind == ParamKind::Text && !self.options.is_empty() {
            let text = value.to_string();
            if !self.options.contains(&text.as_str()) {
                return Err(anyhow!(
                    "invalid {name}: must be one of {}",
                    self.options.join(", ")
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    // System message prepended when the thinking flag is on.
    pub thinking_system_message: Option<&'static str>,
    // Prepended when thinking is off; only some models take an explicit
    // disable marker.
    pub thinking_disable_message: Option<&'static str>,
    // Thinking toggles through chat_template_kwargs, not a system message.
    pub thinking_via_template_kwargs: bool,
    // seed is always serialized for this model; unset becomes JSON null.
    pub seed_nullable: bool,
    pub params: BTreeMap<&'static str, ParamSpec>,
}

pub struct Registry {
    models: BTreeMap<&'static str, ModelSpec>,
    generic: ModelSpec,
}

const DESC_TEMPERATURE: &str = "Sampling temperature.";
const DESC_TOP_P: &str = "Top-p sampling.";
const DESC_FREQUENCY_PENALTY: &str = "Frequency penalty.";
const DESC_PRESENCE_PENALTY: &str = "Presence penalty.";
const DESC_MAX_TOKENS: &str = "Maximum tokens to generate.";
const DESC_STOP: &str = "Stop sequences.";
const DESC_SEED: &str = "Seed for reproducibility. Default 0 means not included.";

fn float(default: f64, min: f64, max: f64, description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Float,
        default: Some(ParamValue::Float(default)),
        min: Some(min),
        max: Some(max),
        options: &[],
        description,
    }
}

fn int(default: i64, min: f64, max: Option<f64>, description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Int,
        default: Some(ParamValue::Int(default)),
        min: Some(min),
        max,
        options: &[],
        description,
    }
}

fn int_unbounded(default: i64, description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Int,
        default: Some(ParamValue::Int(default)),
        min: None,
        max: None,
        options: &[],
        description,
    }
}

fn int_unset(description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Int,
        default: None,
        min: None,
        max: None,
        options: &[],
        description,
    }
}

fn text_list(description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::TextList,
        default: Some(ParamValue::Text(String::new())),
        min: None,
        max: None,
        options: &[],
        description,
    }
}

fn choice(
    default: &'static str,
    options: &'static [&'static str],
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Text,
        default: Some(ParamValue::Text(default.to_string())),
        min: None,
        max: None,
        options,
        description,
    }
}

fn flag(default: bool, description: &'static str) -> ParamSpec {
    ParamSpec {
        kind: ParamKind::Flag,
        default: Some(ParamValue::Flag(default)),
        min: None,
        max: None,
        options: &[],
        description,
    }
}

fn params(entries: Vec<(&'static str, ParamSpec)>) -> BTreeMap<&'static str, ParamSpec> {
    entries.into_iter().collect()
}

fn build_registry() -> Registry {
    let mut models = BTreeMap::new();

    models.insert(
        "openai/gpt-oss-120b",
        ModelSpec {
            params: params(vec![
                (
                    "temperature",
                    float(
                        1.0,
                        0.0,
                        1.0,
                        "Sampling temperature. Higher values produce more varied output; \
                         lower values stay closer to the most likely tokens.",
                    ),
                ),
                (
                    "top_p",
                    float(
                        1.0,
                        0.01,
                        1.0,
                        "Nucleus sampling mass. Only tokens within the top_p probability \
                         mass are considered.",
                    ),
                ),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("max_tokens", int(4096, 1.0, Some(4096.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
                (
                    "reasoning_effort",
                    choice(
                        "medium",
                        &["low", "medium", "high"],
                        "How much effort the model spends reasoning before answering.",
                    ),
                ),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "bytedance/seed-oss-36b-instruct",
        ModelSpec {
            params: params(vec![
                ("temperature", float(1.1, 0.0, 2.0, DESC_TEMPERATURE)),
                ("top_p", float(0.95, 0.01, 1.0, DESC_TOP_P)),
                ("max_tokens", int(4096, 1.0, None, DESC_MAX_TOKENS)),
                (
                    "thinking_budget",
                    int(
                        -1,
                        -1.0,
                        Some(16384.0),
                        "Token budget for thinking. -1 means unlimited; positive values \
                         are rounded to multiples of 512 and must be less than max_tokens.",
                    ),
                ),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("stop", text_list(DESC_STOP)),
                ("seed", int_unbounded(0, DESC_SEED)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "qwen/qwen3-coder-480b-a35b-instruct",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.7, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.8, 0.01, 1.0, DESC_TOP_P)),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("max_tokens", int(4096, 1.0, Some(16384.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "nvidia/nvidia-nemotron-nano-9b-v2",
        ModelSpec {
            thinking_system_message: Some("/think"),
            params: params(vec![
                ("temperature", float(0.6, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.95, 0.01, 1.0, DESC_TOP_P)),
                ("max_tokens", int(2048, 1.0, Some(8192.0), DESC_MAX_TOKENS)),
                (
                    "min_thinking_tokens",
                    int(
                        1024,
                        1.0,
                        Some(4096.0),
                        "Minimum thinking tokens. Ignored when '/no_think' is in the \
                         system message.",
                    ),
                ),
                (
                    "max_thinking_tokens",
                    int(2048, 1.0, Some(4096.0), "Maximum thinking tokens."),
                ),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("stop", text_list(DESC_STOP)),
                ("seed", int_unbounded(0, DESC_SEED)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "nvidia/llama-3.3-nemotron-super-49b-v1.5",
        ModelSpec {
            thinking_system_message: Some("/think"),
            thinking_disable_message: Some("/no_think"),
            params: params(vec![
                ("temperature", float(0.6, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.95, 0.01, 1.0, DESC_TOP_P)),
                ("max_tokens", int(65536, 1.0, None, DESC_MAX_TOKENS)),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("stop", text_list(DESC_STOP)),
                ("seed", int_unbounded(0, DESC_SEED)),
                (
                    "thinking",
                    flag(
                        false,
                        "Enable thinking mode. Prepends a system message to \
                         enable/disable thinking.",
                    ),
                ),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "mistralai/mistral-nemotron",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.6, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.7, 0.01, 1.0, DESC_TOP_P)),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("max_tokens", int(4096, 1.0, Some(4096.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "mistralai/mistral-small-24b-instruct",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.2, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.7, 0.01, 1.0, DESC_TOP_P)),
                ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                ("max_tokens", int(1024, 1.0, Some(8192.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "deepseek-ai/deepseek-v3.1",
        ModelSpec {
            thinking_via_template_kwargs: true,
            seed_nullable: true,
            params: params(vec![
                ("temperature", float(0.2, 0.01, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.7, 0.01, 1.0, DESC_TOP_P)),
                ("max_tokens", int(8192, 1.0, Some(16384.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
                (
                    "seed",
                    int_unset("Seed for reproducibility. Sent as null when unset."),
                ),
                (
                    "thinking",
                    flag(true, "Enable thinking mode via chat_template_kwargs."),
                ),
            ]),
            ..ModelSpec::default()
        },
    );

    for id in [
        "deepseek-ai/deepseek-r1-distill-qwen-32b",
        "deepseek-ai/deepseek-r1-distill-llama-8b",
        "deepseek-ai/deepseek-r1-0528",
        "qwen/qwen3-next-80b-a3b-instruct",
        "qwen/qwen3-next-80b-a3b-thinking",
    ] {
        models.insert(
            id,
            ModelSpec {
                params: params(vec![
                    ("temperature", float(0.6, 0.0, 1.0, DESC_TEMPERATURE)),
                    ("top_p", float(0.7, 0.01, 1.0, DESC_TOP_P)),
                    ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
                    ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
                    ("max_tokens", int(4096, 1.0, Some(4096.0), DESC_MAX_TOKENS)),
                    ("stop", text_list(DESC_STOP)),
                ]),
                ..ModelSpec::default()
            },
        );
    }

    models.insert(
        "moonshotai/kimi-k2-instruct-0905",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.6, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(0.9, 0.01, 1.0, DESC_TOP_P)),
                ("max_tokens", int(4096, 1.0, Some(16384.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "google/codegemma-7b",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.5, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(1.0, 0.0, 1.0, DESC_TOP_P)),
                ("max_tokens", int(1024, 1.0, Some(1024.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
                ("seed", int_unbounded(0, DESC_SEED)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "google/gemma-7b",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.5, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(1.0, 0.0, 1.0, DESC_TOP_P)),
                ("max_tokens", int(1024, 1.0, Some(1024.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
            ]),
            ..ModelSpec::default()
        },
    );

    models.insert(
        "mistralai/mixtral-8x22b-instruct-v0.1",
        ModelSpec {
            params: params(vec![
                ("temperature", float(0.5, 0.0, 1.0, DESC_TEMPERATURE)),
                ("top_p", float(1.0, 0.0, 1.0, DESC_TOP_P)),
                ("max_tokens", int(1024, 1.0, Some(1024.0), DESC_MAX_TOKENS)),
                ("stop", text_list(DESC_STOP)),
                ("seed", int_unbounded(0, DESC_SEED)),
            ]),
            ..ModelSpec::default()
        },
    );

    let generic = ModelSpec {
        params: params(vec![
            ("temperature", float(0.5, 0.0, 1.0, DESC_TEMPERATURE)),
            ("top_p", float(1.0, 0.0, 1.0, DESC_TOP_P)),
            ("max_tokens", int(1024, 1.0, None, DESC_MAX_TOKENS)),
            ("frequency_penalty", float(0.0, -2.0, 2.0, DESC_FREQUENCY_PENALTY)),
            ("presence_penalty", float(0.0, -2.0, 2.0, DESC_PRESENCE_PENALTY)),
            ("stop", text_list(DESC_STOP)),
        ]),
        ..ModelSpec::default()
    };

    Registry { models, generic }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

pub fn spec_for(model: &str) -> &'static ModelSpec {
    let reg = registry();
    reg.models.get(model).unwrap_or(&reg.generic)
}

// Exact lookup; the generic schema is listed under the name "others".
pub fn find(model: &str) -> Option<&'static ModelSpec> {
    let reg = registry();
    if model == "others" {
        return Some(&reg.generic);
    }
    reg.models.get(model)
}

pub fn generic_spec() -> &'static ModelSpec {
    &registry().generic
}

pub fn is_known(model: &str) -> bool {
    registry().models.contains_key(model)
}

// Each name maps to the first schema entry that mentions it.
pub fn param_union() -> BTreeMap<&'static str, &'static ParamSpec> {
    let reg = registry();
    let mut union: BTreeMap<&'static str, &'static ParamSpec> = BTreeMap::new();
    for spec in reg.models.values().chain(std::iter::once(&reg.generic)) {
        for (name, param) in &spec.params {
            union.entry(name).or_insert(param);
        }
    }
    union
}

pub fn render_model_list() -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Supported models:".bold()));
    for id in MODEL_IDS {
        out.push_str(&format!("  {id}\n"));
    }
    out.push_str(&format!(
        "\nOther model names are accepted with a generic parameter schema.\n\
         Browse the full catalog at {CATALOG_URL}\n"
    ));
    out
}

pub fn render_model_info(model: &str) -> Result<String> {
    let spec = find(model)
        .ok_or_else(|| anyhow!("no model information for {model} (try one of the supported models or \"others\")"))?;
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Model:".bold(), model));
    out.push_str(&format!("{}\n", "Parameters:".bold()));
    for (name, param) in &spec.params {
        out.push_str(&format!("  {}\n", name.blue()));
        out.push_str(&format!("    Description: {}\n", param.description));
        out.push_str(&format!("    Type: {}\n", param.kind.as_str()));
        match &param.default {
            Some(ParamValue::Text(s)) => {
                out.push_str(&format!("    Default: {s:?}\n"));
            }
            Some(value) => out.push_str(&format!("    Default: {value}\n")),
            None => out.push_str("    Default: not set\n"),
        }
        if let Some(range) = param.range_label() {
            out.push_str(&format!("    Range: {range}\n"));
        }
        if !param.options.is_empty() {
            out.push_str(&format!("    Options: {}\n", param.options.join(", ")));
        }
    }
    let mut notes = Vec::new();
    if let Some(msg) = spec.thinking_system_message {
        match spec.thinking_disable_message {
            Some(off) => notes.push(format!(
                "thinking prepends a {msg:?} system message ({off:?} when disabled)"
            )),
            None => notes.push(format!("thinking prepends a {msg:?} system message")),
        }
    }
    if spec.thinking_via_template_kwargs {
        notes.push("thinking is toggled via chat_template_kwargs".to_string());
    }
    if spec.seed_nullable {
        notes.push("seed is always serialized; unset is sent as null".to_string());
    }
    if !notes.is_empty() {
        out.push_str(&format!("{}\n", "Special behavior:".bold()));
        for note in notes {
            out.push_str(&format!("  - {note}\n"));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_falls_back_to_generic_schema() {
        let spec = spec_for("someone/some-new-model");
        assert!(spec.params.contains_key("temperature"));
        assert!(!spec.params.contains_key("seed"));
        let max_tokens = &spec.params["max_tokens"];
        assert_eq!(max_tokens.min, Some(1.0));
        assert_eq!(max_tokens.max, None);
    }

    #[test]
    fn every_listed_model_has_a_schema() {
        for id in MODEL_IDS {
            assert!(is_known(id), "missing schema for {id}");
            assert!(!spec_for(id).params.is_empty());
        }
        assert!(!is_known("others"));
        assert!(find("others").is_some());
    }

    #[test]
    fn llama_nemotron_super_toggles_thinking_with_system_messages() {
        let spec = spec_for("nvidia/llama-3.3-nemotron-super-49b-v1.5");
        assert_eq!(spec.thinking_system_message, Some("/think"));
        assert_eq!(spec.thinking_disable_message, Some("/no_think"));
        assert_eq!(
            spec.params["thinking"].default,
            Some(ParamValue::Flag(false))
        );
        assert_eq!(spec.params["max_tokens"].max, None);
    }

    #[test]
    fn deepseek_v31_uses_template_kwargs_and_nullable_seed() {
        let spec = spec_for("deepseek-ai/deepseek-v3.1");
        assert!(spec.thinking_via_template_kwargs);
        assert!(spec.seed_nullable);
        assert_eq!(spec.params["seed"].default, None);
        assert_eq!(spec.params["thinking"].default, Some(ParamValue::Flag(true)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let spec = spec_for("openai/gpt-oss-120b");
        let err = spec.params["temperature"]
            .validate("temperature", &ParamValue::Float(1.5))
            .expect_err("1.5 should exceed the range");
        let msg = format!("{err}");
        assert!(msg.contains("temperature"), "got: {msg}");
        assert!(msg.contains("0..1"), "got: {msg}");
    }

    #[test]
    fn validate_accepts_large_values_when_no_upper_bound() {
        let spec = spec_for("nvidia/llama-3.3-nemotron-super-49b-v1.5");
        spec.params["max_tokens"]
            .validate("max_tokens", &ParamValue::Int(65536))
            .expect("65536 is within an open-ended range");
    }

    #[test]
    fn validate_checks_choice_options() {
        let spec = spec_for("openai/gpt-oss-120b");
        let param = &spec.params["reasoning_effort"];
        param
            .validate("reasoning_effort", &ParamValue::Text("high".into()))
            .expect("high is listed");
        let err = param
            .validate("reasoning_effort", &ParamValue::Text("max".into()))
            .expect_err("max is not listed");
        assert!(format!("{err}").contains("low, medium, high"));
    }

    #[test]
    fn parse_handles_each_kind() {
        assert_eq!(
            ParamValue::parse(ParamKind::Float, "0.25"),
            Some(ParamValue::Float(0.25))
        );
        assert_eq!(ParamValue::parse(ParamKind::Float, "NaN"), None);
        assert_eq!(
            ParamValue::parse(ParamKind::Int, "-1"),
            Some(ParamValue::Int(-1))
        );
        assert_eq!(ParamValue::parse(ParamKind::Int, "1.5"), None);
        assert_eq!(
            ParamValue::parse(ParamKind::Flag, "true"),
            Some(ParamValue::Flag(true))
        );
        assert_eq!(ParamValue::parse(ParamKind::Flag, "yes"), None);
        assert_eq!(
            ParamValue::parse(ParamKind::TextList, "STOP"),
            Some(ParamValue::Text("STOP".into()))
        );
    }

    #[test]
    fn from_json_coerces_numbers_per_kind() {
        assert_eq!(
            ParamValue::from_json(ParamKind::Float, &json!(1)),
            Some(ParamValue::Float(1.0))
        );
        assert_eq!(
            ParamValue::from_json(ParamKind::Int, &json!(4096.0)),
            Some(ParamValue::Int(4096))
        );
        assert_eq!(ParamValue::from_json(ParamKind::Int, &json!("4096")), None);
        assert_eq!(
            ParamValue::from_json(ParamKind::Flag, &json!(true)),
            Some(ParamValue::Flag(true))
        );
    }

    #[test]
    fn param_union_covers_model_specific_names() {
        let union = param_union();
        assert!(union.contains_key("thinking_budget"));
        assert!(union.contains_key("reasoning_effort"));
        assert!(union.contains_key("min_thinking_tokens"));
        assert!(union.contains_key("temperature"));
    }

    #[test]
    fn model_info_includes_ranges_and_special_behavior() {
        colored::control::set_override(false);
        let info = render_model_info("deepseek-ai/deepseek-v3.1").expect("known model");
        assert!(info.contains("chat_template_kwargs"));
        assert!(info.contains("sent as null"));
        let info = render_model_info("openai/gpt-oss-120b").expect("known model");
        assert!(info.contains("Options: low, medium, high"));
        assert!(info.contains("Range: 1..4096"));
        assert!(render_model_info("nope/nope").is_err());
    }
}
