use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::config::Settings;
use crate::model::Message;
use crate::registry::{self, ParamValue};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

// stop is omitted while empty. seed 0 means "not included", except for
// models where seed is always serialized; those send JSON null when it is
// unset. thinking never goes out as a direct field: it becomes
// chat_template_kwargs or a prepended system message.
pub fn build<'a>(settings: &'a Settings, messages: &'a [Message]) -> ChatRequest<'a> {
    let spec = registry::spec_for(&settings.model);
    let mut options = Map::new();
    for (name, value) in &settings.params {
        match name.as_str() {
            "stop" => {
                if let ParamValue::Text(text) = value
                    && !text.is_empty()
                {
                    options.insert(name.clone(), json!(text));
                }
            }
            "seed" if !spec.seed_nullable => {
                if let ParamValue::Int(seed) = value
                    && *seed != 0
                {
                    options.insert(name.clone(), json!(seed));
                }
            }
            "thinking" => {}
            _ => {
                options.insert(name.clone(), value.to_json());
            }
        }
    }
    if spec.seed_nullable && !settings.params.contains_key("seed") {
        options.insert("seed".to_string(), Value::Null);
    }
    if spec.thinking_via_template_kwargs {
        let enabled = matches!(settings.params.get("thinking"), Some(ParamValue::Flag(true)));
        options.insert(
            "chat_template_kwargs".to_string(),
            json!({ "thinking": enabled }),
        );
    }
    ChatRequest {
        model: &settings.model,
        messages,
        stream: settings.stream,
        options,
    }
}

// Order: thinking control marker, then the system prompt, then the stored
// history. Both prefixes are re-derived every turn and never written to
// the conversation file.
pub fn assemble(settings: &Settings, system: &str, history: &[Message]) -> Vec<Message> {
    let spec = registry::spec_for(&settings.model);
    let thinking = matches!(settings.params.get("thinking"), Some(ParamValue::Flag(true)));
    let mut messages = Vec::new();
    if let Some(marker) = spec.thinking_system_message {
        if thinking {
            messages.push(Message::system(marker));
        } else if let Some(marker) = spec.thinking_disable_message {
            messages.push(Message::system(marker));
        }
    }
    if !system.is_empty() {
        messages.push(Message::system(system));
    }
    messages.extend(history.iter().cloned());
    messages
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{assemble, build};
    use crate::config::Settings;
    use crate::model::{Message, MessageRole};

    fn settings_for(model: &str) -> Settings {
        Settings::resolve(model, "https://integrate.api.nvidia.com/v1".into(), None)
    }

    fn body_for(settings: &Settings, messages: &[Message]) -> Value {
        serde_json::to_value(build(settings, messages)).expect("serialize request")
    }

    #[test]
    fn defaults_project_into_top_level_fields() {
        let settings = settings_for("openai/gpt-oss-120b");
        let history = [Message::user("hi")];
        let body = body_for(&settings, &history);

        assert_eq!(body["model"], json!("openai/gpt-oss-120b"));
        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["messages"][0]["content"], json!("hi"));
        assert_eq!(body["temperature"], json!(1.0));
        assert_eq!(body["top_p"], json!(1.0));
        assert_eq!(body["frequency_penalty"], json!(0.0));
        assert_eq!(body["presence_penalty"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(4096));
        assert_eq!(body["reasoning_effort"], json!("medium"));
    }

    #[test]
    fn empty_stop_is_omitted_and_nonempty_included() {
        let mut settings = settings_for("openai/gpt-oss-120b");
        let body = body_for(&settings, &[]);
        assert!(body.get("stop").is_none());

        settings.set_param("stop", "END").expect("stop accepts text");
        let body = body_for(&settings, &[]);
        assert_eq!(body["stop"], json!("END"));
    }

    #[test]
    fn zero_seed_is_omitted_for_most_models() {
        let mut settings = settings_for("mistralai/mixtral-8x22b-instruct-v0.1");
        let body = body_for(&settings, &[]);
        assert!(body.get("seed").is_none(), "default seed 0 must not be sent");

        settings.set_param("seed", "7").expect("seed accepts ints");
        let body = body_for(&settings, &[]);
        assert_eq!(body["seed"], json!(7));
    }

    #[test]
    fn deepseek_seed_is_always_serialized() {
        let mut settings = settings_for("deepseek-ai/deepseek-v3.1");
        let body = body_for(&settings, &[]);
        assert_eq!(body["seed"], Value::Null, "unset seed is sent as null");

        settings.set_param("seed", "0").expect("seed accepts ints");
        let body = body_for(&settings, &[]);
        assert_eq!(body["seed"], json!(0), "an explicit 0 is sent as 0");
    }

    #[test]
    fn deepseek_thinking_goes_through_template_kwargs() {
        let mut settings = settings_for("deepseek-ai/deepseek-v3.1");
        let body = body_for(&settings, &[]);
        assert_eq!(body["chat_template_kwargs"], json!({ "thinking": true }));
        assert!(body.get("thinking").is_none());

        settings.set_param("thinking", "false").expect("flag");
        let body = body_for(&settings, &[]);
        assert_eq!(body["chat_template_kwargs"], json!({ "thinking": false }));
    }

    #[test]
    fn llama_nemotron_thinking_becomes_a_system_marker() {
        let mut settings = settings_for("nvidia/llama-3.3-nemotron-super-49b-v1.5");
        let history = [Message::user("hi")];

        let messages = assemble(&settings, "", &history);
        assert_eq!(messages[0], Message::system("/no_think"));
        assert_eq!(messages[1], history[0]);

        settings.set_param("thinking", "true").expect("flag");
        let messages = assemble(&settings, "", &history);
        assert_eq!(messages[0], Message::system("/think"));

        let body = body_for(&settings, &history);
        assert!(body.get("thinking").is_none());
        assert!(body.get("chat_template_kwargs").is_none());
    }

    #[test]
    fn nano_has_no_thinking_parameter_so_nothing_is_prepended() {
        let settings = settings_for("nvidia/nvidia-nemotron-nano-9b-v2");
        let history = [Message::user("hi")];
        let messages = assemble(&settings, "", &history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], history[0]);
        let body = body_for(&settings, &history);
        assert_eq!(body["min_thinking_tokens"], json!(1024));
        assert_eq!(body["max_thinking_tokens"], json!(2048));
    }

    #[test]
    fn system_prompt_sits_between_marker_and_history() {
        let mut settings = settings_for("nvidia/llama-3.3-nemotron-super-49b-v1.5");
        settings.set_param("thinking", "true").expect("flag");
        let history = [Message::user("q"), Message::assistant("a")];
        let messages = assemble(&settings, "Be terse.", &history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Message::system("/think"));
        assert_eq!(messages[1], Message::system("Be terse."));
        assert_eq!(messages[2].role, MessageRole::User);
        assert_eq!(messages[3].role, MessageRole::Assistant);
    }

    #[test]
    fn empty_system_prompt_adds_no_message() {
        let settings = settings_for("openai/gpt-oss-120b");
        let history = [Message::user("hi")];
        let messages = assemble(&settings, "", &history);
        assert_eq!(messages.len(), 1);
    }
}
