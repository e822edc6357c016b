use std::collections::{BTreeMap, BTreeSet};
use std::env;

use anyhow::{Result, anyhow};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::FileSettings;
use crate::registry::{self, ParamKind, ParamValue};

pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_STREAM: bool = true;
pub const DEFAULT_HISTORY_LIMIT: usize = 40;

pub const BASE_URL_ENV: &str = "NVCHAT_BASE_URL";

// Checked in order; the first non-empty value wins.
pub const ACCESS_TOKEN_ENVS: [&str; 5] = [
    "NVIDIA_BUILD_AI_ACCESS_TOKEN",
    "NVIDIA_ACCESS_TOKEN",
    "ACCESS_TOKEN",
    "NVIDIA_API_KEY",
    "API_KEY",
];

const GLOBAL_SETTINGS: [&str; 2] = ["stream", "history_limit"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub base_url: String,
    pub stream: bool,
    pub history_limit: usize,
    pub params: BTreeMap<String, ParamValue>,
    // Explicitly set this session; carried across model switches when the
    // new schema still accepts them.
    explicit: BTreeSet<String>,
}

impl Settings {
    pub fn resolve(model: &str, base_url: String, file: Option<&FileSettings>) -> Self {
        let mut stream = DEFAULT_STREAM;
        let mut history_limit = DEFAULT_HISTORY_LIMIT;
        if let Some(file) = file {
            if let Some(value) = file.stream {
                stream = value;
            }
            if let Some(limit) = file.history_limit.filter(|limit| *limit > 0) {
                history_limit = limit;
            }
        }
        Self {
            model: model.to_string(),
            base_url,
            stream,
            history_limit,
            params: merged_params(model, file),
            explicit: BTreeSet::new(),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &[(&'static str, ParamValue)]) -> Result<()> {
        let spec = registry::spec_for(&self.model);
        for (name, value) in overrides {
            let param = spec
                .params
                .get(name)
                .ok_or_else(|| anyhow!("model {} has no parameter {name}", self.model))?;
            param.validate(name, value)?;
            self.params.insert((*name).to_string(), value.clone());
            self.explicit.insert((*name).to_string());
        }
        Ok(())
    }

    pub fn apply_stream_override(&mut self, stream: Option<bool>) {
        if let Some(value) = stream {
            self.stream = value;
            self.explicit.insert("stream".to_string());
        }
    }

    pub fn apply_limit_override(&mut self, limit: Option<usize>) -> Result<()> {
        if let Some(limit) = limit {
            if limit == 0 {
                return Err(anyhow!("history limit must be at least 1"));
            }
            self.history_limit = limit;
            self.explicit.insert("history_limit".to_string());
        }
        Ok(())
    }

    // File-merged values are checked here rather than at merge time, so a
    // bad file aborts startup instead of being silently corrected.
    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(anyhow!("history limit must be at least 1"));
        }
        let spec = registry::spec_for(&self.model);
        for (name, value) in &self.params {
            if let Some(param) = spec.params.get(name.as_str()) {
                param.validate(name, value)?;
            }
        }
        Ok(())
    }

    pub fn set_param(&mut self, name: &str, raw: &str) -> Result<()> {
        match name {
            "stream" => {
                let value = match ParamValue::parse(ParamKind::Flag, raw) {
                    Some(ParamValue::Flag(value)) => value,
                    _ => return Err(anyhow!("invalid stream value: {raw} (use true or false)")),
                };
                self.stream = value;
                self.explicit.insert(name.to_string());
                return Ok(());
            }
            "history_limit" => {
                let limit: usize = raw
                    .parse()
                    .map_err(|_| anyhow!("invalid history_limit value: {raw}"))?;
                if limit == 0 {
                    return Err(anyhow!("history limit must be at least 1"));
                }
                self.history_limit = limit;
                self.explicit.insert(name.to_string());
                return Ok(());
            }
            _ => {}
        }
        let spec = registry::spec_for(&self.model);
        let param = spec
            .params
            .get(name)
            .ok_or_else(|| anyhow!("model {} has no parameter {name}", self.model))?;
        let value = ParamValue::parse(param.kind, raw)
            .ok_or_else(|| anyhow!("invalid {} value for {name}: {raw}", param.kind.as_str()))?;
        param.validate(name, &value)?;
        self.params.insert(name.to_string(), value);
        self.explicit.insert(name.to_string());
        Ok(())
    }

    pub fn unset_param(&mut self, name: &str) -> Result<()> {
        match name {
            "stream" => {
                self.stream = DEFAULT_STREAM;
                self.explicit.remove(name);
                return Ok(());
            }
            "history_limit" => {
                self.history_limit = DEFAULT_HISTORY_LIMIT;
                self.explicit.remove(name);
                return Ok(());
            }
            _ => {}
        }
        let spec = registry::spec_for(&self.model);
        let param = spec
            .params
            .get(name)
            .ok_or_else(|| anyhow!("model {} has no parameter {name}", self.model))?;
        match &param.default {
            Some(default) => {
                self.params.insert(name.to_string(), default.clone());
            }
            None => {
                self.params.remove(name);
            }
        }
        self.explicit.remove(name);
        Ok(())
    }

    // Returns the names of explicit values the new model's schema rejects.
    pub fn switch_model(&mut self, model: &str, file: Option<&FileSettings>) -> Vec<String> {
        let carried: Vec<(String, ParamValue)> = self
            .explicit
            .iter()
            .filter(|name| !GLOBAL_SETTINGS.contains(&name.as_str()))
            .filter_map(|name| {
                self.params
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();
        self.model = model.to_string();
        self.params = merged_params(model, file);
        self.explicit
            .retain(|name| GLOBAL_SETTINGS.contains(&name.as_str()));

        let spec = registry::spec_for(model);
        let mut dropped = Vec::new();
        for (name, value) in carried {
            match spec.params.get(name.as_str()) {
                Some(param) if param.validate(&name, &value).is_ok() => {
                    self.params.insert(name.clone(), value);
                    self.explicit.insert(name);
                }
                _ => dropped.push(name),
            }
        }
        dropped
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("model={}", self.model),
            format!("stream={}", self.stream),
            format!("history_limit={}", self.history_limit),
        ];
        for (name, value) in &self.params {
            match value {
                ParamValue::Text(text) => parts.push(format!("{name}={text:?}")),
                _ => parts.push(format!("{name}={value}")),
            }
        }
        parts.join(" ")
    }

    pub fn params_json(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

// A per-model entry in the file replaces the shared default map entirely;
// the two are never combined.
fn merged_params(model: &str, file: Option<&FileSettings>) -> BTreeMap<String, ParamValue> {
    let spec = registry::spec_for(model);
    let mut params = BTreeMap::new();
    for (name, param) in &spec.params {
        if let Some(default) = &param.default {
            params.insert((*name).to_string(), default.clone());
        }
    }
    if let Some(file) = file {
        let overlay = file.models.get(model).unwrap_or(&file.default);
        for (name, raw) in overlay {
            let Some(param) = spec.params.get(name.as_str()) else {
                debug!(model = %model, param = %name, "skipping parameter the model schema does not list");
                continue;
            };
            match ParamValue::from_json(param.kind, raw) {
                Some(value) => {
                    params.insert(name.clone(), value);
                }
                None => {
                    warn!(
                        model = %model,
                        param = %name,
                        expected = param.kind.as_str(),
                        "skipping conversation file value with the wrong JSON type"
                    );
                }
            }
        }
    }
    params
}

pub fn resolve_base_url() -> String {
    resolve_base_url_with(|key| env::var(key).ok())
}

fn resolve_base_url_with(mut get_var: impl FnMut(&str) -> Option<String>) -> String {
    get_var(BASE_URL_ENV)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

pub fn resolve_access_token(cli_token: Option<&str>) -> Result<String> {
    resolve_access_token_with(cli_token, |key| env::var(key).ok())
}

fn resolve_access_token_with(
    cli_token: Option<&str>,
    mut get_var: impl FnMut(&str) -> Option<String>,
) -> Result<String> {
    if let Some(token) = cli_token.map(str::trim).filter(|token| !token.is_empty()) {
        return Ok(token.to_string());
    }
    for key in ACCESS_TOKEN_ENVS {
        if let Some(token) = get_var(key) {
            let token = token.trim();
            if !token.is_empty() {
                debug!(source = %key, "resolved API access token");
                return Ok(token.to_string());
            }
        }
    }
    Err(anyhow!(
        "No API key provided. Pass -k or set one of: {}",
        ACCESS_TOKEN_ENVS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use serde_json::json;

    use super::{
        DEFAULT_BASE_URL, DEFAULT_HISTORY_LIMIT, DEFAULT_STREAM, Settings,
        resolve_access_token_with, resolve_base_url_with,
    };
    use crate::model::FileSettings;
    use crate::registry::ParamValue;

    fn vars(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn file_with_model_entry() -> FileSettings {
        let mut file = FileSettings {
            stream: Some(false),
            history_limit: Some(10),
            ..FileSettings::default()
        };
        file.default.insert("temperature".into(), json!(0.3));
        let mut entry = BTreeMap::new();
        entry.insert("temperature".into(), json!(0.9));
        entry.insert("bogus_param".into(), json!(1));
        entry.insert("max_tokens".into(), json!("not-a-number"));
        file.models.insert("openai/gpt-oss-120b".into(), entry);
        file
    }

    #[test]
    fn resolve_without_file_uses_schema_defaults() {
        let settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        assert_eq!(settings.stream, DEFAULT_STREAM);
        assert_eq!(settings.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(settings.params["temperature"], ParamValue::Float(1.0));
        assert_eq!(
            settings.params["reasoning_effort"],
            ParamValue::Text("medium".into())
        );
        assert_eq!(settings.params["stop"], ParamValue::Text(String::new()));
    }

    #[test]
    fn resolve_prefers_the_file_entry_for_the_model() {
        let file = file_with_model_entry();
        let settings =
            Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), Some(&file));
        assert!(!settings.stream);
        assert_eq!(settings.history_limit, 10);
        assert_eq!(settings.params["temperature"], ParamValue::Float(0.9));
        // Unknown names and mistyped values from the file are skipped.
        assert!(!settings.params.contains_key("bogus_param"));
        assert_eq!(settings.params["max_tokens"], ParamValue::Int(4096));
    }

    #[test]
    fn resolve_falls_back_to_the_default_map_for_other_models() {
        let file = file_with_model_entry();
        let settings = Settings::resolve(
            "mistralai/mistral-nemotron",
            DEFAULT_BASE_URL.into(),
            Some(&file),
        );
        assert_eq!(settings.params["temperature"], ParamValue::Float(0.3));
    }

    #[test]
    fn zero_history_limit_in_file_is_ignored() {
        let file = FileSettings {
            history_limit: Some(0),
            ..FileSettings::default()
        };
        let settings =
            Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), Some(&file));
        assert_eq!(settings.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn overrides_must_exist_in_the_model_schema() {
        let mut settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        settings
            .apply_overrides(&[("temperature", ParamValue::Float(0.2))])
            .expect("temperature is in the schema");
        let err = settings
            .apply_overrides(&[("seed", ParamValue::Int(7))])
            .expect_err("gpt-oss has no seed parameter");
        assert!(format!("{err}").contains("no parameter seed"));
    }

    #[test]
    fn validate_rejects_out_of_range_file_values() {
        let mut file = FileSettings::default();
        file.default.insert("temperature".into(), json!(5.0));
        let settings =
            Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), Some(&file));
        let err = settings.validate().expect_err("5.0 exceeds the range");
        assert!(format!("{err}").contains("temperature"));
    }

    #[test]
    fn set_and_unset_cover_global_settings() {
        let mut settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        settings.set_param("stream", "false").expect("valid flag");
        assert!(!settings.stream);
        settings
            .set_param("stream", "sideways")
            .expect_err("not a flag value");
        settings.set_param("history_limit", "5").expect("valid limit");
        assert_eq!(settings.history_limit, 5);
        settings
            .set_param("history_limit", "0")
            .expect_err("zero limit");

        settings.unset_param("stream").expect("global unset");
        assert_eq!(settings.stream, DEFAULT_STREAM);
        settings.unset_param("history_limit").expect("global unset");
        assert_eq!(settings.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn set_param_validates_against_the_schema() {
        let mut settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        settings.set_param("temperature", "0.4").expect("in range");
        assert_eq!(settings.params["temperature"], ParamValue::Float(0.4));
        settings
            .set_param("temperature", "3.0")
            .expect_err("out of range");
        settings
            .set_param("reasoning_effort", "max")
            .expect_err("not a listed option");
        settings
            .set_param("does_not_exist", "1")
            .expect_err("unknown parameter");
    }

    #[test]
    fn unset_restores_the_schema_default_or_removes_the_value() {
        let mut settings =
            Settings::resolve("deepseek-ai/deepseek-v3.1", DEFAULT_BASE_URL.into(), None);
        assert!(!settings.params.contains_key("seed"));
        settings.set_param("seed", "42").expect("seed accepts ints");
        assert_eq!(settings.params["seed"], ParamValue::Int(42));
        settings.unset_param("seed").expect("seed is in the schema");
        assert!(!settings.params.contains_key("seed"));

        settings.set_param("temperature", "0.9").expect("in range");
        settings.unset_param("temperature").expect("schema default");
        assert_eq!(settings.params["temperature"], ParamValue::Float(0.2));
    }

    #[test]
    fn switch_model_carries_explicit_values_that_still_validate() {
        let mut settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        settings.set_param("temperature", "0.9").expect("in range");
        settings.set_param("reasoning_effort", "high").expect("listed");
        settings.set_param("stream", "false").expect("flag");

        let dropped = settings.switch_model("mistralai/mistral-nemotron", None);
        // temperature 0.9 fits the new schema; reasoning_effort does not exist there.
        assert_eq!(settings.model, "mistralai/mistral-nemotron");
        assert_eq!(settings.params["temperature"], ParamValue::Float(0.9));
        assert!(!settings.params.contains_key("reasoning_effort"));
        assert_eq!(dropped, vec!["reasoning_effort".to_string()]);
        // Globals are untouched by a model switch.
        assert!(!settings.stream);
    }

    #[test]
    fn switch_model_drops_explicit_values_outside_the_new_range() {
        let mut settings = Settings::resolve(
            "bytedance/seed-oss-36b-instruct",
            DEFAULT_BASE_URL.into(),
            None,
        );
        settings.set_param("temperature", "1.8").expect("in 0..2");
        let dropped = settings.switch_model("openai/gpt-oss-120b", None);
        assert_eq!(dropped, vec!["temperature".to_string()]);
        assert_eq!(settings.params["temperature"], ParamValue::Float(1.0));
    }

    #[test]
    fn summary_lists_model_globals_and_parameters() {
        let settings = Settings::resolve("openai/gpt-oss-120b", DEFAULT_BASE_URL.into(), None);
        let summary = settings.summary();
        assert!(summary.starts_with("model=openai/gpt-oss-120b stream=true history_limit=40"));
        assert!(summary.contains("temperature=1"));
        assert!(summary.contains("stop=\"\""));
        assert!(summary.contains("reasoning_effort=\"medium\""));
    }

    #[test]
    fn base_url_env_overrides_the_default() {
        assert_eq!(resolve_base_url_with(vars(&[])), DEFAULT_BASE_URL);
        assert_eq!(
            resolve_base_url_with(vars(&[("NVCHAT_BASE_URL", " http://localhost:8080/v1 ")])),
            "http://localhost:8080/v1"
        );
        assert_eq!(
            resolve_base_url_with(vars(&[("NVCHAT_BASE_URL", "  ")])),
            DEFAULT_BASE_URL
        );
    }

    #[test]
    fn access_token_prefers_cli_then_env_order() {
        let token = resolve_access_token_with(
            Some("cli-token"),
            vars(&[("NVIDIA_BUILD_AI_ACCESS_TOKEN", "env-token")]),
        )
        .expect("cli token wins");
        assert_eq!(token, "cli-token");

        let token = resolve_access_token_with(
            None,
            vars(&[("API_KEY", "low"), ("NVIDIA_ACCESS_TOKEN", "high")]),
        )
        .expect("env token found");
        assert_eq!(token, "high");

        let token = resolve_access_token_with(Some("  "), vars(&[("API_KEY", " padded ")]))
            .expect("blank cli token falls through");
        assert_eq!(token, "padded");

        let err = resolve_access_token_with(None, vars(&[])).expect_err("no token anywhere");
        assert!(format!("{err}").contains("No API key provided"));
    }
}
