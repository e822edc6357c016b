use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::api::stream;
use crate::config::Settings;
use crate::model::{Conversation, FileSettings, Message, MessageRole};
use crate::registry::{self, ModelSpec};

const EXPORT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Valid,
    Recreated { backup: PathBuf },
}

// Every mutation is read-modify-write with an atomic replace.
#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // A file that exists but does not parse, or lacks the required sections,
    // is moved aside to <path>.bak.<unix-ts> and recreated; stored messages
    // are never deleted in place.
    pub fn ensure(&self, stream: bool, history_limit: usize) -> Result<EnsureOutcome> {
        if !self.path.exists() {
            self.create_fresh(stream, history_limit)?;
            return Ok(EnsureOutcome::Created);
        }
        let raw = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read conversation file {}", self.path.display())
        })?;
        if has_required_sections(&raw) {
            return Ok(EnsureOutcome::Valid);
        }
        let backup = PathBuf::from(format!(
            "{}.bak.{}",
            self.path.display(),
            Utc::now().timestamp()
        ));
        fs::rename(&self.path, &backup).with_context(|| {
            format!(
                "Failed to back up malformed conversation file to {}",
                backup.display()
            )
        })?;
        warn!(
            file = %self.path.display(),
            backup = %backup.display(),
            "conversation file was malformed; backed it up and recreating"
        );
        self.create_fresh(stream, history_limit)?;
        Ok(EnsureOutcome::Recreated { backup })
    }

    fn create_fresh(&self, stream: bool, history_limit: usize) -> Result<()> {
        let conversation = Conversation {
            system: String::new(),
            settings: seeded_settings(stream, history_limit),
            messages: Vec::new(),
        };
        self.save(&conversation)
    }

    pub fn load(&self) -> Result<Conversation> {
        let raw = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read conversation file {}", self.path.display())
        })?;
        serde_json::from_str(&raw).with_context(|| {
            format!("Failed to parse conversation file {}", self.path.display())
        })
    }

    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        let contents = serde_json::to_string_pretty(conversation)
            .context("Failed to serialize conversation")?;
        write_atomic(&self.path, &contents)
    }

    pub fn append_message(&self, message: Message) -> Result<usize> {
        let mut conversation = self.load()?;
        conversation.messages.push(message);
        self.save(&conversation)?;
        Ok(conversation.messages.len())
    }

    pub fn message_count(&self) -> Result<usize> {
        Ok(self.load()?.messages.len())
    }

    pub fn clear_messages(&self) -> Result<()> {
        let mut conversation = self.load()?;
        conversation.messages.clear();
        self.save(&conversation)
    }

    pub fn set_system(&self, system: &str) -> Result<()> {
        let mut conversation = self.load()?;
        conversation.system = system.to_string();
        self.save(&conversation)
    }

    // Writes only this model's entry; the shared default map is left as is.
    pub fn persist_settings(&self, settings: &Settings) -> Result<()> {
        let mut conversation = self.load()?;
        conversation.settings.stream = Some(settings.stream);
        conversation.settings.history_limit = Some(settings.history_limit);
        conversation
            .settings
            .models
            .insert(settings.model.clone(), settings.params_json());
        self.save(&conversation)
    }

    pub fn copy_to(&self, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::copy(&self.path, target).with_context(|| {
            format!("Failed to copy conversation file to {}", target.display())
        })?;
        Ok(())
    }

    pub fn raw_contents(&self) -> Result<String> {
        fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read conversation file {}", self.path.display())
        })
    }

    // Oldest first; asking for more than exist returns them all.
    pub fn export_last_n(&self, count: usize, strip_reasoning: bool) -> Result<String> {
        if count == 0 {
            return Err(anyhow!("count must be at least 1"));
        }
        let replies = self.assistant_contents(strip_reasoning)?;
        let start = replies.len().saturating_sub(count);
        Ok(replies[start..].join(EXPORT_SEPARATOR))
    }

    // index 1 is the most recent reply.
    pub fn export_nth_last(&self, index: usize, strip_reasoning: bool) -> Result<String> {
        if index == 0 {
            return Err(anyhow!("index must be at least 1"));
        }
        let replies = self.assistant_contents(strip_reasoning)?;
        if index > replies.len() {
            return Err(anyhow!(
                "index out of bounds: asked for {index}, only {} assistant responses available",
                replies.len()
            ));
        }
        Ok(replies[replies.len() - index].clone())
    }

    fn assistant_contents(&self, strip_reasoning: bool) -> Result<Vec<String>> {
        let conversation = self.load()?;
        let replies: Vec<String> = conversation
            .messages
            .iter()
            .filter(|message| message.role == MessageRole::Assistant)
            .map(|message| {
                if strip_reasoning {
                    stream::strip_reasoning_blocks(&message.content)
                } else {
                    message.content.clone()
                }
            })
            .collect();
        if replies.is_empty() {
            return Err(anyhow!("no assistant responses found"));
        }
        Ok(replies)
    }
}

// Generic schema defaults go to the shared map, the default model's own
// defaults under its entry.
fn seeded_settings(stream: bool, history_limit: usize) -> FileSettings {
    let mut models = BTreeMap::new();
    models.insert(
        registry::DEFAULT_MODEL.to_string(),
        schema_defaults(registry::spec_for(registry::DEFAULT_MODEL)),
    );
    FileSettings {
        stream: Some(stream),
        history_limit: Some(history_limit),
        default: schema_defaults(registry::generic_spec()),
        models,
    }
}

fn has_required_sections(raw: &str) -> bool {
    if serde_json::from_str::<Conversation>(raw).is_err() {
        return false;
    }
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return false;
    };
    value.get("messages").is_some_and(Value::is_array)
        && value
            .pointer("/settings/default")
            .is_some_and(Value::is_object)
        && value
            .pointer("/settings/models")
            .is_some_and(Value::is_object)
}

fn schema_defaults(spec: &ModelSpec) -> BTreeMap<String, Value> {
    spec.params
        .iter()
        .filter_map(|(name, param)| {
            param
                .default
                .as_ref()
                .map(|default| ((*name).to_string(), default.to_json()))
        })
        .collect()
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
