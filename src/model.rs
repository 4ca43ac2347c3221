use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    #[serde(other)]
    Stopped,
}

impl InstanceState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl Display for InstanceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub state: InstanceState,
    #[serde(default)]
    pub timestamp: String,
}

impl Instance {
    // The backend always creates instances stopped.
    pub fn announced(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: InstanceState::Stopped,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceList {
    #[serde(default)]
    pub data: Vec<Instance>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceAction {
    Start,
    Stop,
    Delete,
}

impl InstanceAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
        }
    }
}

impl Display for InstanceAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct InstanceCommand {
    pub id: String,
    pub action: InstanceAction,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct StatusUpdate {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    pub state: InstanceState,
}

// Numeric ids read as their decimal text, the same way push messages do.
fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Intent {
    Create,
    Reload,
    Action { id: String, action: InstanceAction },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage(Value);

impl PushMessage {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    // Empty strings and nulls count as absent.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn info(&self) -> Option<&str> {
        self.0.get("info").and_then(Value::as_str)
    }

    fn string_field(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WorklogEntry {
    pub id: Option<String>,
    pub info: String,
    pub timestamp: String,
    pub kind: Option<String>,
}

impl WorklogEntry {
    pub fn from_message(message: &PushMessage) -> Self {
        let timestamp = message
            .string_field("timeStamp")
            .or_else(|| message.string_field("timestamp"))
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        Self {
            id: message.id(),
            info: message.info().unwrap_or_default().to_string(),
            timestamp,
            kind: message.string_field("type"),
        }
    }
}
