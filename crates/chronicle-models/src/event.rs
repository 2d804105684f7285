//! Memory events: the immutable units of the log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Model => "model",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            "model" => Some(Role::Model),
            _ => None,
        }
    }

    pub fn all() -> &'static [Role] {
        &[Role::User, Role::Assistant, Role::System, Role::Model]
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known event types. The vocabulary is open: any non-empty
/// lowercase string is accepted by the log.
pub mod event_types {
    pub const CONVERSATION: &str = "conversation";
    pub const TASK: &str = "task";
    pub const DECISION: &str = "decision";
    pub const DOCUMENT: &str = "document";
    pub const ACTION: &str = "action";
    pub const OBSERVATION: &str = "observation";
}

/// A recorded event. Never updated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub id: String,
    pub owner_id: String,
    pub raw_content: String,
    pub event_type: String,
    pub role: Role,
    pub source_agent: Option<String>,
    pub source_model: Option<String>,
    pub session_id: Option<String>,
    pub parent_id: Option<String>,
    /// Opaque key/value map supplied by the caller.
    pub context: Value,
    pub timestamp: DateTime<Utc>,

    // Partition fields derived at write time
    pub date: NaiveDate,
    pub hour: u32,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u32,
    /// ISO-8601 week number
    pub week_of_year: u32,
    pub month: u32,
    pub year: i32,

    pub created_at: DateTime<Utc>,
}

/// Input for appending a new event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    pub raw_content: String,
    pub event_type: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub source_agent: Option<String>,
    #[serde(default)]
    pub source_model: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    /// Defaults to the time of append.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn new(raw_content: impl Into<String>, event_type: impl Into<String>, role: Role) -> Self {
        Self {
            raw_content: raw_content.into(),
            event_type: event_type.into(),
            role,
            ..Default::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn from_agent(mut self, agent: impl Into<String>) -> Self {
        self.source_agent = Some(agent.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// One message of a conversation appended with `append_chain`.
///
/// The session and parent links are filled in by the log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainMessage {
    pub raw_content: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_chain_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub source_agent: Option<String>,
    #[serde(default)]
    pub source_model: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_chain_event_type() -> String {
    event_types::CONVERSATION.to_string()
}

impl ChainMessage {
    pub fn new(raw_content: impl Into<String>, role: Role) -> Self {
        Self {
            raw_content: raw_content.into(),
            role,
            event_type: default_chain_event_type(),
            ..Default::default()
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Convert into an append input bound to a session and parent.
    pub fn into_event(self, session_id: &str, parent_id: Option<String>) -> NewEvent {
        NewEvent {
            raw_content: self.raw_content,
            event_type: self.event_type,
            role: self.role,
            source_agent: self.source_agent,
            source_model: self.source_model,
            session_id: Some(session_id.to_string()),
            parent_id,
            context: self.context,
            timestamp: self.timestamp,
        }
    }
}

/// Limit/offset page for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}
