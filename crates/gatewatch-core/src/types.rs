//! Domain model — subscriptions, access events, deltas.

use serde::{Deserialize, Serialize};

/// Subscription discriminator. Only `Track` is driven by the reconciler today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackKind {
    #[default]
    Track,
}

impl TrackKind {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Track => "TRACK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRACK" => Some(TrackKind::Track),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat subscriber following one person's facility access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSubscription {
    pub chat_id: i64,
    /// External id of the tracked person in the access-control system.
    pub subject_id: String,
    pub run: String,
    pub display_name: String,
    pub alias: Option<String>,
    #[serde(default)]
    pub kind: TrackKind,
    /// Last entry timestamp the subscriber was already alerted about.
    pub last_entry_at: Option<String>,
    /// Last exit timestamp the subscriber was already alerted about.
    pub last_exit_at: Option<String>,
}

impl TrackedSubscription {
    /// Alias when set, otherwise the full name.
    pub fn label(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.display_name)
    }
}

/// One access record as reported by the access-control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    #[serde(rename = "externalId")]
    pub subject_id: String,
    pub run: String,
    #[serde(rename = "fullName")]
    pub display_name: String,
    /// Location code (numeric, carried as a string on the wire).
    pub location: String,
    #[serde(rename = "entryAt")]
    pub entry_at: String,
    #[serde(rename = "exitAt", default)]
    pub exit_at: Option<String>,
}

/// Direction of a computed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Entry,
    Exit,
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaKind::Entry => write!(f, "entry"),
            DeltaKind::Exit => write!(f, "exit"),
        }
    }
}

/// A change to alert one subscriber about. Lives for one tick only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub chat_id: i64,
    pub run: String,
    pub display_name: String,
    pub alias: Option<String>,
    pub location: String,
    pub kind: DeltaKind,
}

impl Delta {
    pub fn new(sub: &TrackedSubscription, event: &AccessEvent, kind: DeltaKind) -> Self {
        Self {
            chat_id: sub.chat_id,
            run: sub.run.clone(),
            display_name: sub.display_name.clone(),
            alias: sub.alias.clone(),
            location: event.location.clone(),
            kind,
        }
    }
}

/// Person record returned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub external_id: i64,
    pub run: String,
    pub first_name: String,
    pub last_name: String,
}

impl DirectoryUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// The id access events carry for this person.
    pub fn subject_id(&self) -> String {
        self.external_id.to_string()
    }
}
