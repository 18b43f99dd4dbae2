//! Now-playing payloads pushed by remote player clients, and their
//! validation at the ingestion boundary.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Keys a submission must carry to be considered at all.
pub const REQUIRED_KEYS: [&str; 7] = [
    "album", "artist", "title", "duration", "elapsed", "state", "npclient",
];

/// Player state reported by a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
    Completed,
    Idle,
    Startup,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Completed => "completed",
            PlaybackState::Idle => "idle",
            PlaybackState::Startup => "startup",
        }
    }

    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "playing" => Ok(PlaybackState::Playing),
            "paused" => Ok(PlaybackState::Paused),
            "stopped" => Ok(PlaybackState::Stopped),
            "completed" => Ok(PlaybackState::Completed),
            "idle" => Ok(PlaybackState::Idle),
            "startup" => Ok(PlaybackState::Startup),
            other => Err(format!("unknown player state '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for PlaybackState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One snapshot of now-playing metadata as reported by a client.
///
/// `duration` and `elapsed` stay in their reported `h:m:s` / `m:s` form;
/// they are only converted to seconds when the state store needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub album: String,
    #[serde(deserialize_with = "one_or_many")]
    pub artist: Vec<String>,
    pub title: String,
    pub duration: String,
    pub elapsed: String,
    pub state: PlaybackState,
    pub npclient: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub art_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quality: String,
}

// Optional fields may be sent as an explicit null.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Some clients send a bare string for a single artist.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Reasons a submission is turned away at the ingestion boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("client mismatch: '{incoming}' cannot replace '{owner}' yet")]
    ClientMismatch { owner: String, incoming: String },
}

impl IngestError {
    /// HTTP status the ingestion layer answers with.
    pub fn status_code(&self) -> u16 {
        400
    }

    /// Message body returned to the producer.
    pub fn message(&self) -> &'static str {
        match self {
            IngestError::InvalidJson => "Invalid JSON payload",
            IngestError::InvalidPayload(_) => "Invalid payload",
            IngestError::ClientMismatch { .. } => "Client mismatch, wait 60s",
        }
    }
}

impl Payload {
    /// Validate a decoded JSON value and turn it into a payload.
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        let Some(obj) = value.as_object() else {
            return Err(IngestError::InvalidPayload("not a JSON object".into()));
        };
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(IngestError::InvalidPayload(format!(
                "missing keys: {}",
                missing.join(", ")
            )));
        }
        serde_json::from_value(value).map_err(|e| IngestError::InvalidPayload(e.to_string()))
    }

    /// Decode and validate a raw request body.
    pub fn from_json(body: &str) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_str(body).map_err(|_| IngestError::InvalidJson)?;
        Self::from_value(value)
    }
}
