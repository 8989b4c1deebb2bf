//! Inter-process communication between leaven and leavenctl
//!
//! We use Unix domain sockets for local IPC: one newline-terminated JSON
//! command per connection, answered by one JSON response.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Commands that leavenctl can send to leaven
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Resume,
    ResetStage,
    ResetAll,
    NextStage,
    Status,
    ListPresets,
    SelectPreset { id: String },
    SavePreset { preset: Preset },
    DeletePreset { id: String },
}

/// Responses from leaven back to leavenctl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Status(Snapshot),
    Presets(Vec<PresetSummary>),
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    StageComplete,
    AllComplete,
}

impl TimerStatus {
    /// Running or paused: a run is in flight and the preset must not change.
    pub fn is_active(self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }

    pub fn label(self) -> &'static str {
        match self {
            TimerStatus::Idle => "ready",
            TimerStatus::Running => "fermenting",
            TimerStatus::Paused => "paused",
            TimerStatus::StageComplete => "stage complete",
            TimerStatus::AllComplete => "done",
        }
    }
}

/// Read-only view of the timer after an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: TimerStatus,
    pub remaining_secs: u64,
    pub stage_duration_secs: u64,
    pub stage_progress: f64,
    pub total_progress: f64,
    /// `None` while the loaded sequence is empty.
    pub current_index: Option<usize>,
    pub stage_count: usize,
    pub stage_name: Option<String>,
    pub sequence_name: String,
}

/// One fermentation phase. Authored in minutes, counted in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "duration_minutes", with = "minutes")]
    pub duration_secs: u64,
    #[serde(default)]
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Left empty by clients adding a new preset; leaven assigns one.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub emoji: String,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetSummary {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub stage_count: usize,
    pub total_minutes: u64,
    pub is_custom: bool,
    pub selected: bool,
}

/// Longest single stage accepted anywhere: one week.
pub const MAX_STAGE_MINUTES: u64 = 7 * 24 * 60;

/// `duration_minutes` on the wire, whole seconds in memory.
mod minutes {
    use super::MAX_STAGE_MINUTES;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secs: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        if secs % 60 == 0 {
            serializer.serialize_u64(secs / 60)
        } else {
            serializer.serialize_f64(*secs as f64 / 60.0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let minutes = f64::deserialize(deserializer)?;
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(de::Error::custom(format!(
                "duration_minutes must be a non-negative number, got {minutes}"
            )));
        }
        if minutes > MAX_STAGE_MINUTES as f64 {
            return Err(de::Error::custom(format!(
                "duration_minutes must be at most {MAX_STAGE_MINUTES}, got {minutes}"
            )));
        }
        Ok((minutes * 60.0).round() as u64)
    }
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is leaven running?")]
    ConnectionRefused,

    #[error("Empty response from leaven")]
    EmptyResponse,
}

pub const SOCKET_PATH: &str = "/tmp/leaven.sock";

/// Socket location, overridable with `LEAVEN_SOCKET`.
pub fn socket_path() -> PathBuf {
    std::env::var_os("LEAVEN_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SOCKET_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_minutes_become_seconds() {
        let stage: Stage = serde_json::from_str(
            r#"{"id":"rest","name":"Bench rest","duration_minutes":1.5}"#,
        )
        .unwrap();
        assert_eq!(stage.duration_secs, 90);
        assert!(stage.description.is_empty());
    }

    #[test]
    fn whole_minutes_serialize_as_integers() {
        let stage = Stage {
            id: "first_rise".into(),
            name: "First rise".into(),
            description: String::new(),
            duration_secs: 3600,
            emoji: String::new(),
        };
        let json = serde_json::to_string(&stage).unwrap();
        assert!(json.contains(r#""duration_minutes":60"#), "{json}");
    }

    #[test]
    fn negative_minutes_are_rejected() {
        let err = serde_json::from_str::<Stage>(r#"{"id":"x","name":"x","duration_minutes":-1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn huge_minutes_are_rejected() {
        let err = serde_json::from_str::<Stage>(r#"{"id":"x","name":"x","duration_minutes":1e12}"#)
            .unwrap_err();
        assert!(err.to_string().contains("at most"), "{err}");
        let week: Stage = serde_json::from_str(&format!(
            r#"{{"id":"x","name":"x","duration_minutes":{MAX_STAGE_MINUTES}}}"#
        ))
        .unwrap();
        assert_eq!(week.duration_secs, MAX_STAGE_MINUTES * 60);
    }

    #[test]
    fn active_statuses() {
        assert!(TimerStatus::Running.is_active());
        assert!(TimerStatus::Paused.is_active());
        assert!(!TimerStatus::StageComplete.is_active());
        assert!(!TimerStatus::Idle.is_active());
    }

    #[test]
    fn command_wire_shape() {
        let json = serde_json::to_string(&Command::SelectPreset { id: "bagel".into() }).unwrap();
        assert_eq!(json, r#"{"SelectPreset":{"id":"bagel"}}"#);
        let back: Command = serde_json::from_str(r#""NextStage""#).unwrap();
        assert!(matches!(back, Command::NextStage));
    }
}
