//! Value types shared between intake events and the intake service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a ticket reached the guide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Machine-readable code read by the camera or typed from one
    Scanned,
    /// Paper ticket photographed by the guide
    Paper,
    /// Online booking shown on the tourist's phone
    Online,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Scanned => "scanned",
            SourceKind::Paper => "paper",
            SourceKind::Online => "online",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scanned" => Ok(SourceKind::Scanned),
            "paper" => Ok(SourceKind::Paper),
            "online" => Ok(SourceKind::Online),
            other => Err(format!("Unknown ticket kind: {}", other)),
        }
    }
}

/// Camera capture lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    Idle,
    Starting,
    Streaming,
    Error,
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraState::Idle => "idle",
            CameraState::Starting => "starting",
            CameraState::Streaming => "streaming",
            CameraState::Error => "error",
        };
        f.write_str(name)
    }
}
