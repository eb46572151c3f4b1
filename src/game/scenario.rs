//! Video-cue scenarios
//!
//! The scenario is the label viewers use to pick which clip to play. Internally
//! it is a tagged value; the string label only exists on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::side::Side;

/// What the attacking side is doing in an action scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    /// Single hit or short streak
    Pump,
    /// Third or later consecutive hit
    Combo,
    /// Round-winning hit
    Victory,
}

impl ScenarioKind {
    const ALL: [ScenarioKind; 3] = [ScenarioKind::Pump, ScenarioKind::Combo, ScenarioKind::Victory];

    fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Pump => "Pump",
            ScenarioKind::Combo => "Combo",
            ScenarioKind::Victory => "Victory",
        }
    }
}

/// Video cue shown to all viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Scenario {
    #[default]
    Idle,
    Action { side: Side, kind: ScenarioKind },
}

impl Scenario {
    pub fn pump(side: Side) -> Self {
        Self::Action {
            side,
            kind: ScenarioKind::Pump,
        }
    }

    pub fn combo(side: Side) -> Self {
        Self::Action {
            side,
            kind: ScenarioKind::Combo,
        }
    }

    pub fn victory(side: Side) -> Self {
        Self::Action {
            side,
            kind: ScenarioKind::Victory,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scenario::Idle => "idle".to_string(),
            Scenario::Action { side, kind } => format!("{}{}", side.as_str(), kind.as_str()),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        if label == "idle" {
            return Ok(Scenario::Idle);
        }

        for side in Side::BOTH {
            if let Some(rest) = label.strip_prefix(side.as_str()) {
                if let Some(kind) = ScenarioKind::ALL.iter().find(|k| k.as_str() == rest) {
                    return Ok(Scenario::Action { side, kind: *kind });
                }
            }
        }

        Err(ScenarioError::Unknown(label.to_string()))
    }
}

impl From<Scenario> for String {
    fn from(scenario: Scenario) -> Self {
        scenario.label()
    }
}

impl TryFrom<String> for Scenario {
    type Error = ScenarioError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    #[error("Unknown scenario: {0}")]
    Unknown(String),
}
