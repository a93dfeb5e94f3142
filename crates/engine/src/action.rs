//! The closed set of actions the control loop can dispatch.
//!
//! Wire shape is adjacently tagged: `{"action": "fill_slot", "arguments":
//! {...}}` with snake_case names. There is no dispatch-by-string anywhere;
//! anything that does not deserialize into this enum cannot be executed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use lineup_core::SelectionMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "arguments", rename_all = "snake_case")]
pub enum Action {
    /// Recompute the gap analysis for the whole window.
    IdentifyGaps,
    /// Place a fully specified slot.
    FillSlot(FillSlotArgs),
    /// Ask the selection capability to pick content for a span, then fill it.
    SelectContent(SelectContentArgs),
    /// Turn instruction text into a structured rule set.
    ParseConstraints(ParseConstraintsArgs),
    /// Re-check the schedule against the current rule set.
    CheckViolations,
    /// Recompute the blended quality report.
    EvaluateQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillSlotArgs {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectContentArgs {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Placement context forwarded to the selector, e.g. "Weekend morning".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseConstraintsArgs {
    /// Overrides the request's instruction text when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl Action {
    /// Stable wire name, also the key of the cost table.
    pub fn name(&self) -> &'static str {
        match self {
            Action::IdentifyGaps => "identify_gaps",
            Action::FillSlot(_) => "fill_slot",
            Action::SelectContent(_) => "select_content",
            Action::ParseConstraints(_) => "parse_constraints",
            Action::CheckViolations => "check_violations",
            Action::EvaluateQuality => "evaluate_quality",
        }
    }

    /// Assemble an action from a name and a free-form arguments value, the
    /// shape model output arrives in. `null` or `{}` arguments are treated
    /// as absent so argument-less actions round-trip.
    pub fn from_parts(
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        let mut wire = serde_json::Map::new();
        wire.insert("action".into(), serde_json::Value::String(name.to_string()));
        if let Some(args) = arguments {
            let empty = match &args {
                serde_json::Value::Null => true,
                serde_json::Value::Object(map) => map.is_empty(),
                _ => false,
            };
            if !empty {
                wire.insert("arguments".into(), args);
            }
        }
        serde_json::from_value(serde_json::Value::Object(wire))
    }
}
