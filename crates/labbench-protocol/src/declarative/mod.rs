//! Declarative (JSON) protocols
//!
//! A protocol document has three sections: `deck` (containers by label),
//! `head` (pipettes by tool name) and `instructions` (per-tool groups of
//! transfer / distribute / consolidate / mix steps).

mod processor;

pub use processor::DeclarativeProcessor;

use serde::Deserialize;

/// Container placement in the `deck` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeckEntry {
    pub labware: String,
    pub slot: String,
}

/// Reference to a container by label
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerRef {
    pub container: String,
}

/// Pipette definition in the `head` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeadEntry {
    pub tool: String,
    pub axis: String,
    pub volume: f64,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(rename = "multi-channel", default)]
    pub multi_channel: bool,
    #[serde(rename = "tip-racks", default)]
    pub tip_racks: Vec<ContainerRef>,
    #[serde(rename = "trash-container", default)]
    pub trash_container: Option<ContainerRef>,
}

impl HeadEntry {
    /// Explicit channel count, else 8 for multi-channel heads
    #[must_use]
    pub fn channel_count(&self) -> u32 {
        self.channels
            .unwrap_or(if self.multi_channel { 8 } else { 1 })
    }
}

/// A well inside a declared container
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WellRef {
    pub container: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferStep {
    pub from: WellRef,
    pub to: WellRef,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistributeGroup {
    pub from: WellRef,
    pub to: Vec<WellRef>,
    /// Volume delivered to each destination
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsolidateGroup {
    pub from: Vec<WellRef>,
    pub to: WellRef,
    /// Volume taken from each source
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MixStep {
    pub container: String,
    pub location: String,
    pub volume: f64,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
}

fn default_repetitions() -> u32 {
    3
}

/// Per-tool list of instruction groups
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instruction {
    pub tool: String,
    #[serde(default)]
    pub groups: Vec<serde_json::Value>,
}

/// One decoded instruction group
#[derive(Debug, Clone, PartialEq)]
pub enum Group {
    Transfer(Vec<TransferStep>),
    Distribute(DistributeGroup),
    Consolidate(ConsolidateGroup),
    Mix(Vec<MixStep>),
}

impl Group {
    /// Decode a `{ "<kind>": ... }` object
    ///
    /// Returns `Ok(None)` for kinds this processor does not know.
    pub fn decode(value: &serde_json::Value) -> Result<Option<(String, Self)>, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "instruction group must be an object".to_string())?;
        let mut entries = object.iter();
        let (kind, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err("instruction group must have exactly one key".to_string()),
        };

        let decoded = match kind.as_str() {
            "transfer" => serde_json::from_value(body.clone()).map(Self::Transfer),
            "distribute" => serde_json::from_value(body.clone()).map(Self::Distribute),
            "consolidate" => serde_json::from_value(body.clone()).map(Self::Consolidate),
            "mix" => serde_json::from_value(body.clone()).map(Self::Mix),
            _ => return Ok(None),
        };
        decoded
            .map(|group| Some((kind.clone(), group)))
            .map_err(|e| format!("invalid '{kind}' group: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn head_entry_channel_defaults() {
        let single: HeadEntry =
            serde_json::from_value(json!({"tool": "pipette", "axis": "b", "volume": 200})).unwrap();
        assert_eq!(single.channel_count(), 1);

        let multi: HeadEntry = serde_json::from_value(
            json!({"tool": "pipette", "axis": "a", "volume": 10, "multi-channel": true}),
        )
        .unwrap();
        assert_eq!(multi.channel_count(), 8);
    }

    #[test]
    fn decode_known_group() {
        let value = json!({"mix": [{"container": "plate", "location": "A1", "volume": 20}]});
        let (kind, group) = Group::decode(&value).unwrap().unwrap();
        assert_eq!(kind, "mix");
        match group {
            Group::Mix(steps) => assert_eq!(steps[0].repetitions, 3),
            other => panic!("unexpected group: {other:?}"),
        }
    }

    #[test]
    fn decode_unknown_group_is_none() {
        let value = json!({"shake": {"seconds": 5}});
        assert_eq!(Group::decode(&value).unwrap(), None);
    }

    #[test]
    fn decode_rejects_malformed_groups() {
        assert!(Group::decode(&json!([1, 2])).is_err());
        assert!(Group::decode(&json!({"mix": [], "transfer": []})).is_err());
        assert!(Group::decode(&json!({"transfer": [{"volume": 5}]})).is_err());
    }
}
