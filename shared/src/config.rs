//! Streaming configuration
//!
//! Defaults match a three-segment opening window that retires two segments
//! behind the last contact. A JSON file can override any field.

use crate::archetype::default_archetypes;
use crate::{Archetype, StreamError, Vec3, DEFAULT_INITIAL_WINDOW, DEFAULT_REMOVAL_LAG};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EliminationZoneConfig {
    pub archetype: String,
    pub position: Vec3,
}

impl Default for EliminationZoneConfig {
    fn default() -> Self {
        Self {
            archetype: "KillZone".to_string(),
            position: Vec3::new(0.0, -10.0, 0.0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Segments spawned by `initialize` on the authoritative node
    pub initial_window: u32,
    /// Id distance behind the touched segment at which a segment is retired
    pub removal_lag: u32,
    /// Names to pick from when spawning a segment
    pub catalog: Vec<String>,
    /// Templates the authoritative node can instantiate
    pub archetypes: Vec<Archetype>,
    pub elimination_zone: EliminationZoneConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_window: DEFAULT_INITIAL_WINDOW,
            removal_lag: DEFAULT_REMOVAL_LAG,
            catalog: vec![
                "Stairs".to_string(),
                "Zigzag".to_string(),
                "Ledges".to_string(),
            ],
            archetypes: default_archetypes(),
            elimination_zone: EliminationZoneConfig::default(),
        }
    }
}

impl StreamConfig {
    pub fn from_json_str(json: &str) -> Result<Self, StreamError> {
        let config: StreamConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Catalog names are not checked against the templates here. An unknown
    /// name only fails the spawn that picks it.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.initial_window == 0 {
            return Err(StreamError::InvalidWindow(self.initial_window));
        }
        if self.catalog.is_empty() {
            return Err(StreamError::EmptyCatalog);
        }
        if self.catalog.iter().any(|name| name.is_empty()) {
            return Err(StreamError::Config(
                "catalog contains an empty archetype name".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.initial_window, 3);
        assert_eq!(config.removal_lag, 2);
        assert_eq!(config.catalog.len(), 3);
        assert_eq!(config.elimination_zone.archetype, "KillZone");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = StreamConfig::from_json_str(r#"{ "initial_window": 5 }"#).unwrap();
        assert_eq!(config.initial_window, 5);
        assert_eq!(config.removal_lag, 2);
        assert_eq!(config.catalog, StreamConfig::default().catalog);
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "initial_window": 4,
            "removal_lag": 3,
            "catalog": ["Tower"],
            "archetypes": [
                { "name": "Tower", "layers": [
                    { "name": "Ground", "y_min": 0, "y_max": 20, "cell_size_y": 0.5 }
                ] }
            ],
            "elimination_zone": { "archetype": "Lava", "position": { "x": 0.0, "y": -4.0, "z": 0.0 } }
        }"#;
        let config = StreamConfig::from_json_str(json).unwrap();
        assert_eq!(config.removal_lag, 3);
        assert_eq!(config.catalog, vec!["Tower".to_string()]);
        assert_eq!(config.archetypes[0].layers[0].y_max, 20);
        assert_eq!(config.elimination_zone.position.y, -4.0);
    }

    #[test]
    fn test_rejects_invalid() {
        assert_eq!(
            StreamConfig::from_json_str(r#"{ "catalog": [] }"#),
            Err(StreamError::EmptyCatalog)
        );
        assert_eq!(
            StreamConfig::from_json_str(r#"{ "initial_window": 0 }"#),
            Err(StreamError::InvalidWindow(0))
        );
        assert!(matches!(
            StreamConfig::from_json_str(r#"{ "catalog": [""] }"#),
            Err(StreamError::Config(_))
        ));
        assert!(matches!(
            StreamConfig::from_json_str("{ nope"),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = StreamConfig::from_file("/definitely/not/here.json");
        assert!(matches!(result, Err(StreamError::Config(_))));
    }
}
