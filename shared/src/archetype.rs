//! Segment templates and extent measurement
//!
//! An archetype is a named map template made of tile layers. When a segment is
//! spawned, its vertical extent is taken from the tallest layer it contains.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tile layer of a template, described by its row bounds and cell height
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    /// First occupied row (inclusive)
    pub y_min: i32,
    /// Row past the last occupied one (exclusive)
    pub y_max: i32,
    pub cell_size_y: f32,
}

impl TileLayer {
    pub fn new(name: &str, y_min: i32, y_max: i32, cell_size_y: f32) -> Self {
        Self {
            name: name.to_string(),
            y_min,
            y_max,
            cell_size_y,
        }
    }

    pub fn rows(&self) -> i32 {
        (self.y_max - self.y_min).max(0)
    }

    pub fn height(&self) -> f32 {
        self.rows() as f32 * self.cell_size_y
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Archetype {
    pub name: String,
    pub layers: Vec<TileLayer>,
}

impl Archetype {
    pub fn new(name: &str, layers: Vec<TileLayer>) -> Self {
        Self {
            name: name.to_string(),
            layers,
        }
    }
}

/// Measures a spawned segment's height.
///
/// The tallest layer is chosen by row count, then converted to world units with
/// that layer's own cell size. A template without layers measures zero.
pub fn measure_vertical_extent(layers: &[TileLayer]) -> f32 {
    layers
        .iter()
        .fold(None::<&TileLayer>, |tallest, layer| match tallest {
            Some(t) if t.rows() >= layer.rows() => Some(t),
            _ => Some(layer),
        })
        .map(TileLayer::height)
        .unwrap_or(0.0)
}

/// Templates the replication layer can instantiate, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ArchetypeRegistry {
    templates: HashMap<String, Archetype>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_archetypes(archetypes: impl IntoIterator<Item = Archetype>) -> Self {
        let mut registry = Self::new();
        for archetype in archetypes {
            registry.register(archetype);
        }
        registry
    }

    /// Registers a template, replacing any previous one with the same name
    pub fn register(&mut self, archetype: Archetype) -> Option<Archetype> {
        self.templates.insert(archetype.name.clone(), archetype)
    }

    pub fn get(&self, name: &str) -> Option<&Archetype> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Built-in templates: three climbable map pieces and the elimination zone
pub fn default_archetypes() -> Vec<Archetype> {
    vec![
        Archetype::new(
            "Stairs",
            vec![
                TileLayer::new("Ground", 0, 12, 1.0),
                TileLayer::new("Decoration", 2, 6, 1.0),
            ],
        ),
        Archetype::new(
            "Zigzag",
            vec![
                TileLayer::new("Ground", -2, 14, 1.0),
                TileLayer::new("Platforms", 0, 9, 1.0),
            ],
        ),
        Archetype::new("Ledges", vec![TileLayer::new("Ground", 0, 10, 1.0)]),
        Archetype::new("KillZone", vec![TileLayer::new("Hazard", 0, 2, 1.0)]),
    ]
}
