use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PropmediaError;

/// Role an image plays on a property page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Hero,
    Floorplan,
    Gallery,
}

const HERO_KEYWORDS: &[&str] = &["hero", "main", "front", "exterior"];
const FLOORPLAN_KEYWORDS: &[&str] = &["floorplan", "plan", "layout", "dimensions"];

/// Guess a file's role from its name.
///
/// Hero keywords are checked before floorplan keywords, so a name matching
/// both (`Hero-Floorplan.jpg`) is a hero. Anything else is gallery.
pub fn classify(filename: &str) -> Classification {
    let lower = filename.to_lowercase();

    if HERO_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Classification::Hero
    } else if FLOORPLAN_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Classification::Floorplan
    } else {
        Classification::Gallery
    }
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Hero => "hero",
            Classification::Floorplan => "floorplan",
            Classification::Gallery => "gallery",
        }
    }

    /// Hero and floorplan map to a single property field each
    pub fn is_singleton(&self) -> bool {
        !matches!(self, Classification::Gallery)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = PropmediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hero" => Ok(Classification::Hero),
            "floorplan" | "floor_plan" | "floor-plan" => Ok(Classification::Floorplan),
            "gallery" => Ok(Classification::Gallery),
            other => Err(PropmediaError::InvalidInput(format!(
                "unknown classification '{}': expected hero, floorplan or gallery",
                other
            ))),
        }
    }
}
