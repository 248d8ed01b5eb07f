//! Profiles - isolated progress namespaces.
//!
//! A profile owns all mutable progress state (completion sets, preferences,
//! prestige records). Switching profiles swaps the entire persistence
//! namespace; deleting one archives its id so the stored data can never be
//! silently reused by a new profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ProfileId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub faction: Faction,
    pub level: u32,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(name: impl Into<String>, faction: Faction, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ProfileId::new(),
            name: name.into(),
            faction,
            level: 1,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Faction {
    Usec,
    Bear,

    /// Forward-compatibility fallback for newer variants.
    #[serde(other)]
    Unknown,
}

impl Default for Faction {
    fn default() -> Self {
        Faction::Usec
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Usec => write!(f, "USEC"),
            Faction::Bear => write!(f, "BEAR"),
            Faction::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for Faction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USEC" => Ok(Faction::Usec),
            "BEAR" => Ok(Faction::Bear),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faction_round_trips_through_display_and_from_str() {
        for faction in [Faction::Usec, Faction::Bear] {
            let text = faction.to_string();
            assert_eq!(text.parse::<Faction>(), Ok(faction));
        }
    }

    #[test]
    fn unknown_faction_text_decodes_to_fallback() {
        let faction: Faction = serde_json::from_str("\"SCAV\"").expect("decode");
        assert_eq!(faction, Faction::Unknown);
    }
}
