//! Which participants take part in a session.
//!
//! The reviewing service runs either the standard four-member bench or the
//! extended bench that adds social justice. Both are expressed as a `Roster`;
//! roster order is the canonical display order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterVariant {
    #[default]
    Standard,
    Extended,
}

impl FromStr for RosterVariant {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "4" => Ok(Self::Standard),
            "extended" | "5" => Ok(Self::Extended),
            other => Err(format!("unknown roster variant: {other}")),
        }
    }
}

impl fmt::Display for RosterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    members: Vec<ParticipantId>,
}

impl Roster {
    pub fn standard() -> Self {
        Self {
            members: vec![
                ParticipantId::Transparency,
                ParticipantId::Equity,
                ParticipantId::Legality,
                ParticipantId::Accountability,
            ],
        }
    }

    pub fn extended() -> Self {
        Self {
            members: ParticipantId::ALL.to_vec(),
        }
    }

    pub fn for_variant(variant: RosterVariant) -> Self {
        match variant {
            RosterVariant::Standard => Self::standard(),
            RosterVariant::Extended => Self::extended(),
        }
    }

    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.members.contains(&id)
    }

    /// Resolve a wire key to a member of this roster.
    pub fn resolve(&self, key: &str) -> Option<ParticipantId> {
        ParticipantId::from_key(key).filter(|id| self.contains(*id))
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::standard()
    }
}
