//! Entity identity and kind.
//!
//! Every server-owned record mirrored on the client implements [`Entity`]:
//! an opaque string ID unique within its kind, a mutable status used for
//! optimistic transitions, and an optional correlation key that ties a
//! locally synthesized record to the authoritative one that supersedes it.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Collections held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "edges")]
    Edge,
    #[serde(rename = "trades")]
    Trade,
    #[serde(rename = "strategies")]
    Strategy,
    #[serde(rename = "positions")]
    Position,
    #[serde(rename = "threat_alerts")]
    ThreatAlert,
    #[serde(rename = "kols")]
    Kol,
    #[serde(rename = "curve_tokens")]
    CurveToken,
}

impl EntityKind {
    /// All kinds, in display order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Edge,
        EntityKind::Trade,
        EntityKind::Strategy,
        EntityKind::Position,
        EntityKind::ThreatAlert,
        EntityKind::Kol,
        EntityKind::CurveToken,
    ];

    /// Collection name (also the serde name).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edges",
            Self::Trade => "trades",
            Self::Strategy => "strategies",
            Self::Position => "positions",
            Self::ThreatAlert => "threat_alerts",
            Self::Kol => "kols",
            Self::CurveToken => "curve_tokens",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses both collection names (`"edges"`) and push-topic segments (`"edge"`).
impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edge" | "edges" => Ok(Self::Edge),
            "trade" | "trades" => Ok(Self::Trade),
            "strategy" | "strategies" => Ok(Self::Strategy),
            "position" | "positions" => Ok(Self::Position),
            "threat" | "threats" | "threat_alert" | "threat_alerts" => Ok(Self::ThreatAlert),
            "kol" | "kols" => Ok(Self::Kol),
            "curve" | "curve_token" | "curve_tokens" => Ok(Self::CurveToken),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

/// Where a stored record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityOrigin {
    /// Returned by the server (full fetch or action response).
    #[default]
    Authoritative,
    /// Fabricated locally from a push event; superseded by the next
    /// authoritative record with the same correlation key.
    Synthetic,
}

/// Contract shared by every server-owned record.
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Status type driven by optimistic transitions.
    type Status: Copy + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Collection this entity lives in.
    const KIND: EntityKind;

    /// Opaque ID, unique within the kind.
    fn id(&self) -> &str;

    /// Current status.
    fn status(&self) -> Self::Status;

    /// Overwrite the status.
    fn set_status(&mut self, status: Self::Status);

    /// Terminal status applied when a user action on this entity fails.
    fn failure_status() -> Self::Status;

    /// Key tying this record to the event that created it.
    fn correlation_key(&self) -> Option<&str> {
        None
    }

    /// Whether this record was fabricated locally.
    fn is_synthetic(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_topic_segments_and_collection_names() {
        assert_eq!("edge".parse::<EntityKind>().unwrap(), EntityKind::Edge);
        assert_eq!("edges".parse::<EntityKind>().unwrap(), EntityKind::Edge);
        assert_eq!(
            "threat".parse::<EntityKind>().unwrap(),
            EntityKind::ThreatAlert
        );
        assert_eq!(
            "curve".parse::<EntityKind>().unwrap(),
            EntityKind::CurveToken
        );
        assert!("swarm".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_serde_uses_collection_names() {
        let json = serde_json::to_string(&EntityKind::ThreatAlert).unwrap();
        assert_eq!(json, "\"threat_alerts\"");

        let kinds: Vec<EntityKind> = serde_json::from_str(r#"["edges","kols"]"#).unwrap();
        assert_eq!(kinds, vec![EntityKind::Edge, EntityKind::Kol]);
    }

    #[test]
    fn test_kind_display_matches_as_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
