//! Meeting status and kind types shared by the store and the lifecycle.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Status of a meeting row.
///
/// A meeting is "live" while its status is outside the terminal set; at most
/// one live row exists per bot id (enforced by a partial unique index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Joining,
    Active,
    Leaving,
    Inactive,
    Completed,
    Failed,
}

/// Statuses from which no further transitions happen.
pub const TERMINAL_STATUSES: [MeetingStatus; 3] = [
    MeetingStatus::Completed,
    MeetingStatus::Inactive,
    MeetingStatus::Failed,
];

/// Transient statuses the stuck sweep watches for.
pub const STUCK_CANDIDATE_STATUSES: [MeetingStatus; 2] =
    [MeetingStatus::Joining, MeetingStatus::Active];

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Leaving => "leaving",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<MeetingStatus> {
        match s {
            "joining" => Ok(Self::Joining),
            "active" => Ok(Self::Active),
            "leaving" => Ok(Self::Leaving),
            "inactive" => Ok(Self::Inactive),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => anyhow::bail!("Invalid meeting status: {}", s),
        }
    }

    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(self)
    }

    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }
}

/// Whether a row is backed by a provider bot or is a local session.
///
/// Sessions skip the `leaving` handshake on shutdown and go straight to
/// `inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingKind {
    Bot,
    Session,
}

impl MeetingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Session => "session",
        }
    }

    pub fn parse(s: &str) -> Result<MeetingKind> {
        match s {
            "bot" => Ok(Self::Bot),
            "session" => Ok(Self::Session),
            _ => anyhow::bail!("Invalid meeting kind: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(MeetingStatus::Joining.as_str(), "joining");
        assert_eq!(MeetingStatus::Active.as_str(), "active");
        assert_eq!(MeetingStatus::Leaving.as_str(), "leaving");
        assert_eq!(MeetingStatus::Inactive.as_str(), "inactive");
        assert_eq!(MeetingStatus::Completed.as_str(), "completed");
        assert_eq!(MeetingStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            MeetingStatus::Joining,
            MeetingStatus::Active,
            MeetingStatus::Leaving,
            MeetingStatus::Inactive,
            MeetingStatus::Completed,
            MeetingStatus::Failed,
        ] {
            assert_eq!(MeetingStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(MeetingStatus::parse("paused").is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MeetingStatus::Leaving).unwrap();
        assert_eq!(json, "\"leaving\"");

        let parsed: MeetingStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, MeetingStatus::Completed);
    }

    #[test]
    fn test_terminal_and_live_sets() {
        assert!(MeetingStatus::Completed.is_terminal());
        assert!(MeetingStatus::Inactive.is_terminal());
        assert!(MeetingStatus::Failed.is_terminal());

        assert!(MeetingStatus::Joining.is_live());
        assert!(MeetingStatus::Active.is_live());
        assert!(MeetingStatus::Leaving.is_live());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(MeetingKind::parse("bot").unwrap(), MeetingKind::Bot);
        assert_eq!(MeetingKind::parse("session").unwrap(), MeetingKind::Session);
        assert!(MeetingKind::parse("webinar").is_err());
    }
}
