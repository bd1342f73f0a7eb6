use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a patient, therapist or admin, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Create a new ParticipantId using UUID v7 (time-sortable).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a ParticipantId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Account type, supplied by the auth layer with every request.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('patient', 'therapist', 'admin'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Therapist,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Therapist => write!(f, "therapist"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "therapist" => Ok(Role::Therapist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// An authenticated caller: who they are and what kind of account they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
}

/// Directory record for a user, used to decorate chat headers,
/// therapist listings, and notification emails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ParticipantId,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_num: Option<String>,
    pub profile_img: Option<String>,
    /// Therapists only.
    pub years_experience: Option<u32>,
    /// Therapists only: listed price per session.
    pub session_cost_cents: Option<u32>,
    /// Completed bookings; therapist listings are ranked by this.
    pub num_sessions: u32,
    /// Patients only: whether the single free trial was consumed.
    pub used_trial: bool,
}

impl UserProfile {
    /// "First Last", as shown in chat headers and emails.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Patient, Role::Therapist, Role::Admin] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
        assert!("doctor".parse::<Role>().is_err());
    }

    #[test]
    fn test_participant_id_serializes_as_plain_uuid() {
        let id = ParticipantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    #[test]
    fn test_full_name() {
        let profile = UserProfile {
            id: ParticipantId::new(),
            role: Role::Therapist,
            first_name: "Ada".to_string(),
            last_name: "Byron".to_string(),
            email: "ada@example.com".to_string(),
            phone_num: None,
            profile_img: None,
            years_experience: Some(12),
            session_cost_cents: Some(4500),
            num_sessions: 0,
            used_trial: false,
        };
        assert_eq!(profile.full_name(), "Ada Byron");
    }
}
