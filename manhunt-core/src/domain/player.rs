use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role held during a round - mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    /// Tries to catch every runner before the clock runs out
    Seeker,
    /// Tries to stay out of the catch radius until the clock runs out
    #[default]
    Runner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Seeker => write!(f, "Seeker"),
            Role::Runner => write!(f, "Runner"),
        }
    }
}

/// Errors that can occur when working with players
#[derive(Debug, thiserror::Error, PartialEq, Serialize, Deserialize)]
pub enum PlayerError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Name must be between 1 and 50 characters")]
    InvalidNameLength,
}

/// Domain entity representing one participant of the session
///
/// `id` is immutable and globally unique; the record outlives transient
/// disconnects of the peer carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier, stable for the whole session
    id: Uuid,
    /// Display name
    name: String,
    /// Whether this player created and owns the room
    is_host: bool,
    /// Lobby ready flag
    is_ready: bool,
    /// Role for the current round
    role: Role,
}

impl Player {
    /// Create a new hosting player
    pub fn new_host(name: impl Into<String>) -> Result<Self, PlayerError> {
        Self::with_id(Uuid::new_v4(), name, true)
    }

    /// Create a new non-hosting player
    pub fn new_guest(name: impl Into<String>) -> Result<Self, PlayerError> {
        Self::with_id(Uuid::new_v4(), name, false)
    }

    /// Create a player with an explicit id (snapshot application, tests)
    pub fn with_id(id: Uuid, name: impl Into<String>, is_host: bool) -> Result<Self, PlayerError> {
        let name = name.into();
        Self::validate_name(&name)?;

        Ok(Player {
            id,
            name,
            is_host,
            is_ready: false,
            role: Role::default(),
        })
    }

    fn validate_name(name: &str) -> Result<(), PlayerError> {
        if name.is_empty() {
            return Err(PlayerError::EmptyName);
        }
        if name.chars().count() > 50 {
            return Err(PlayerError::InvalidNameLength);
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_seeker(&self) -> bool {
        self.role == Role::Seeker
    }

    pub fn is_runner(&self) -> bool {
        self.role == Role::Runner
    }

    pub fn set_ready(&mut self, is_ready: bool) {
        self.is_ready = is_ready;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn set_host(&mut self, is_host: bool) {
        self.is_host = is_host;
    }

    /// Restore the locally known display name after a snapshot replace
    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}
