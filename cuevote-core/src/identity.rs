use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// The durable key votes and suggestions are attributed to.
/// It survives reconnects, unlike a connection id.
pub type UserKey = String;

/// The role of a user account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Mod,
    Admin,
}

/// Who is issuing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A user with a verified session
    User { id: String, name: String, role: Role },
    /// A connection without a verified identity
    Guest { id: String },
}

impl Role {
    /// Moderators may remove any queue entry in any room
    pub fn is_moderator(&self) -> bool {
        matches!(self, Self::Mod | Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Mod => "mod",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "mod" => Ok(Self::Mod),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Unknown role {other}")),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Identity {
    pub fn guest(id: impl Into<String>) -> Self {
        Self::Guest { id: id.into() }
    }

    /// The key used for vote attribution.
    /// Guests are namespaced so a guest id can never collide with an account id.
    pub fn key(&self) -> UserKey {
        match self {
            Self::User { id, .. } => id.clone(),
            Self::Guest { id } => format!("guest:{id}"),
        }
    }

    /// The account id, if this is a verified user
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { id, .. } => Some(id),
            Self::Guest { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::User { name, .. } => name,
            Self::Guest { .. } => "Guest",
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::User { role, .. } => Some(*role),
            Self::Guest { .. } => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_keys_are_namespaced() {
        let guest = Identity::guest("abc");
        let user = Identity::User {
            id: "abc".into(),
            name: "Abc".into(),
            role: Role::User,
        };

        assert_ne!(guest.key(), user.key());
        assert_eq!(user.user_id(), Some("abc"));
        assert_eq!(guest.user_id(), None);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Mod, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }

        assert!("root".parse::<Role>().is_err());
        assert!(Role::Admin.is_moderator());
        assert!(!Role::User.is_moderator());
    }
}
