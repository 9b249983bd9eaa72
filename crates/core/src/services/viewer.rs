//! Identity of whoever is asking.

/// The caller as seen by the engine.
///
/// Session handling lives outside this crate; callers hand over either the
/// authenticated user id or nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Viewer {
    /// No session.
    #[default]
    Anonymous,
    /// An authenticated user.
    User(String),
}

impl Viewer {
    /// Create a viewer for an authenticated user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Build a viewer from an optional session user id.
    #[must_use]
    pub fn from_session(user_id: Option<String>) -> Self {
        user_id.map_or(Self::Anonymous, Self::User)
    }

    /// The user id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }

    /// Whether this viewer has no session.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}
