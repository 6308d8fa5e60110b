//! Current-user identity

use crate::TripError;

/// Supplies the signed-in user's id, if any
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<String>;
}

/// Identity fixed at construction, typically taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn from_option(user_id: Option<String>) -> Self {
        Self { user_id }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        self.user_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .cloned()
    }
}

/// The current user's id, or `Unauthenticated` when nobody is signed in
pub fn require_user(identity: &dyn IdentityProvider) -> Result<String, TripError> {
    identity.current_user().ok_or(TripError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_user() {
        assert_eq!(require_user(&StaticIdentity::new("uid-1")).unwrap(), "uid-1");
        assert!(matches!(
            require_user(&StaticIdentity::anonymous()),
            Err(TripError::Unauthenticated)
        ));
    }

    #[test]
    fn test_blank_id_is_anonymous() {
        assert_eq!(StaticIdentity::new("  ").current_user(), None);
        assert_eq!(StaticIdentity::from_option(None).current_user(), None);
    }
}
