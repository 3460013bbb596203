use paybook_auth::Principal;
use paybook_core::UserId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; every protected handler reads it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
}

impl PrincipalContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id)
    }
}
