use paybook_core::{DomainError, DomainResult, UserId};

/// The authenticated caller, as far as authorization is concerned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Allow the call only when the principal owns the store.
///
/// - No IO
/// - No panics
pub fn authorize_store(principal: &Principal, store_owner: UserId) -> DomainResult<()> {
    if principal.user_id == store_owner {
        Ok(())
    } else {
        tracing::warn!(user_id = %principal.user_id, "store access denied: not the owner");
        Err(DomainError::Unauthorized)
    }
}
