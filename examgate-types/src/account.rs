use crate::AccountId;
use serde::{Deserialize, Serialize};

/// A signed-in account as reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Provider-assigned identifier.
    pub id: AccountId,
    /// Email the account signed in with.
    pub email: String,
}

impl Account {
    /// Creates an account record.
    pub fn new(id: AccountId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}
