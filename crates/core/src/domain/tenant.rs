use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner of a set of financial records. Each signed-in user is their own tenant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    /// Returns `None` for a blank user id so callers can short-circuit before any lookup.
    pub fn from_user_id(user_id: &str) -> Option<Self> {
        let trimmed = user_id.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn blank_user_ids_do_not_form_a_tenant() {
        assert_eq!(TenantId::from_user_id(""), None);
        assert_eq!(TenantId::from_user_id("   "), None);
        assert_eq!(TenantId::from_user_id(" user-1 "), Some(TenantId("user-1".to_string())));
    }
}
