use serde::{Deserialize, Serialize};

/// The only tenant served today. Keys and paths already carry the prefix so
/// onboarding another client is a data change, not a schema change.
pub const DEFAULT_TENANT_ID: &str = "001";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn current() -> Self {
        Self::new(DEFAULT_TENANT_ID)
    }

    /// `TENANT#001`
    pub fn key_prefix(&self) -> String {
        format!("TENANT#{}", self.id)
    }

    /// `TENANT#001/`
    pub fn storage_prefix(&self) -> String {
        format!("{}/", self.key_prefix())
    }
}

impl Default for Tenant {
    fn default() -> Self {
        Self::current()
    }
}
