//! Authorization oracle seam.
//!
//! The oracle is the external source of truth for scope membership (a
//! ledger, an identity service). The seal consults it before every unseal.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use vaultline_core::Address;

use crate::error::{Result, SealError};

/// External membership lookup.
///
/// Implementations own their own retries and connection handling. An `Err`
/// means "unreachable", not "denied".
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    /// Whether `address` is currently a member of `scope_id`.
    async fn is_member(&self, scope_id: &str, address: &Address) -> Result<bool>;
}

/// An in-process oracle backed by a membership table.
#[derive(Debug, Default)]
pub struct StaticOracle {
    members: RwLock<HashMap<String, BTreeSet<Address>>>,
}

impl StaticOracle {
    /// Create an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `address` to `scope_id`.
    pub fn grant(&self, scope_id: &str, address: Address) -> Result<()> {
        let mut members = self.members.write().map_err(poisoned)?;
        members.entry(scope_id.to_string()).or_default().insert(address);
        Ok(())
    }

    /// Remove `address` from `scope_id`.
    pub fn revoke(&self, scope_id: &str, address: &Address) -> Result<()> {
        let mut members = self.members.write().map_err(poisoned)?;
        if let Some(set) = members.get_mut(scope_id) {
            set.remove(address);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationOracle for StaticOracle {
    async fn is_member(&self, scope_id: &str, address: &Address) -> Result<bool> {
        let members = self.members.read().map_err(poisoned)?;
        Ok(members
            .get(scope_id)
            .is_some_and(|set| set.contains(address)))
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SealError {
    SealError::OracleUnavailable("membership table lock poisoned".into())
}
