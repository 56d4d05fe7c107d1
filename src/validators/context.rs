//! Owner references and the validate-then-commit hand-off

use crate::store::{AssignmentStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Identifier of the record an identity value is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerRef(pub u64);

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for OwnerRef {
    fn from(id: u64) -> Self {
        OwnerRef(id)
    }
}

impl std::str::FromStr for OwnerRef {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(OwnerRef)
    }
}

/// An owner currently holding a given identity value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingOwner {
    pub owner: OwnerRef,

    /// Transient holders (guest records) never block assignment elsewhere
    #[serde(default)]
    pub exempt: bool,
}

impl ExistingOwner {
    pub fn new(owner: OwnerRef, exempt: bool) -> Self {
        Self { owner, exempt }
    }

    /// Whether this holder conflicts with assigning the value to `current`
    ///
    /// With no current owner every non-exempt holder conflicts.
    pub fn blocks(&self, current: Option<OwnerRef>) -> bool {
        !self.exempt && current != Some(self.owner)
    }
}

/// An identity value that passed validation and waits for its owner to exist
///
/// Returned by [`crate::engine::ValidationEngine::stage`] and consumed by
/// [`PendingAssignment::commit`] once the host has created the record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending assignment does nothing until committed"]
pub struct PendingAssignment {
    identity: String,
    owner: Option<OwnerRef>,
}

impl PendingAssignment {
    pub(crate) fn new(identity: String, owner: Option<OwnerRef>) -> Self {
        Self { identity, owner }
    }

    /// The accepted identity value
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Owner the value was validated for, if it already existed
    pub fn validated_for(&self) -> Option<OwnerRef> {
        self.owner
    }

    /// Store the value against `owner`
    pub async fn commit<S>(
        self,
        owner: OwnerRef,
        exempt: bool,
        store: &S,
    ) -> Result<(), StoreError>
    where
        S: AssignmentStore + ?Sized,
    {
        store.assign(owner, &self.identity, exempt).await?;
        info!("💾 Assigned identity to owner {}", owner);
        Ok(())
    }
}
