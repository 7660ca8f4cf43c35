//! Author identity.

use super::id::{ObjectId, SpaceId};
use serde::{Deserialize, Serialize};

/// How an author identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorSource {
    /// Found through the account type marker.
    TypeMarker,
    /// Found by the operator's own wallet address as entity name.
    OperatorAddress,
    /// Found by a wallet-address-shaped name.
    AddressPattern,
    /// Not found; creation ops were synthesised for it.
    Synthesized,
}

/// The on-graph object recorded as the creator of every mutation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorIdentity {
    /// Entity id of the author object.
    pub id: ObjectId,
    /// Space the author object lives in.
    pub space: SpaceId,
    /// Wallet address the author object is named after.
    pub address: String,
    /// How the identity was obtained.
    pub source: AuthorSource,
}

impl AuthorIdentity {
    /// Returns `true` if the author object already exists in the space.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.source != AuthorSource::Synthesized
    }
}
