//! Read side: paginated access to a space's objects.
//!
//! [`GraphqlClient`] talks to the GraphQL read replica; [`InMemorySpace`]
//! holds a space in process and also implements the write side, for tests
//! and local rehearsals.

mod client;
mod memory;
mod queries;
mod reader;

pub use client::GraphqlClient;
pub use memory::{GovernanceScript, InMemorySpace, WriteCall, WriteKind};
pub use reader::{CountScope, EntityOrder, EntityQuery, GraphReader, Page, TypeFilter};
