//! Inbound channel plumbing.
//!
//! Every enumerator owns one addressable endpoint on which the daemon pushes
//! results:
//!
//! - **EndpointPath**: unique, lifetime-scoped destination name
//! - **EnumeratorMessage**: the two inbound message kinds, `Info` and `Done`
//! - **EndpointRegistry**: where endpoints are registered and unregistered
//! - **EndpointMap**: in-process registry that routes messages by path
//!
//! The transport that carries messages to the registry is not part of this crate.

mod map;
mod message;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use map::{DispatchScope, EndpointMap, EndpointRegistry, MessageReceiver};
pub use message::{EnumeratorMessage, RawRecord};

/// Prefix shared by all enumerator endpoints.
pub const ENDPOINT_PREFIX: &str = "/client/enumerator/";

/// Addressable destination of one enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointPath(String);

impl EndpointPath {
    /// Path for the enumerator with the given id.
    pub fn for_enumerator(id: u64) -> Self {
        Self(format!("{}{}", ENDPOINT_PREFIX, id))
    }

    /// Wrap an arbitrary path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
