//! # Daemon Enumerator
//!
//! Client-side proxy for a directory listing produced by a remote daemon.
//!
//! The daemon pushes file records to an endpoint owned by the enumerator, in
//! batches, followed by a single `Done`. Consumers pull those records back out
//! in one of two modes fixed at creation:
//!
//! - **Sync**: [`Enumerator::next_one`] blocks the calling thread until an entry
//!   is available, the listing ends, or a timeout elapses. Waiting only ever
//!   processes this enumerator's own traffic.
//! - **Async**: [`Enumerator::next_batch`] returns a [`BatchFuture`] that
//!   completes exactly once with up to `n` entries, when enough are buffered,
//!   the listing ends, a deadline elapses, or a cancellation token fires.
//!
//! When the requested attributes include the `metadata` namespace and a
//! [`MetadataStore`] is supplied, entries are augmented with locally stored
//! `metadata::*` attributes before delivery.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use daemon_enumerator::{
//!     Container, EndpointMap, Enumerator, EnumeratorMessage, FileInfo, Mode, NextFile,
//! };
//!
//! let registry = Arc::new(EndpointMap::new());
//! let enumerator = Enumerator::create(
//!     Container::new("home", "/docs"),
//!     "standard::name",
//!     Mode::Sync,
//!     registry.clone(),
//! )?;
//!
//! // The transport delivers daemon pushes through the registry.
//! registry.dispatch(
//!     enumerator.endpoint(),
//!     EnumeratorMessage::Info(vec![br#"{"standard::name":"a.txt"}"#.to_vec()]),
//! )?;
//! registry.dispatch(enumerator.endpoint(), EnumeratorMessage::Done)?;
//!
//! let first = enumerator.next_one(Duration::from_secs(1))?.into_entry();
//! assert_eq!(first.as_ref().and_then(FileInfo::name), Some("a.txt"));
//! assert_eq!(enumerator.next_one(Duration::from_secs(1))?, NextFile::EndOfStream);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Non-blocking batch requests and their futures.
mod batch;

/// Ordered result buffer shared by both pull modes.
mod buffer;

/// Record decoding.
pub mod codec;

/// Timeout configuration.
pub mod config;

/// Endpoint paths, inbound messages and the endpoint registry.
pub mod endpoint;

/// The enumerator, its builder and its pull results.
pub mod enumerator;

/// Error types.
pub mod error;

/// File records and attribute values.
pub mod info;

/// Requested-attribute matching.
pub mod matcher;

/// Local metadata store and entry augmentation.
pub mod metadata;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use batch::BatchFuture;
pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use config::{EnumeratorConfig, DAEMON_TIMEOUT};
pub use endpoint::{
    DispatchScope, EndpointMap, EndpointPath, EndpointRegistry, EnumeratorMessage,
    MessageReceiver, RawRecord,
};
pub use enumerator::{Container, Enumerator, EnumeratorBuilder, Mode, NextFile};
pub use error::{EnumeratorError, RegistryError};
pub use info::{AttributeValue, FileInfo, STANDARD_NAME};
pub use matcher::AttributeMatcher;
pub use metadata::{InMemoryMetadataStore, MetaValue, MetadataStore, METADATA_NAMESPACE};
