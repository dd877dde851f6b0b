//! EndpointMap: path → receiver routing.
//!
//! Routes inbound enumerator messages by endpoint path to registered receivers.
//! Lookups clone the receiver out of the map before delivering, so a receiver
//! never runs while the map lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::message::EnumeratorMessage;
use super::EndpointPath;
use crate::error::RegistryError;

/// Trait for receiving messages dispatched to an endpoint.
///
/// `receive` is called synchronously on the dispatching thread, which may differ
/// from the thread that consumes the enumerator.
pub trait MessageReceiver: Send + Sync {
    /// Handle one inbound message.
    fn receive(&self, message: EnumeratorMessage);
}

/// Which dispatcher serves an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchScope {
    /// Served by the shared, process-wide dispatcher.
    Shared,
    /// Served by a private context owned by one enumerator. Waiting on it never
    /// processes traffic addressed to other endpoints.
    Private,
}

/// Where enumerators register their endpoints.
pub trait EndpointRegistry: Send + Sync {
    /// Register `receiver` under `path`.
    ///
    /// # Errors
    ///
    /// Fails if the path is already taken or the registry no longer accepts
    /// registrations.
    fn register(
        &self,
        path: &EndpointPath,
        receiver: Arc<dyn MessageReceiver>,
        scope: DispatchScope,
    ) -> Result<(), RegistryError>;

    /// Remove the receiver registered under `path`, returning it if present.
    fn unregister(&self, path: &EndpointPath) -> Option<Arc<dyn MessageReceiver>>;
}

struct Registration {
    receiver: Arc<dyn MessageReceiver>,
    scope: DispatchScope,
}

/// In-process endpoint registry.
///
/// # Design
///
/// - Receivers keyed by full path in a `RwLock<HashMap>`
/// - Duplicate paths are rejected rather than replaced
/// - After [`shutdown`](EndpointMap::shutdown) new registrations fail
pub struct EndpointMap {
    endpoints: RwLock<HashMap<EndpointPath, Registration>>,
    shut_down: AtomicBool,

    /// Counters for metrics and debugging.
    registration_count: AtomicU64,
    deregistration_count: AtomicU64,
}

impl Default for EndpointMap {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointMap {
    /// Create a new empty endpoint map.
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
            registration_count: AtomicU64::new(0),
            deregistration_count: AtomicU64::new(0),
        }
    }

    /// Look up a receiver by path.
    pub fn get(&self, path: &EndpointPath) -> Option<Arc<dyn MessageReceiver>> {
        self.endpoints
            .read()
            .get(path)
            .map(|r| Arc::clone(&r.receiver))
    }

    /// Scope an endpoint was registered with.
    pub fn scope_of(&self, path: &EndpointPath) -> Option<DispatchScope> {
        self.endpoints.read().get(path).map(|r| r.scope)
    }

    /// Deliver `message` to the receiver registered under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is registered there.
    pub fn dispatch(
        &self,
        path: &EndpointPath,
        message: EnumeratorMessage,
    ) -> Result<(), RegistryError> {
        let receiver = self.get(path).ok_or_else(|| {
            tracing::debug!(endpoint = %path, "dispatch to unknown endpoint");
            RegistryError::NotFound { path: path.clone() }
        })?;
        receiver.receive(message);
        Ok(())
    }

    /// Stop accepting new registrations. Existing endpoints keep working.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    /// Get the number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Whether no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Get total registration count (for metrics).
    pub fn registration_count(&self) -> u64 {
        self.registration_count.load(Ordering::Relaxed)
    }

    /// Get total deregistration count (for metrics).
    pub fn deregistration_count(&self) -> u64 {
        self.deregistration_count.load(Ordering::Relaxed)
    }
}

impl EndpointRegistry for EndpointMap {
    fn register(
        &self,
        path: &EndpointPath,
        receiver: Arc<dyn MessageReceiver>,
        scope: DispatchScope,
    ) -> Result<(), RegistryError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RegistryError::Shutdown);
        }

        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(path) {
            return Err(RegistryError::AlreadyRegistered { path: path.clone() });
        }
        endpoints.insert(path.clone(), Registration { receiver, scope });
        self.registration_count.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(endpoint = %path, ?scope, "endpoint registered");
        Ok(())
    }

    fn unregister(&self, path: &EndpointPath) -> Option<Arc<dyn MessageReceiver>> {
        let removed = self.endpoints.write().remove(path)?;
        self.deregistration_count.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(endpoint = %path, "endpoint unregistered");
        Some(removed.receiver)
    }
}
