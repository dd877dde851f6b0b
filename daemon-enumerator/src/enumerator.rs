//! The enumerator: a local iterator over a daemon-driven directory listing.
//!
//! # Lifecycle
//!
//! 1. **Built** by [`EnumeratorBuilder::build`]: id allocated, matcher parsed,
//!    metadata store bound if `metadata::*` was requested, endpoint registered
//! 2. **Fed** by the daemon through its endpoint (`Info` batches, then `Done`)
//! 3. **Pulled** with [`Enumerator::next_one`] (sync mode) or
//!    [`Enumerator::next_batch`] (async mode)
//! 4. **Closed** explicitly with [`Enumerator::close`], or on drop
//!
//! The mode is fixed at build time. Sync enumerators register their endpoint in a
//! private dispatch scope and block on their own condition variable; async
//! enumerators never block and complete batch requests through a [`BatchFuture`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::batch::{self, BatchFuture, Completion, PendingBatch, Trigger};
use crate::buffer::{Pop, Registration, ResultBuffer};
use crate::codec::{JsonCodec, MessageCodec};
use crate::config::EnumeratorConfig;
use crate::endpoint::{
    DispatchScope, EndpointPath, EndpointRegistry, EnumeratorMessage, MessageReceiver, RawRecord,
};
use crate::error::EnumeratorError;
use crate::info::FileInfo;
use crate::matcher::AttributeMatcher;
use crate::metadata::{MetadataAugmenter, MetadataStore};

/// Process-wide enumerator id counter. Ids are never reused.
static NEXT_ENUMERATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Consumption mode, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Blocking, one entry at a time.
    Sync,
    /// Non-blocking, batches of entries.
    Async,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sync => write!(f, "sync"),
            Mode::Async => write!(f, "async"),
        }
    }
}

/// The directory being listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Mount the directory lives on; also the metadata store scope.
    pub mount: String,
    /// Absolute path of the directory inside the mount.
    pub path: String,
}

impl Container {
    /// Create a container description.
    pub fn new(mount: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            path: path.into(),
        }
    }
}

/// Outcome of a blocking pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextFile {
    /// The next entry in listing order.
    Entry(FileInfo),
    /// The listing is complete (or the enumerator was closed).
    EndOfStream,
    /// Nothing arrived within the timeout; the caller may retry.
    TimedOut,
}

impl NextFile {
    /// The entry, if this is one.
    pub fn into_entry(self) -> Option<FileInfo> {
        match self {
            NextFile::Entry(info) => Some(info),
            NextFile::EndOfStream | NextFile::TimedOut => None,
        }
    }

    /// Whether the listing has ended.
    pub fn is_end(&self) -> bool {
        matches!(self, NextFile::EndOfStream)
    }
}

/// State shared between the enumerator, its endpoint registration and its
/// batch watchdogs.
struct EnumeratorCore<C: MessageCodec> {
    path: EndpointPath,
    buffer: ResultBuffer,
    /// Dropped on close, releasing the matcher and the store handle.
    augmenter: RwLock<Option<MetadataAugmenter>>,
    codec: C,
    records_received: AtomicU64,
    records_dropped: AtomicU64,
}

impl<C: MessageCodec> EnumeratorCore<C> {
    fn on_info(&self, records: Vec<RawRecord>) {
        let mut batch = Vec::with_capacity(records.len());
        for record in &records {
            match self.codec.decode::<FileInfo>(record) {
                Ok(info) => batch.push(info),
                Err(e) => {
                    tracing::warn!(
                        endpoint = %self.path,
                        error = %e,
                        "failed to decode file info, skipping"
                    );
                    self.records_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.records_received
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        if let Some(completion) = self.buffer.append(batch) {
            self.dispatch(completion);
        }
    }

    fn on_done(&self) {
        tracing::debug!(endpoint = %self.path, "listing done");
        if let Some(completion) = self.buffer.mark_done() {
            self.dispatch(completion);
        }
    }

    fn augment(&self, info: &mut FileInfo) {
        if let Some(augmenter) = self.augmenter.read().as_ref() {
            augmenter.augment(info);
        }
    }

    fn dispatch(&self, completion: Completion) {
        completion.dispatch(|info| self.augment(info));
    }

    fn complete(&self, id: u64, trigger: Trigger) {
        if let Some(completion) = self.buffer.complete(id, trigger) {
            self.dispatch(completion);
        }
    }
}

impl<C: MessageCodec> MessageReceiver for EnumeratorCore<C> {
    fn receive(&self, message: EnumeratorMessage) {
        match message {
            EnumeratorMessage::Info(records) => self.on_info(records),
            EnumeratorMessage::Done => self.on_done(),
        }
    }
}

/// Builder for [`Enumerator`].
///
/// # Example
///
/// ```rust,ignore
/// let enumerator = EnumeratorBuilder::new(Container::new("home", "/docs"), registry)
///     .attributes("standard::name,metadata::*")
///     .mode(Mode::Async)
///     .metadata_store(store)
///     .build()?;
/// ```
pub struct EnumeratorBuilder<C: MessageCodec = JsonCodec> {
    container: Container,
    registry: Arc<dyn EndpointRegistry>,
    attributes: String,
    mode: Mode,
    store: Option<Arc<dyn MetadataStore>>,
    config: EnumeratorConfig,
    runtime: Option<Handle>,
    codec: C,
}

impl EnumeratorBuilder<JsonCodec> {
    /// Start building an enumerator for `container` that registers with `registry`.
    ///
    /// Defaults: all attributes (`*`), sync mode, no metadata store, default
    /// config, JSON records.
    pub fn new(container: Container, registry: Arc<dyn EndpointRegistry>) -> Self {
        Self {
            container,
            registry,
            attributes: "*".to_string(),
            mode: Mode::Sync,
            store: None,
            config: EnumeratorConfig::default(),
            runtime: None,
            codec: JsonCodec,
        }
    }
}

impl<C: MessageCodec> EnumeratorBuilder<C> {
    /// Requested attributes, e.g. `standard::name,metadata::*`.
    pub fn attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = attributes.into();
        self
    }

    /// Consumption mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Metadata store to layer onto entries. Only bound if the requested
    /// attributes cover the `metadata` namespace.
    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Timeout configuration.
    pub fn config(mut self, config: EnumeratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime on which async deadlines and cancellation observers run.
    ///
    /// Defaults to the runtime current at [`build`](Self::build) time.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Codec used to decode pushed records.
    pub fn codec<C2: MessageCodec>(self, codec: C2) -> EnumeratorBuilder<C2> {
        EnumeratorBuilder {
            container: self.container,
            registry: self.registry,
            attributes: self.attributes,
            mode: self.mode,
            store: self.store,
            config: self.config,
            runtime: self.runtime,
            codec,
        }
    }

    /// Create the enumerator and register its endpoint.
    ///
    /// The endpoint is registered before this returns, so no push addressed to
    /// the new enumerator can be lost.
    ///
    /// # Errors
    ///
    /// - [`EnumeratorError::Registration`] if the endpoint cannot be registered
    /// - [`EnumeratorError::NoRuntime`] for async mode outside a Tokio runtime
    pub fn build(self) -> Result<Enumerator<C>, EnumeratorError> {
        let runtime = match self.mode {
            Mode::Sync => None,
            Mode::Async => Some(
                self.runtime
                    .or_else(|| Handle::try_current().ok())
                    .ok_or(EnumeratorError::NoRuntime)?,
            ),
        };

        let id = NEXT_ENUMERATOR_ID.fetch_add(1, Ordering::Relaxed);
        let path = EndpointPath::for_enumerator(id);

        let matcher = AttributeMatcher::new(&self.attributes);
        let augmenter = MetadataAugmenter::new(
            matcher,
            self.store,
            &self.container.mount,
            &self.container.path,
        );
        let has_metadata = augmenter.has_store();

        let core = Arc::new(EnumeratorCore {
            path: path.clone(),
            buffer: ResultBuffer::new(),
            augmenter: RwLock::new(Some(augmenter)),
            codec: self.codec,
            records_received: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        });

        let scope = match self.mode {
            Mode::Sync => DispatchScope::Private,
            Mode::Async => DispatchScope::Shared,
        };
        let receiver: Arc<dyn MessageReceiver> = core.clone();
        if let Err(source) = self.registry.register(&path, receiver, scope) {
            tracing::warn!(endpoint = %path, error = %source, "endpoint registration failed");
            return Err(EnumeratorError::Registration { path, source });
        }

        tracing::debug!(
            endpoint = %path,
            mode = %self.mode,
            container = %self.container.path,
            metadata = has_metadata,
            "enumerator created"
        );

        Ok(Enumerator {
            id,
            mode: self.mode,
            core,
            registry: self.registry,
            runtime,
            config: self.config,
            closed: AtomicBool::new(false),
            next_request: AtomicU64::new(1),
        })
    }
}

/// Client-side proxy for a remote directory listing.
///
/// Entries come out in exactly the order the daemon pushed them, whichever pull
/// is used and however batches are split.
pub struct Enumerator<C: MessageCodec = JsonCodec> {
    id: u64,
    mode: Mode,
    core: Arc<EnumeratorCore<C>>,
    registry: Arc<dyn EndpointRegistry>,
    runtime: Option<Handle>,
    config: EnumeratorConfig,
    closed: AtomicBool,
    next_request: AtomicU64,
}

impl Enumerator<JsonCodec> {
    /// Shorthand for [`EnumeratorBuilder`] with the given attributes and mode.
    ///
    /// # Errors
    ///
    /// See [`EnumeratorBuilder::build`].
    pub fn create(
        container: Container,
        attributes: &str,
        mode: Mode,
        registry: Arc<dyn EndpointRegistry>,
    ) -> Result<Self, EnumeratorError> {
        EnumeratorBuilder::new(container, registry)
            .attributes(attributes)
            .mode(mode)
            .build()
    }
}

impl<C: MessageCodec> Enumerator<C> {
    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mode fixed at creation.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Path the daemon pushes results to.
    pub fn endpoint(&self) -> &EndpointPath {
        &self.core.path
    }

    /// Number of entries received but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.core.buffer.len()
    }

    /// Whether the daemon has signalled the end of the listing.
    pub fn is_done(&self) -> bool {
        self.core.buffer.is_done()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Records successfully decoded from `Info` pushes.
    pub fn records_received(&self) -> u64 {
        self.core.records_received.load(Ordering::Relaxed)
    }

    /// Records skipped because they failed to decode.
    pub fn records_dropped(&self) -> u64 {
        self.core.records_dropped.load(Ordering::Relaxed)
    }

    /// Blocking pull of the next entry.
    ///
    /// Returns immediately if an entry is buffered or the listing has ended;
    /// otherwise blocks the calling thread until one of those happens or
    /// `timeout` elapses. Only one `next_one` call should be in flight at a time.
    ///
    /// # Errors
    ///
    /// [`EnumeratorError::WrongMode`] on an async enumerator.
    pub fn next_one(&self, timeout: Duration) -> Result<NextFile, EnumeratorError> {
        if self.mode != Mode::Sync {
            return Err(EnumeratorError::WrongMode { mode: self.mode });
        }

        let pop = match self.core.buffer.pop_front() {
            Some(info) => Pop::Entry(info),
            None => self.core.buffer.wait_pop(timeout),
        };
        match pop {
            Pop::Entry(mut info) => {
                self.core.augment(&mut info);
                Ok(NextFile::Entry(info))
            }
            Pop::End => Ok(NextFile::EndOfStream),
            Pop::TimedOut => {
                tracing::debug!(endpoint = %self.core.path, ?timeout, "no entry within timeout");
                Ok(NextFile::TimedOut)
            }
        }
    }

    /// [`next_one`](Self::next_one) with the configured sync timeout.
    ///
    /// # Errors
    ///
    /// See [`next_one`](Self::next_one).
    pub fn next_file(&self) -> Result<NextFile, EnumeratorError> {
        self.next_one(self.config.sync_timeout)
    }

    /// Non-blocking request for up to `n` entries.
    ///
    /// The returned future resolves with exactly `n` entries once that many are
    /// buffered, with fewer if the listing ends or `deadline` elapses first, or
    /// with [`EnumeratorError::Cancelled`] if `cancel` fires first. A cancelled
    /// request leaves buffered entries in place for the next request.
    ///
    /// # Errors
    ///
    /// Reported synchronously, without any remote interaction:
    /// - [`EnumeratorError::WrongMode`] on a sync enumerator
    /// - [`EnumeratorError::BatchPending`] while another request is outstanding
    /// - [`EnumeratorError::InvalidBatchSize`] if `n` is zero
    /// - [`EnumeratorError::Closed`] after close
    pub fn next_batch(
        &self,
        n: usize,
        cancel: Option<CancellationToken>,
        deadline: Duration,
    ) -> Result<BatchFuture, EnumeratorError> {
        if self.mode != Mode::Async {
            return Err(EnumeratorError::WrongMode { mode: self.mode });
        }
        if n == 0 {
            return Err(EnumeratorError::InvalidBatchSize);
        }
        let runtime = self.runtime.as_ref().ok_or(EnumeratorError::NoRuntime)?;

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();

        match self
            .core
            .buffer
            .register_batch(PendingBatch::new(id, n, reply))?
        {
            Registration::Completed(completion) => self.core.dispatch(completion),
            Registration::Waiting => {
                let core: Weak<EnumeratorCore<C>> = Arc::downgrade(&self.core);
                let watchdog = runtime.spawn(async move {
                    let trigger = batch::wait_for_trigger(deadline, cancel).await;
                    if let Some(core) = core.upgrade() {
                        core.complete(id, trigger);
                    }
                });
                self.core.buffer.arm(id, watchdog.abort_handle());
            }
        }

        Ok(BatchFuture::new(receiver, id))
    }

    /// [`next_batch`](Self::next_batch) with the configured batch deadline.
    ///
    /// # Errors
    ///
    /// See [`next_batch`](Self::next_batch).
    pub fn next_files(
        &self,
        n: usize,
        cancel: Option<CancellationToken>,
    ) -> Result<BatchFuture, EnumeratorError> {
        self.next_batch(n, cancel, self.config.batch_deadline)
    }

    /// Close the enumerator.
    ///
    /// Unregisters the endpoint, discards buffered entries, releases the matcher
    /// and metadata store, cancels an outstanding batch request and wakes a
    /// blocked [`next_one`](Self::next_one) with end-of-stream. Nothing is sent to
    /// the daemon. Never blocks; calling it again is a no-op that also succeeds.
    pub fn close(&self) -> Result<(), EnumeratorError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if self.registry.unregister(&self.core.path).is_none() {
            tracing::debug!(endpoint = %self.core.path, "endpoint already unregistered");
        }

        let (discarded, completion) = self.core.buffer.close();
        self.core.augmenter.write().take();
        if let Some(completion) = completion {
            completion.dispatch(|_| {});
        }

        tracing::debug!(endpoint = %self.core.path, discarded, "enumerator closed");
        Ok(())
    }

    /// Asynchronous close.
    ///
    /// # Errors
    ///
    /// [`EnumeratorError::Cancelled`] if `cancel` has already fired; the
    /// enumerator is left open in that case.
    pub async fn close_async(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), EnumeratorError> {
        tokio::task::yield_now().await;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(EnumeratorError::Cancelled);
        }
        self.close()
    }
}

impl<C: MessageCodec> Drop for Enumerator<C> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<C: MessageCodec> fmt::Debug for Enumerator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerator")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("endpoint", &self.core.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
