//! Configuration for enumerator timeouts.

use std::time::Duration;

/// Protocol-level timeout for daemon round trips.
pub const DAEMON_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeouts applied by the convenience pulls
/// ([`Enumerator::next_file`](crate::Enumerator::next_file) and
/// [`Enumerator::next_files`](crate::Enumerator::next_files)).
#[derive(Clone, Debug)]
pub struct EnumeratorConfig {
    /// How long a blocking pull waits for the daemon before handing control back.
    pub sync_timeout: Duration,

    /// Deadline after which a batch request completes with whatever is buffered.
    pub batch_deadline: Duration,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            sync_timeout: DAEMON_TIMEOUT,
            batch_deadline: DAEMON_TIMEOUT,
        }
    }
}

impl EnumeratorConfig {
    /// Create a configuration with explicit timeouts.
    pub fn new(sync_timeout: Duration, batch_deadline: Duration) -> Self {
        Self {
            sync_timeout,
            batch_deadline,
        }
    }

    /// Short timeouts for a daemon on the same host.
    pub fn local() -> Self {
        Self {
            sync_timeout: Duration::from_secs(5),
            batch_deadline: Duration::from_secs(1),
        }
    }

    /// Override the blocking-pull timeout.
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Override the batch deadline.
    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = deadline;
        self
    }
}
