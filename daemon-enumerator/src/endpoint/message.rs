//! Messages the daemon pushes to an enumerator endpoint.

/// One undecoded file record as pushed by the daemon.
pub type RawRecord = Vec<u8>;

/// Inbound message delivered to an enumerator endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumeratorMessage {
    /// A batch of records, in listing order.
    Info(Vec<RawRecord>),
    /// The listing is complete. Sent once; later `Info` messages are ignored.
    Done,
}

impl EnumeratorMessage {
    /// Whether this is the terminal `Done` message.
    pub fn is_done(&self) -> bool {
        matches!(self, EnumeratorMessage::Done)
    }
}
