//! Chunked PDF transfer sessions.
//!
//! A client streams a PDF as numbered chunks over a connection: `init`
//! declares the chunk count, `receive_chunk` fills slots in any order, and
//! `complete` assembles the bytes. Dropping the connection discards the
//! session and cancels a recovery still running on its bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::models::config::TransferConfig;
use crate::models::context::PdfContext;
use crate::pdf::{RecoveredText, RecoveryChain};

/// Identifies one client connection.
pub type ConnectionId = u64;

/// Describes the file being transferred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub trusted_source: bool,
}

impl TransferMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Cancellation {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // notify_one keeps a permit for a waiter that has not started yet
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

#[derive(Debug)]
struct Session {
    metadata: TransferMetadata,
    chunks: Vec<Option<Vec<u8>>>,
    received_bytes: usize,
}

/// Open transfer sessions, at most one per connection.
#[derive(Debug)]
pub struct TransferSessions {
    config: TransferConfig,
    sessions: HashMap<ConnectionId, Session>,
    in_flight: HashMap<ConnectionId, Weak<Cancellation>>,
}

impl TransferSessions {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Open a session expecting `total_chunks` chunks.
    pub fn init(
        &mut self,
        conn: ConnectionId,
        total_chunks: usize,
        metadata: TransferMetadata,
    ) -> Result<(), TransferError> {
        if self.sessions.contains_key(&conn) {
            return Err(TransferError::SessionExists(conn));
        }
        if total_chunks == 0 || total_chunks > self.config.max_chunks {
            return Err(TransferError::InvalidChunkCount {
                requested: total_chunks,
                limit: self.config.max_chunks,
            });
        }

        debug!(
            "Connection {} opened transfer of '{}' in {} chunks",
            conn, metadata.file_name, total_chunks
        );
        self.sessions.insert(
            conn,
            Session {
                metadata,
                chunks: vec![None; total_chunks],
                received_bytes: 0,
            },
        );
        Ok(())
    }

    /// Store chunk `index`. A repeated index replaces the earlier chunk.
    ///
    /// Returns how many distinct chunks have arrived.
    pub fn receive_chunk(
        &mut self,
        conn: ConnectionId,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<usize, TransferError> {
        let limit = self.config.max_total_bytes;
        let session = self
            .sessions
            .get_mut(&conn)
            .ok_or(TransferError::UnknownSession(conn))?;

        let total = session.chunks.len();
        let slot = session
            .chunks
            .get_mut(index)
            .ok_or(TransferError::IndexOutOfRange { index, total })?;

        let previous = slot.as_ref().map_or(0, Vec::len);
        let new_total = session.received_bytes - previous + bytes.len();
        if new_total > limit {
            warn!("Connection {} exceeded the {} byte transfer limit", conn, limit);
            return Err(TransferError::TooLarge { limit });
        }
        if slot.is_some() {
            debug!("Connection {} resent chunk {}", conn, index);
        }

        *slot = Some(bytes);
        session.received_bytes = new_total;
        Ok(session.chunks.iter().filter(|c| c.is_some()).count())
    }

    /// Assemble the chunks and close the session.
    ///
    /// A missing chunk is an error and also discards the session.
    pub fn complete(&mut self, conn: ConnectionId) -> Result<CompletedTransfer, TransferError> {
        let session = self
            .sessions
            .remove(&conn)
            .ok_or(TransferError::UnknownSession(conn))?;

        let total = session.chunks.len();
        if let Some(index) = session.chunks.iter().position(Option::is_none) {
            warn!(
                "Connection {} completed with chunk {} of {} missing",
                conn, index, total
            );
            return Err(TransferError::MissingChunk { index, total });
        }

        let mut bytes = Vec::with_capacity(session.received_bytes);
        for chunk in session.chunks.into_iter().flatten() {
            bytes.extend_from_slice(&chunk);
        }

        let cancel = Arc::new(Cancellation::default());
        self.in_flight.retain(|_, c| c.strong_count() > 0);
        self.in_flight.insert(conn, Arc::downgrade(&cancel));

        info!(
            "Connection {} transferred '{}' ({} bytes)",
            conn,
            session.metadata.file_name,
            bytes.len()
        );
        Ok(CompletedTransfer {
            connection: conn,
            metadata: session.metadata,
            bytes,
            cancel,
        })
    }

    /// Drop the connection's session and cancel its in-flight recovery.
    ///
    /// Returns whether there was anything to drop.
    pub fn disconnect(&mut self, conn: ConnectionId) -> bool {
        let had_session = self.sessions.remove(&conn).is_some();
        let cancelled = match self.in_flight.remove(&conn).and_then(|w| w.upgrade()) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        };
        if had_session || cancelled {
            info!("Connection {} disconnected, transfer discarded", conn);
        }
        had_session || cancelled
    }

    pub fn is_open(&self, conn: ConnectionId) -> bool {
        self.sessions.contains_key(&conn)
    }

    /// `(received, total)` chunk counts of an open session.
    pub fn progress(&self, conn: ConnectionId) -> Option<(usize, usize)> {
        self.sessions.get(&conn).map(|s| {
            (
                s.chunks.iter().filter(|c| c.is_some()).count(),
                s.chunks.len(),
            )
        })
    }
}

impl Default for TransferSessions {
    fn default() -> Self {
        Self::new(TransferConfig::default())
    }
}

/// The assembled bytes of a finished transfer.
#[derive(Debug)]
pub struct CompletedTransfer {
    connection: ConnectionId,
    metadata: TransferMetadata,
    bytes: Vec<u8>,
    cancel: Arc<Cancellation>,
}

impl CompletedTransfer {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run the recovery chain on the bytes; `None` once the connection drops.
    pub async fn recover(&self, chain: &RecoveryChain) -> Option<RecoveredText> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Recovery for connection {} cancelled", self.connection);
                None
            }
            text = chain.recover(&self.bytes) => Some(text),
        }
    }

    /// Hand the bytes to the scanner as a PDF input.
    pub fn into_pdf_context(self) -> PdfContext {
        let mut ctx = PdfContext::from_bytes(self.bytes, self.metadata.file_name)
            .trusted(self.metadata.trusted_source);
        ctx.source_message_id = self.metadata.message_id;
        ctx.attachment_id = self.metadata.attachment_id;
        ctx.language = self.metadata.language;
        ctx
    }
}
