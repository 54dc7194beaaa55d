//! Persistent FIFO of remote writes waiting for replay.
//!
//! The whole queue is one JSON array under [`PENDING_KEY`] and every change
//! rewrites it inside a single store transaction. Entries carry a unique id;
//! replayed entries are removed by id, so two operations with identical
//! payloads are still tracked separately.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use rand::Rng;
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::local_store::LocalStore;
use crate::model::{PendingOpType, PendingOperation};

pub const PENDING_KEY: &str = "movieshows_pending_sync";

#[derive(Debug, Clone)]
pub struct PendingQueue {
    store: Arc<LocalStore>,
}

impl PendingQueue {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Current queue as persisted. Unreadable data counts as empty.
    pub fn load(&self) -> Vec<PendingOperation> {
        self.store.load_or_default(PENDING_KEY)
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends an operation, applying the coalescing rules:
    ///
    /// * `preferences-save` replaces any earlier `preferences-save`; only the
    ///   newest payload is worth replaying.
    /// * `queue-add` for a title that is already pending is not added again.
    /// * `catalog-sync` always appends.
    ///
    /// Returns the entry that now represents this write.
    pub fn enqueue(
        &self,
        op_type: PendingOpType,
        payload: JsonValue,
    ) -> Result<PendingOperation, AppResponse> {
        let op = PendingOperation {
            id: mint_op_id(),
            op_type,
            payload,
            enqueued_at: Utc::now().timestamp_millis(),
        };

        let entry = self.store.update_json(PENDING_KEY, |queue: &mut Vec<PendingOperation>| {
            match op_type {
                PendingOpType::PreferencesSave => {
                    queue.retain(|existing| existing.op_type != PendingOpType::PreferencesSave);
                }
                PendingOpType::QueueAdd => {
                    let title = payload_title(&op.payload);
                    if let Some(existing) = queue.iter().find(|existing| {
                        existing.op_type == PendingOpType::QueueAdd
                            && title.is_some()
                            && payload_title(&existing.payload) == title
                    }) {
                        return existing.clone();
                    }
                }
                PendingOpType::CatalogSync => {}
            }
            queue.push(op.clone());
            op.clone()
        })?;

        info!("Queued {} for later sync ({})", entry.op_type.as_str(), entry.id);
        Ok(entry)
    }

    /// Drops the entries whose ids are in `replayed`, re-reading the queue
    /// first so operations enqueued meanwhile survive. Returns what is left.
    pub fn remove_ids(&self, replayed: &HashSet<String>) -> Result<usize, AppResponse> {
        if replayed.is_empty() {
            return Ok(self.len());
        }
        let remaining = self.store.update_json(PENDING_KEY, |queue: &mut Vec<PendingOperation>| {
            queue.retain(|op| !replayed.contains(&op.id));
            queue.len()
        })?;
        debug!("Removed {} replayed operations, {} remaining", replayed.len(), remaining);
        Ok(remaining)
    }

    /// Drops pending `queue-add` entries for `title` from `ops`, for use
    /// inside a caller's store transaction. Returns whether any were dropped.
    pub fn forget_queue_add(ops: &mut Vec<PendingOperation>, title: &str) -> bool {
        let before = ops.len();
        ops.retain(|op| {
            op.op_type != PendingOpType::QueueAdd || payload_title(&op.payload) != Some(title.trim())
        });
        before != ops.len()
    }

    pub fn clear(&self) -> Result<(), AppResponse> {
        self.store.put_json(PENDING_KEY, &Vec::<PendingOperation>::new())
    }
}

fn payload_title(payload: &JsonValue) -> Option<&str> {
    payload.get("title").and_then(JsonValue::as_str).map(str::trim)
}

fn mint_op_id() -> String {
    let nonce: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", Utc::now().timestamp_millis(), nonce)
}
