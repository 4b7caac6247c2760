use parley_types::{Message, MessageRole};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::storage::StorageEngine;

/// Width of the turn window in milliseconds
///
/// A user message whose timestamp is no later than an assistant message's
/// timestamp plus this window is ordered before that assistant message.
pub const TURN_WINDOW_MS: i64 = 10_000;

// Shifting assistant timestamps by the window turns the turn-window rule into
// a plain lexicographic key, which is a strict total order.
fn order_key(message: &Message) -> (i64, u8, u64, &str) {
    let ts = message.timestamp.timestamp_millis();
    match message.role {
        MessageRole::User => (ts, 0, message.sequence_or_default(), &message.id),
        MessageRole::Assistant => (
            ts.saturating_add(TURN_WINDOW_MS),
            1,
            message.sequence_or_default(),
            &message.id,
        ),
    }
}

/// Canonical conversational order of two messages
pub fn compare(a: &Message, b: &Message) -> Ordering {
    order_key(a).cmp(&order_key(b))
}

pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(compare);
}

/// True when ids are unique and sequences are exactly 1..N
pub fn is_consistent(messages: &[Message]) -> bool {
    let mut ids = HashSet::with_capacity(messages.len());
    let mut seqs = HashSet::with_capacity(messages.len());
    let n = messages.len() as u64;

    messages.iter().all(|m| {
        let in_range = m.sequence.is_some_and(|s| s >= 1 && s <= n);
        in_range && ids.insert(m.id.as_str()) && seqs.insert(m.sequence)
    })
}

/// Result of planning a repair without touching storage
#[derive(Debug, Clone)]
pub struct RepairPlan {
    /// Surviving messages in canonical order, numbered 1..N
    pub ordered: Vec<Message>,
    /// Rows that must be written back
    pub rewrites: Vec<Message>,
    /// Ids that had more than one stored row
    pub duplicate_ids: Vec<String>,
}

impl RepairPlan {
    pub fn is_noop(&self) -> bool {
        self.rewrites.is_empty() && self.duplicate_ids.is_empty()
    }
}

// Among rows sharing an id the latest timestamp wins; the rest of the key only
// makes the choice independent of input order.
fn supersedes(candidate: &Message, current: &Message) -> bool {
    (
        candidate.timestamp,
        candidate.sequence_or_default(),
        candidate.content.as_str(),
    ) > (
        current.timestamp,
        current.sequence_or_default(),
        current.content.as_str(),
    )
}

/// Deduplicate, sort and renumber a thread's rows
pub fn plan_repair(rows: Vec<Message>) -> RepairPlan {
    // 1. Keep one row per id
    let mut survivors: HashMap<String, Message> = HashMap::with_capacity(rows.len());
    let mut duplicates: HashSet<String> = HashSet::new();
    for row in rows {
        match survivors.get(&row.id) {
            Some(current) => {
                duplicates.insert(row.id.clone());
                if supersedes(&row, current) {
                    survivors.insert(row.id.clone(), row);
                }
            }
            None => {
                survivors.insert(row.id.clone(), row);
            }
        }
    }

    // 2. Canonical order
    let mut ordered: Vec<Message> = survivors.into_values().collect();
    sort_messages(&mut ordered);

    // 3. Dense numbering; duplicated ids are always rewritten because their
    //    rows get deleted before the survivor is put back
    let mut rewrites = Vec::new();
    for (index, message) in ordered.iter_mut().enumerate() {
        let wanted = index as u64 + 1;
        if message.sequence != Some(wanted) || duplicates.contains(&message.id) {
            message.sequence = Some(wanted);
            rewrites.push(message.clone());
        }
    }

    let mut duplicate_ids: Vec<String> = duplicates.into_iter().collect();
    duplicate_ids.sort();

    RepairPlan {
        ordered,
        rewrites,
        duplicate_ids,
    }
}

/// Outcome of a repair run against storage
#[derive(Debug, Clone)]
pub struct RepairReport {
    pub ordered: Vec<Message>,
    pub renumbered: usize,
    pub duplicates_removed: usize,
}

/// Assigns sequence numbers and restores the dense 1..N numbering
#[derive(Clone)]
pub struct Sequencer {
    storage: Arc<dyn StorageEngine>,
}

impl Sequencer {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    pub async fn next_sequence(&self, thread_id: &str) -> Result<u64> {
        let last = self.storage.last_sequence(thread_id).await?;
        Ok(last.map_or(1, |seq| seq + 1))
    }

    /// Rewrite the thread so its rows match the canonical order
    ///
    /// Every write is keyed by message id and the plan is a pure function of
    /// the stored rows, so re-running after a partial failure converges on the
    /// same result.
    pub async fn repair(&self, thread_id: &str) -> Result<RepairReport> {
        let rows = self.storage.list_messages(thread_id).await?;
        let plan = plan_repair(rows);

        if plan.is_noop() {
            return Ok(RepairReport {
                ordered: plan.ordered,
                renumbered: 0,
                duplicates_removed: 0,
            });
        }

        let duplicate_ids: HashSet<&str> = plan.duplicate_ids.iter().map(String::as_str).collect();
        for message in &plan.rewrites {
            if duplicate_ids.contains(message.id.as_str()) {
                self.storage.delete_message(thread_id, &message.id).await?;
            }
            self.storage.put_message(message.clone()).await?;
        }

        tracing::info!(
            "Repaired thread {}: {} rows renumbered, {} duplicate ids removed",
            thread_id,
            plan.rewrites.len(),
            plan.duplicate_ids.len()
        );

        Ok(RepairReport {
            renumbered: plan.rewrites.len(),
            duplicates_removed: plan.duplicate_ids.len(),
            ordered: plan.ordered,
        })
    }
}
