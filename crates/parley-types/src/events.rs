use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::summary::Summary;

/// Change notifications published by the log store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A message was inserted or updated in place
    MessageUpserted {
        message: Message,
    },

    /// Sequence numbers of a thread were rewritten by repair
    Repaired {
        thread_id: String,
        renumbered: usize,
    },

    SummarySaved {
        summary: Summary,
    },

    ThreadDeleted {
        thread_id: String,
    },
}

impl LogEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            Self::MessageUpserted { message } => &message.thread_id,
            Self::Repaired { thread_id, .. } => thread_id,
            Self::SummarySaved { summary } => &summary.thread_id,
            Self::ThreadDeleted { thread_id } => thread_id,
        }
    }
}
