pub mod builder;
pub mod client;
pub mod dbs;
pub mod error;
pub mod filter;
pub mod log_store;
pub mod media;
pub mod pagination;
pub mod repositories;
pub mod sequencer;
pub mod storage;

pub use builder::PersistClientBuilder;
pub use client::PersistClient;
pub use dbs::MemoryStorage;
#[cfg(feature = "mongodb")]
pub use dbs::MongoStorage;
pub use error::{PersistError, Result};
pub use filter::{is_content_bearing, is_media_control, is_media_request, media_tag, parse_media_id};
pub use log_store::LogStore;
pub use media::{MediaStore, MemoryMediaStore};
pub use pagination::{Page, PaginationCursor, PaginationService, PaginationWindow, WindowUpdate};
pub use repositories::{SummaryRepository, ThreadRepository};
pub use sequencer::{RepairPlan, RepairReport, Sequencer, TURN_WINDOW_MS};
pub use storage::StorageEngine;

pub use parley_types::{Delivery, LogEvent, Message, MessageRole, Summary, SummaryMode, SummaryState, Thread, ThreadConfig};
