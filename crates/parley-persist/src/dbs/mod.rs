mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemoryStorage;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStorage;
