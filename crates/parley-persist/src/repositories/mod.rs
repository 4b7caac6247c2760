mod summary;
mod thread;

pub use summary::SummaryRepository;
pub use thread::ThreadRepository;
