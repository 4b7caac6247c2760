mod client;

pub use client::{HttpCompletionClient, HttpCompletionClientBuilder};
