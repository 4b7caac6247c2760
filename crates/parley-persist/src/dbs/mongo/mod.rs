mod client;

pub use client::MongoStorage;
