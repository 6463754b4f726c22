//! Persistence Adapters - JSONL Request Journal
//!
//! Durable storage for requests using append-only JSON Lines files.
//! No database dependency - each line is a self-contained record,
//! making the journal easy to parse, stream, and recover from
//! partial writes.

pub mod journal;

pub use journal::JournalStore;
