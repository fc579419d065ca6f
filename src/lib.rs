//! Deduplicating photo archive ingestion.
//!
//! Scans source folders for photos, skips anything already archived (by
//! path-digest ledger lookup or by an already-populated target path),
//! converts non-JPEG sources to JPEG with metadata preserved, and appends a
//! durable record of every processed file so reruns are safe.

pub mod config;
pub mod convert;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod naming;
pub mod report;
pub mod scanner;

pub use config::Config;
pub use ingest::{IngestReport, Ingestor};
pub use ledger::Ledger;
