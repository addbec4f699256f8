//! Ingestion services
//!
//! Pure parsing lives in `sniffer`, `parser`, `epg` and `correlator`; the
//! async side (`fetcher`, `catalog`, `ingest`, `sync`) moves documents in
//! and out of the store.

pub mod catalog;
pub mod correlator;
pub mod epg;
pub mod fetcher;
pub mod ingest;
pub mod metrics;
pub mod parser;
pub mod sniffer;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
