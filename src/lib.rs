//! IPTV playlist and guide ingestion
//!
//! Detects and parses M3U, XSPF, ad-hoc XML and JSON playlists plus XMLTV
//! and JSON guides into one canonical model, and keeps stored copies fresh
//! through a TTL-driven, single-flight sync policy.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
