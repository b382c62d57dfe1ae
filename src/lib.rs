// src/lib.rs
//
// Library entry point for imap-archive.
// Re-exports modules needed by the binary and integration tests.

pub mod cfg;
pub mod client_ops;
pub mod consumption;
pub mod imap_source;
pub mod message;
pub mod oauth2;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod thread;
pub mod utils;

pub use client_ops::{MessageSource, SearchFilter};
pub use pipeline::{ArchivalPipeline, ArchiveSettings};
