// src/client_ops.rs
//
// Trait abstraction for the mailbox transport.
// The archival pipeline runs against a real IMAP session or a test mock.

use eyre::Result;

use crate::message::Message;

/// Candidate selection for one batch: carries `label`, lacks `consumed_label`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub label: String,
    pub consumed_label: String,
}

impl SearchFilter {
    pub fn new(label: &str, consumed_label: &str) -> Self {
        Self {
            label: label.to_string(),
            consumed_label: consumed_label.to_string(),
        }
    }

    /// Gmail search criteria, e.g. `X-GM-LABELS "paperless" NOT X-GM-LABELS "paperless-consumed"`.
    pub fn to_imap_query(&self) -> String {
        format!(
            "X-GM-LABELS {} NOT X-GM-LABELS {}",
            quote_imap(&self.label),
            quote_imap(&self.consumed_label)
        )
    }
}

/// Quote a string for use as an IMAP astring.
pub fn quote_imap(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Mailbox operations the archiver needs.
pub trait MessageSource {
    /// The folder named `parent` plus every folder beneath it.
    fn list_folders(&mut self, parent: &str) -> Result<Vec<String>>;

    /// Select the folder subsequent searches and lookups run in.
    fn select(&mut self, folder: &str) -> Result<()>;

    /// Fetch every message in the selected folder matching `filter`, oldest first.
    fn search(&mut self, filter: &SearchFilter) -> Result<Vec<Message>>;

    /// Fetch messages whose header `field` equals `value`.
    fn fetch_by_header(&mut self, field: &str, value: &str) -> Result<Vec<Message>>;

    /// Copy messages into `label`, which on Gmail adds that label.
    fn copy(&mut self, uids: &[u32], label: &str) -> Result<()>;

    fn logout(&mut self) -> Result<()>;
}
