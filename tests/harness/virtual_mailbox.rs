// tests/harness/virtual_mailbox.rs
//
// In-memory Gmail-style mailbox for testing.
// Folders are labels; a message is "in" every folder whose label it carries.

use std::collections::{BTreeMap, HashSet};

use imap_archive::message::Message;

/// A message plus the labels it carries on the virtual server.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message: Message,
    pub labels: HashSet<String>,
}

/// In-memory mailbox. UIDs are assigned in insertion order, and listings
/// return messages in that order, which stands in for the server's fetch order.
#[derive(Debug, Default)]
pub struct VirtualMailbox {
    messages: BTreeMap<u32, StoredMessage>,
    next_uid: u32,
    labels: HashSet<String>,
}

impl VirtualMailbox {
    pub fn new() -> Self {
        let mut labels = HashSet::new();
        labels.insert("INBOX".to_string());

        Self {
            messages: BTreeMap::new(),
            next_uid: 1,
            labels,
        }
    }

    /// Add a message carrying `labels`, returning the assigned UID.
    pub fn add_message(&mut self, mut message: Message, labels: &[&str]) -> u32 {
        let uid = self.next_uid;
        self.next_uid += 1;
        message.uid = uid;

        let labels: HashSet<String> = labels.iter().map(|l| l.to_string()).collect();
        self.labels.extend(labels.iter().cloned());
        self.messages.insert(uid, StoredMessage { message, labels });
        uid
    }

    pub fn get(&self, uid: u32) -> Option<&StoredMessage> {
        self.messages.get(&uid)
    }

    /// Drop a message entirely, as if it was deleted on the server.
    pub fn remove(&mut self, uid: u32) -> Option<StoredMessage> {
        self.messages.remove(&uid)
    }

    /// Messages in `folder`, in UID order.
    pub fn in_folder(&self, folder: &str) -> Vec<&StoredMessage> {
        self.messages.values().filter(|m| m.labels.contains(folder)).collect()
    }

    pub fn add_label(&mut self, uid: u32, label: &str) -> bool {
        self.labels.insert(label.to_string());
        match self.messages.get_mut(&uid) {
            Some(stored) => {
                stored.labels.insert(label.to_string());
                true
            }
            None => false,
        }
    }

    pub fn has_label(&self, uid: u32, label: &str) -> bool {
        self.messages.get(&uid).map(|m| m.labels.contains(label)).unwrap_or(false)
    }

    pub fn create_label(&mut self, label: &str) {
        self.labels.insert(label.to_string());
    }

    /// `parent` and every label nested beneath it, sorted.
    pub fn folders_under(&self, parent: &str) -> Vec<String> {
        let prefix = format!("{}/", parent);
        let mut out: Vec<String> = self
            .labels
            .iter()
            .filter(|l| l.as_str() == parent || l.starts_with(&prefix))
            .cloned()
            .collect();
        out.sort();
        out
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(subject: &str) -> Message {
        Message::new(0, subject, "2024-01-15", "<p>body</p>")
    }

    #[test]
    fn test_add_message_assigns_uid() {
        let mut mailbox = VirtualMailbox::new();
        let uid1 = mailbox.add_message(make_message("a"), &["Receipts"]);
        let uid2 = mailbox.add_message(make_message("b"), &["Receipts"]);

        assert_eq!((uid1, uid2), (1, 2));
        assert_eq!(mailbox.get(uid2).unwrap().message.uid, 2);
        assert_eq!(mailbox.message_count(), 2);
    }

    #[test]
    fn test_in_folder_keeps_insertion_order() {
        let mut mailbox = VirtualMailbox::new();
        mailbox.add_message(make_message("first"), &["Receipts"]);
        mailbox.add_message(make_message("other"), &["Travel"]);
        mailbox.add_message(make_message("second"), &["Receipts"]);

        let subjects: Vec<&str> = mailbox
            .in_folder("Receipts")
            .iter()
            .map(|m| m.message.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["first", "second"]);
    }

    #[test]
    fn test_folders_under_includes_children_only() {
        let mut mailbox = VirtualMailbox::new();
        mailbox.create_label("Receipts");
        mailbox.create_label("Receipts/2024");
        mailbox.create_label("ReceiptsOld");

        assert_eq!(mailbox.folders_under("Receipts"), vec!["Receipts", "Receipts/2024"]);
        assert!(mailbox.folders_under("Missing").is_empty());
    }

    #[test]
    fn test_add_label_and_remove() {
        let mut mailbox = VirtualMailbox::new();
        let uid = mailbox.add_message(make_message("a"), &["Receipts"]);

        assert!(mailbox.add_label(uid, "done"));
        assert!(mailbox.has_label(uid, "done"));
        assert!(!mailbox.add_label(99, "done"));

        assert!(mailbox.remove(uid).is_some());
        assert!(!mailbox.has_label(uid, "done"));
    }
}
