// src/thread.rs
//
// Forward-chain thread index and the resolver that walks it.
// Gmail quotes the whole prior conversation in every reply, so the newest
// reply's body already holds the full thread and nothing is concatenated.

use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::client_ops::MessageSource;

pub const HTML_COMPATIBILITY: &str = r#"<meta http-equiv="Content-type" content="text/html; charset=utf-8"/>"#;

/// Prepend the content-type meta tag unless the body already starts with it.
pub fn with_compat_header(html: &str) -> String {
    if html.starts_with(HTML_COMPATIBILITY) {
        html.to_string()
    } else {
        format!("{}{}", HTML_COMPATIBILITY, html)
    }
}

/// Parent Message-ID → Message-ID of the reply to it. One child per parent.
#[derive(Debug, Default)]
pub struct ThreadIndex {
    forward: HashMap<String, String>,
}

impl ThreadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` as the reply to `parent`, returning the child it replaced.
    pub fn record(&mut self, parent: &str, child: &str) -> Option<String> {
        let previous = self.forward.insert(parent.to_string(), child.to_string());
        if let Some(ref prev) = previous {
            debug!("Parent {} already had reply {}; now {}", parent, prev, child);
        }
        previous
    }

    pub fn next(&self, id: &str) -> Option<&str> {
        self.forward.get(id).map(String::as_str)
    }

    pub fn has_descendant(&self, id: &str) -> bool {
        self.forward.contains_key(id)
    }

    /// Message-IDs reachable from `root`, nearest first. Stops at a repeated id.
    pub fn chain_from(&self, root: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        seen.insert(root);
        let mut chain = Vec::new();
        let mut current = root;
        while let Some(next) = self.next(current) {
            if !seen.insert(next) {
                break;
            }
            chain.push(next.to_string());
            current = next;
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Body chosen to represent a whole conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedThread {
    /// Newest reachable reply's HTML with the compatibility header.
    pub html: String,
    /// Message-ID whose body was used.
    pub tail_message_id: String,
    pub hops: usize,
}

pub struct ThreadResolver<'a> {
    index: &'a ThreadIndex,
}

impl<'a> ThreadResolver<'a> {
    pub fn new(index: &'a ThreadIndex) -> Self {
        Self { index }
    }

    /// Walk from `root_id` to the newest reply and return its body.
    ///
    /// Returns `None` when the root has no reachable reply, meaning the
    /// caller should archive the root's own body. A lookup that fails or
    /// finds nothing ends the walk at the last message fetched.
    pub fn resolve<S>(&self, source: &mut S, root_id: &str) -> Option<ResolvedThread>
    where
        S: MessageSource + ?Sized,
    {
        let mut visited = HashSet::new();
        visited.insert(root_id.to_string());

        let mut resolved: Option<ResolvedThread> = None;
        let mut current = root_id.to_string();
        let mut hops = 0;

        while let Some(next_id) = self.index.next(&current) {
            if !visited.insert(next_id.to_string()) {
                warn!("Thread from {} loops back to {}; stopping walk", root_id, next_id);
                break;
            }

            let found = match source.fetch_by_header("Message-ID", next_id) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Lookup of {} failed while resolving {}: {}", next_id, root_id, e);
                    break;
                }
            };

            let mut found = found.into_iter();
            let Some(msg) = found.next() else {
                warn!("Reply {} in thread {} not found; using last fetched body", next_id, root_id);
                break;
            };
            if found.next().is_some() {
                warn!("Message-ID {} matched more than one message; using the first", next_id);
            }

            hops += 1;
            debug!("Thread {} hop {} → UID {} ({})", root_id, hops, msg.uid, next_id);
            resolved = Some(ResolvedThread {
                html: with_compat_header(&msg.html),
                tail_message_id: next_id.to_string(),
                hops,
            });
            current = next_id.to_string();
        }

        resolved
    }
}
