// src/pipeline.rs

use eyre::{Result, WrapErr};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::cfg::config::{ClassificationMode, Config};
use crate::client_ops::{MessageSource, SearchFilter};
use crate::consumption::ConsumptionTracker;
use crate::message::Message;
use crate::render::Renderer;
use crate::storage::ArtifactWriter;
use crate::thread::{with_compat_header, ThreadIndex, ThreadResolver};
use crate::utils::{extension_allowed, format_filename};

/// The part of the configuration the pipeline acts on.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub mailboxes: Vec<String>,
    pub label: String,
    pub consumed_label: String,
    pub valid_extensions: Vec<String>,
    pub classification: ClassificationMode,
    pub consume_failed_renders: bool,
}

impl From<&Config> for ArchiveSettings {
    fn from(config: &Config) -> Self {
        ArchiveSettings {
            mailboxes: config.mailboxes.clone(),
            label: config.label.clone(),
            consumed_label: config.consumed_label.clone(),
            valid_extensions: config.valid_extensions.clone(),
            classification: config.classification,
            consume_failed_renders: config.consume_failed_renders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A reply inside a thread; indexed, never archived on its own.
    Intermediate,
    /// A thread root with at least one indexed reply.
    RootWithDescendants,
    Standalone,
}

/// Where a message sits in its conversation, judged against `index` as it stands now.
pub fn classify(msg: &Message, index: &ThreadIndex) -> Classification {
    if msg.carries_references() {
        return Classification::Intermediate;
    }
    match &msg.message_id {
        Some(id) if index.has_descendant(id) => Classification::RootWithDescendants,
        _ => Classification::Standalone,
    }
}

/// Add `(In-Reply-To, Message-ID)` for a reply. Returns false when either header is missing.
pub fn index_reply(index: &mut ThreadIndex, msg: &Message) -> bool {
    match (&msg.in_reply_to, &msg.message_id) {
        (Some(parent), Some(id)) => {
            index.record(parent, id);
            true
        }
        _ => {
            warn!(
                "UID {} has References but no In-Reply-To/Message-ID pair; not indexed ({})",
                msg.uid, msg.subject
            );
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationKind {
    Standalone,
    Thread { tail_message_id: String, hops: usize },
    /// Root had indexed replies but none could be fetched; its own body was used.
    UnresolvedThread,
}

#[derive(Debug, Clone)]
pub struct ArchivedConversation {
    pub uid: u32,
    pub subject: String,
    pub kind: ConversationKind,
    /// Body handed to the renderer, before the compatibility header is ensured.
    pub html: String,
    pub pdf: Option<PathBuf>,
    pub attachments: Vec<PathBuf>,
    pub render_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub folder: String,
    pub archived: Vec<ArchivedConversation>,
    /// UIDs of replies folded into the ThreadIndex.
    pub intermediates: Vec<u32>,
    pub consumed: Vec<u32>,
    /// Left unconsumed because `consume_failed_renders` is off: failed roots and their replies.
    pub retained: Vec<u32>,
}

impl BatchReport {
    fn new(folder: &str) -> Self {
        BatchReport {
            folder: folder.to_string(),
            ..Default::default()
        }
    }

    pub fn render_failures(&self) -> usize {
        self.archived.iter().filter(|a| a.render_error.is_some()).count()
    }

    pub fn find(&self, uid: u32) -> Option<&ArchivedConversation> {
        self.archived.iter().find(|a| a.uid == uid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    pub fn archived(&self) -> usize {
        self.batches.iter().map(|b| b.archived.len()).sum()
    }

    pub fn pdfs(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| &b.archived)
            .filter(|a| a.pdf.is_some())
            .count()
    }

    pub fn consumed(&self) -> usize {
        self.batches.iter().map(|b| b.consumed.len()).sum()
    }

    pub fn render_failures(&self) -> usize {
        self.batches.iter().map(|b| b.render_failures()).sum()
    }
}

pub struct ArchivalPipeline<S, R, W> {
    source: S,
    renderer: R,
    writer: W,
    settings: ArchiveSettings,
    tracker: ConsumptionTracker,
}

impl<S, R, W> ArchivalPipeline<S, R, W>
where
    S: MessageSource,
    R: Renderer,
    W: ArtifactWriter,
{
    pub fn new(source: S, renderer: R, writer: W, settings: ArchiveSettings) -> Self {
        debug!(
            "Initializing ArchivalPipeline: {} mailboxes, label='{}', consumed='{}', mode={:?}",
            settings.mailboxes.len(),
            settings.label,
            settings.consumed_label,
            settings.classification,
        );
        let tracker = ConsumptionTracker::new(&settings.consumed_label);

        ArchivalPipeline {
            source,
            renderer,
            writer,
            settings,
            tracker,
        }
    }

    /// Archive every configured mailbox, then log out.
    pub fn execute(&mut self) -> Result<RunReport> {
        let report = self.run()?;
        self.source.logout()?;
        info!(
            "✅ Archived {} conversations ({} PDFs, {} render failures); {} messages consumed",
            report.archived(),
            report.pdfs(),
            report.render_failures(),
            report.consumed()
        );
        Ok(report)
    }

    /// Archive every configured mailbox and its child folders, one batch per folder.
    pub fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport::default();
        for mailbox in self.settings.mailboxes.clone() {
            let folders = self
                .source
                .list_folders(&mailbox)
                .wrap_err_with(|| format!("Failed to list folders under '{}'", mailbox))?;
            for folder in folders {
                report.batches.push(self.archive_folder(&folder)?);
            }
        }
        Ok(report)
    }

    /// Process one batch: every unconsumed candidate in `folder`.
    pub fn archive_folder(&mut self, folder: &str) -> Result<BatchReport> {
        info!("→ Archiving '{}'", folder);
        self.source.select(folder)?;

        let filter = SearchFilter::new(&self.settings.label, &self.settings.consumed_label);
        let messages = self.source.search(&filter)?;
        info!("📬 {} candidate messages in '{}'", messages.len(), folder);

        let mut report = BatchReport::new(folder);
        if messages.is_empty() {
            return Ok(report);
        }

        // batch-local; dropped when this function returns
        let mut index = ThreadIndex::new();
        if self.settings.classification == ClassificationMode::TwoPhase {
            for msg in messages.iter().filter(|m| m.carries_references()) {
                index_reply(&mut index, msg);
            }
            debug!("Indexed {} replies before classification", index.len());
        }

        let mut to_consume = Vec::with_capacity(messages.len());
        // replies of roots that failed to render and stay for the retry
        let mut held: HashSet<String> = HashSet::new();
        for msg in &messages {
            let class = classify(msg, &index);
            debug!("UID {} ({}) classified as {:?}", msg.uid, msg.subject, class);

            if class == Classification::Intermediate {
                if self.settings.classification == ClassificationMode::SinglePass {
                    index_reply(&mut index, msg);
                }
                report.intermediates.push(msg.uid);
                to_consume.push(msg.uid);
                continue;
            }

            let archived = self.archive_conversation(msg, class, &index)?;
            if archived.render_error.is_none() || self.settings.consume_failed_renders {
                to_consume.push(msg.uid);
            } else {
                info!("UID {} left unconsumed for retry after render failure", msg.uid);
                report.retained.push(msg.uid);
                if let (Classification::RootWithDescendants, Some(id)) = (class, &msg.message_id) {
                    held.extend(index.chain_from(id));
                }
            }
            report.archived.push(archived);
        }

        if !held.is_empty() {
            let held_uids: Vec<u32> = messages
                .iter()
                .filter(|m| m.carries_references())
                .filter(|m| m.message_id.as_ref().is_some_and(|id| held.contains(id)))
                .map(|m| m.uid)
                .collect();
            info!("{} replies held back with their unrendered roots", held_uids.len());
            to_consume.retain(|uid| !held_uids.contains(uid));
            report.retained.extend(held_uids);
        }

        self.tracker.mark_consumed(&mut self.source, &to_consume)?;
        report.consumed = to_consume;

        info!(
            "✅ '{}': {} archived, {} replies folded, {} render failures",
            folder,
            report.archived.len(),
            report.intermediates.len(),
            report.render_failures()
        );
        Ok(report)
    }

    fn archive_conversation(
        &mut self,
        msg: &Message,
        class: Classification,
        index: &ThreadIndex,
    ) -> Result<ArchivedConversation> {
        info!("📄 UID {}: {}", msg.uid, msg.subject);

        let (html, kind) = match (class, &msg.message_id) {
            (Classification::RootWithDescendants, Some(id)) => {
                match ThreadResolver::new(index).resolve(&mut self.source, id) {
                    Some(resolved) => {
                        info!(
                            "🧵 UID {} resolved to newest reply {} after {} hops",
                            msg.uid, resolved.tail_message_id, resolved.hops
                        );
                        let kind = ConversationKind::Thread {
                            tail_message_id: resolved.tail_message_id,
                            hops: resolved.hops,
                        };
                        (resolved.html, kind)
                    }
                    None => {
                        warn!("UID {} has replies but none could be fetched; using its own body", msg.uid);
                        (msg.html.clone(), ConversationKind::UnresolvedThread)
                    }
                }
            }
            _ => (msg.html.clone(), ConversationKind::Standalone),
        };

        let attachments = self.extract_attachments(msg)?;

        let stem = format_filename(&msg.subject, &msg.date);
        let (pdf, render_error) = match self.renderer.render(&with_compat_header(&html)) {
            Ok(bytes) => (Some(self.writer.write_pdf(&stem, &bytes)?), None),
            Err(e) => {
                warn!("⚠️ No PDF for UID {} ({}): {}", msg.uid, msg.subject, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(ArchivedConversation {
            uid: msg.uid,
            subject: msg.subject.clone(),
            kind,
            html,
            pdf,
            attachments,
            render_error,
        })
    }

    /// Write allow-listed attachments. A write failure aborts the batch.
    fn extract_attachments(&mut self, msg: &Message) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for attachment in &msg.attachments {
            if !extension_allowed(attachment, &self.settings.valid_extensions) {
                debug!("Skipping attachment '{}' on UID {}", attachment.filename, msg.uid);
                continue;
            }
            let path = self
                .writer
                .write_attachment(&attachment.filename, &attachment.payload)
                .wrap_err_with(|| format!("Failed to save attachment '{}' from UID {}", attachment.filename, msg.uid))?;
            info!("📎 Saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}
