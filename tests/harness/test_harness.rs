// tests/harness/test_harness.rs
//
// High-level test harness combining all components.
// Every `run` builds a fresh pipeline over the same mailbox, like a new process would.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use eyre::Result;
use imap_archive::cfg::config::ClassificationMode;
use imap_archive::message::Message;
use imap_archive::pipeline::{ArchivalPipeline, ArchiveSettings, BatchReport, RunReport};
use tempfile::TempDir;

use crate::harness::fakes::{FakeRenderer, FlakyWriter};
use crate::harness::mock_source::{Faults, MockSource, RecordedAction};
use crate::harness::virtual_mailbox::VirtualMailbox;

pub const FOLDER: &str = "Receipts";
pub const LABEL: &str = "paperless";
pub const CONSUMED: &str = "paperless-consumed";

pub type TestPipeline = ArchivalPipeline<MockSource, FakeRenderer, FlakyWriter>;

pub struct TestHarness {
    pub mailbox: Arc<RwLock<VirtualMailbox>>,
    pub actions: Arc<RwLock<Vec<RecordedAction>>>,
    pub rendered: Arc<RwLock<Vec<String>>>,
    pub settings: ArchiveSettings,
    pub faults: Faults,
    pub fail_attachment: Option<String>,
    pub fail_pdf: bool,
    pub render_outage: bool,
    output: TempDir,
}

impl TestHarness {
    pub fn new(mode: ClassificationMode) -> Self {
        Self {
            mailbox: Arc::new(RwLock::new(VirtualMailbox::new())),
            actions: Arc::new(RwLock::new(Vec::new())),
            rendered: Arc::new(RwLock::new(Vec::new())),
            settings: ArchiveSettings {
                mailboxes: vec![FOLDER.to_string()],
                label: LABEL.to_string(),
                consumed_label: CONSUMED.to_string(),
                valid_extensions: vec!["pdf".to_string()],
                classification: mode,
                consume_failed_renders: true,
            },
            faults: Faults::default(),
            fail_attachment: None,
            fail_pdf: false,
            render_outage: false,
            output: TempDir::new().unwrap(),
        }
    }

    pub fn two_phase() -> Self {
        Self::new(ClassificationMode::TwoPhase)
    }

    pub fn single_pass() -> Self {
        Self::new(ClassificationMode::SinglePass)
    }

    // ===== Message Management =====

    /// Add a message labeled for archiving in the default folder.
    pub fn add(&self, message: Message) -> u32 {
        self.add_to(FOLDER, message)
    }

    pub fn add_to(&self, folder: &str, message: Message) -> u32 {
        self.mailbox.write().unwrap().add_message(message, &[folder, LABEL])
    }

    /// Delete a message from the server between runs.
    pub fn remove(&self, uid: u32) {
        self.mailbox.write().unwrap().remove(uid);
    }

    // ===== Running =====

    pub fn pipeline(&self) -> TestPipeline {
        let source = MockSource::new(
            Arc::clone(&self.mailbox),
            Arc::clone(&self.actions),
            self.faults.clone(),
        );
        let renderer = FakeRenderer::new(Arc::clone(&self.rendered), self.render_outage);
        let writer = FlakyWriter::new(self.output.path(), self.fail_attachment.clone(), self.fail_pdf);
        ArchivalPipeline::new(source, renderer, writer, self.settings.clone())
    }

    pub fn run(&self) -> Result<RunReport> {
        self.pipeline().run()
    }

    /// Run and return the single batch for the default folder.
    pub fn run_batch(&self) -> BatchReport {
        let mut report = self.run().unwrap();
        assert_eq!(report.batches.len(), 1, "expected one batch, got {:?}", report.batches);
        report.batches.remove(0)
    }

    // ===== Inspection =====

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output.path().join(name)
    }

    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn copy_actions(&self) -> Vec<RecordedAction> {
        self.actions.read().unwrap().iter().filter(|a| a.is_copy()).cloned().collect()
    }

    pub fn lookup_count(&self) -> usize {
        self.actions.read().unwrap().iter().filter(|a| a.is_lookup()).count()
    }

    pub fn render_count(&self) -> usize {
        self.rendered.read().unwrap().len()
    }

    pub fn is_consumed(&self, uid: u32) -> bool {
        self.mailbox.read().unwrap().has_label(uid, CONSUMED)
    }

    // ===== Assertion Helpers =====

    pub fn assert_consumed(&self, uids: &[u32]) {
        for uid in uids {
            assert!(self.is_consumed(*uid), "Expected UID {} to carry '{}'", uid, CONSUMED);
        }
    }

    pub fn assert_not_consumed(&self, uids: &[u32]) {
        for uid in uids {
            assert!(!self.is_consumed(*uid), "Expected UID {} to NOT carry '{}'", uid, CONSUMED);
        }
    }
}
