// src/consumption.rs

use eyre::{Result, WrapErr};
use log::{debug, info};
use std::collections::BTreeSet;

use crate::client_ops::MessageSource;

/// Applies the consumed label to a finished batch in a single transport call,
/// so a batch is either wholly marked or wholly left for the next run.
#[derive(Debug, Clone)]
pub struct ConsumptionTracker {
    label: String,
}

impl ConsumptionTracker {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }

    /// Mark every UID in `uids` consumed; returns how many distinct UIDs were sent.
    pub fn mark_consumed<S>(&self, source: &mut S, uids: &[u32]) -> Result<usize>
    where
        S: MessageSource + ?Sized,
    {
        let unique: Vec<u32> = uids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if unique.is_empty() {
            debug!("Nothing to mark with '{}'", self.label);
            return Ok(0);
        }

        source
            .copy(&unique, &self.label)
            .wrap_err_with(|| format!("Failed to mark {} messages as '{}'", unique.len(), self.label))?;
        info!("🏷 Marked {} messages as '{}'", unique.len(), self.label);
        Ok(unique.len())
    }
}
