// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Once-per-session suppression of repeated translation-miss reports.

use rustc_hash::FxHashSet;
use tracing::warn;
use weft_port::{MessageLog, Severity};

/// Set of type names that already failed to translate this session.
#[derive(Debug, Clone, Default)]
pub struct MissingTranslationSet {
    seen: FxHashSet<String>,
}

impl MissingTranslationSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a miss for `type_name`, logging it only the first time.
    ///
    /// Returns `true` if this was the first report for the type.
    pub fn report<L: MessageLog + ?Sized>(&mut self, log: &L, type_name: &str) -> bool {
        self.report_with(
            log,
            type_name,
            &format!("Cannot translate '{type_name}': type is unknown or unavailable"),
        )
    }

    /// Records a miss under `label` with a custom host message.
    pub fn report_with<L: MessageLog + ?Sized>(
        &mut self,
        log: &L,
        label: &str,
        message: &str,
    ) -> bool {
        if !self.seen.insert(label.to_owned()) {
            return false;
        }
        warn!(%label, "translation miss");
        log.report(Severity::Warning, message);
        true
    }

    /// Returns `true` if `type_name` already missed.
    pub fn contains(&self, type_name: &str) -> bool {
        self.seen.contains(type_name)
    }

    /// Number of distinct missing types.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing has missed.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forgets every miss (full scene rebuild).
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
