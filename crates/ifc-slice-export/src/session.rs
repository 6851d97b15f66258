// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run export state
//!
//! An [`ExportSession`] owns everything one export mutates: the output
//! model, the identity strategy, the dedup guard and the report. It borrows
//! the source model read-only, so any number of sessions may run over one
//! loaded file. Nothing here outlives the run.

use crate::cancel::CancellationToken;
use crate::identity::{strategy_for, IdentityPolicy, IdentityStrategy};
use crate::report::ExportReport;
use crate::walker::EntityGraphWalker;
use crate::{ExportError, Result};
use ifc_slice_model::{DecodedEntity, EntityId, EntityResolver, SchemaVersion};
use ifc_slice_parser::OutputModel;
use rustc_hash::{FxHashMap, FxHashSet};

/// Result of asking the session to stage one entity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// Newly added to the output model
    Added,
    /// Handled earlier in this run (added or rejected)
    AlreadyStaged,
    /// The output model refused it, or it could not be read
    Rejected,
    /// A filtered relation staged earlier, re-filtered to a larger allow-list
    Widened,
}

/// Dedup guard: source ID -> whether it reached the output model
#[derive(Debug, Default)]
pub struct ClosureSet {
    entries: FxHashMap<EntityId, bool>,
}

impl ClosureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was already handled (added or rejected)
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Whether `id` was added to the output model
    pub fn is_added(&self, id: EntityId) -> bool {
        self.entries.get(&id).copied().unwrap_or(false)
    }

    pub fn mark(&mut self, id: EntityId, added: bool) {
        self.entries.insert(id, added);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source IDs added to the output model
    pub fn added(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries
            .iter()
            .filter(|(_, added)| **added)
            .map(|(id, _)| *id)
    }
}

/// State of one export run
pub struct ExportSession<'a> {
    walker: EntityGraphWalker<'a>,
    output: OutputModel,
    strategy: Box<dyn IdentityStrategy>,
    closure: ClosureSet,
    /// Allow-lists of the filtered relations staged so far
    filters: FxHashMap<EntityId, FxHashSet<EntityId>>,
    report: ExportReport,
    cancel: CancellationToken,
}

impl<'a> ExportSession<'a> {
    pub fn new(
        resolver: &'a dyn EntityResolver,
        policy: IdentityPolicy,
        schema: SchemaVersion,
    ) -> Self {
        Self::with_output(resolver, policy, OutputModel::new(schema))
    }

    /// Session writing into an existing output model
    pub fn with_output(
        resolver: &'a dyn EntityResolver,
        policy: IdentityPolicy,
        output: OutputModel,
    ) -> Self {
        Self {
            walker: EntityGraphWalker::new(resolver),
            output,
            strategy: strategy_for(policy),
            closure: ClosureSet::new(),
            filters: FxHashMap::default(),
            report: ExportReport::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: f64) -> Self {
        self.report.failure_threshold = threshold;
        self
    }

    pub fn resolver(&self) -> &'a dyn EntityResolver {
        self.walker.resolver()
    }

    pub fn walker(&self) -> EntityGraphWalker<'a> {
        self.walker
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.strategy.policy()
    }

    pub fn output(&self) -> &OutputModel {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputModel {
        &mut self.output
    }

    pub fn closure(&self) -> &ClosureSet {
        &self.closure
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut ExportReport {
        &mut self.report
    }

    /// Fail with `Cancelled` if the run has been cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether `id` has been handled in this run or is already in the output
    pub fn is_staged(&self, id: EntityId) -> bool {
        self.closure.contains(id) || self.output.contains_source(id)
    }

    pub fn record_dedup_hit(&mut self, id: EntityId) {
        log::trace!("{} already staged", id);
        self.report.dedup_hits += 1;
    }

    /// Log and count an error the run absorbs
    pub fn record_error(&mut self, error: ExportError) {
        log::warn!("{}", error);
        self.report.record(&error);
    }

    /// Stage one entity through the identity strategy
    pub fn stage(&mut self, entity: &DecodedEntity) -> StageOutcome {
        if self.closure.contains(entity.id) {
            self.record_dedup_hit(entity.id);
            return StageOutcome::AlreadyStaged;
        }
        if self.output.contains_source(entity.id) {
            self.closure.mark(entity.id, true);
            self.record_dedup_hit(entity.id);
            return StageOutcome::AlreadyStaged;
        }

        match self.strategy.add(&mut self.output, entity) {
            Ok(out_id) => {
                log::debug!("Staged {} {} as {}", entity.ifc_type, entity.id, out_id);
                self.closure.mark(entity.id, true);
                self.report.staged += 1;
                StageOutcome::Added
            }
            Err(e) => {
                self.closure.mark(entity.id, false);
                self.record_error(e);
                StageOutcome::Rejected
            }
        }
    }

    /// Record the allow-list `relation` was staged with
    pub fn remember_filter(&mut self, relation: EntityId, allowed: &FxHashSet<EntityId>) {
        self.filters.insert(relation, allowed.clone());
    }

    /// Union `allowed` into the allow-list of a filtered relation
    ///
    /// Returns the merged list when it grew. `None` when nothing is new or
    /// the relation was not staged through a filter.
    pub fn widen_filter(
        &mut self,
        relation: EntityId,
        allowed: &FxHashSet<EntityId>,
    ) -> Option<FxHashSet<EntityId>> {
        let current = self.filters.get_mut(&relation)?;
        let before = current.len();
        current.extend(allowed.iter().copied());
        (current.len() > before).then(|| current.clone())
    }

    /// Stage an entity looked up by source ID
    pub fn stage_id(&mut self, id: EntityId) -> StageOutcome {
        match self.resolver().get(id) {
            Some(entity) => self.stage(&entity),
            None => {
                log::debug!("{} is not in the source model", id);
                self.closure.mark(id, false);
                StageOutcome::Rejected
            }
        }
    }

    /// Stage every entity transitively referenced by `entity`
    ///
    /// Returns how many were newly added.
    pub fn stage_children(&mut self, entity: &DecodedEntity) -> usize {
        let mut added = 0;
        for child in self.walker.children_recursive(entity) {
            if self.stage(&child) == StageOutcome::Added {
                added += 1;
            }
        }
        added
    }

    /// Stage `entity` and its full forward closure
    pub fn stage_with_children(&mut self, entity: &DecodedEntity) -> StageOutcome {
        let outcome = self.stage(entity);
        self.stage_children(entity);
        outcome
    }

    /// Finish the run, handing back the output model and report
    pub fn into_parts(self) -> (OutputModel, ExportReport) {
        (self.output, self.report)
    }
}
