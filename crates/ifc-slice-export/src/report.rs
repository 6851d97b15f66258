// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Counters for everything an export absorbed instead of failing on

use crate::ExportError;
use serde::Serialize;

/// Default share of rejected adds above which a run is flagged
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 0.05;

/// Outcome statistics of one export run
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExportReport {
    /// Entities materialized into the output model
    pub staged: usize,
    /// Stage requests for entities that were already handled
    pub dedup_hits: usize,
    /// Adds refused by the output model
    pub rejected: usize,
    /// Expected relations that were absent
    pub missing_relations: usize,
    /// Attributes that could not be read by name
    pub attribute_access_errors: usize,
    /// References closed by the integrity pass
    pub healed: usize,
    /// References the integrity pass could not close
    pub unresolved: usize,
    /// Grid and grid axis entities removed
    pub grids_removed: usize,
    /// Relations and orphans removed along with the grids
    pub grid_dependents_removed: usize,
    /// Entity lines in the written file
    pub entities_written: usize,
    /// References written as `$`
    pub dangling_written: usize,
    /// Rejection ratio above which the run is flagged
    pub failure_threshold: f64,
    /// Human-readable notes on absorbed errors
    pub warnings: Vec<String>,
}

impl Default for ExportReport {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl ExportReport {
    pub fn new(failure_threshold: f64) -> Self {
        Self {
            staged: 0,
            dedup_hits: 0,
            rejected: 0,
            missing_relations: 0,
            attribute_access_errors: 0,
            healed: 0,
            unresolved: 0,
            grids_removed: 0,
            grid_dependents_removed: 0,
            entities_written: 0,
            dangling_written: 0,
            failure_threshold,
            warnings: Vec::new(),
        }
    }

    /// Count an absorbed error and keep its message
    pub fn record(&mut self, error: &ExportError) {
        match error {
            ExportError::MissingStructuralRelation { .. } => self.missing_relations += 1,
            ExportError::AttributeAccess(_) => self.attribute_access_errors += 1,
            ExportError::DuplicateOrInvalidEntity { .. } => self.rejected += 1,
            ExportError::UnresolvedForwardReference { .. } => self.unresolved += 1,
            _ => {}
        }
        self.warnings.push(error.to_string());
    }

    /// Share of attempted adds the output model refused
    pub fn rejection_ratio(&self) -> f64 {
        let attempted = self.staged + self.rejected;
        if attempted == 0 {
            0.0
        } else {
            self.rejected as f64 / attempted as f64
        }
    }

    /// Whether the output can be taken as complete
    pub fn is_trustworthy(&self) -> bool {
        self.rejection_ratio() <= self.failure_threshold
            && self.unresolved == 0
            && self.dangling_written == 0
    }

    /// Append the threshold warning once the run is over
    pub fn finish(&mut self) {
        if self.rejection_ratio() > self.failure_threshold {
            self.warnings.push(format!(
                "{} of {} adds were rejected ({:.1}%, threshold {:.1}%)",
                self.rejected,
                self.staged + self.rejected,
                self.rejection_ratio() * 100.0,
                self.failure_threshold * 100.0
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::EntityId;
    use ifc_slice_parser::OutputError;

    #[test]
    fn test_record_counts_by_kind() {
        let mut report = ExportReport::default();
        report.record(&ExportError::MissingStructuralRelation {
            relation: "IfcRelAggregates",
            entity: EntityId(10),
        });
        report.record(&ExportError::DuplicateOrInvalidEntity {
            entity: EntityId(4),
            source: OutputError::Duplicate(EntityId(4)),
        });
        assert_eq!(report.missing_relations, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.warnings[0], "could not find IfcRelAggregates for entity #10");
    }

    #[test]
    fn test_threshold() {
        let mut report = ExportReport::new(0.05);
        report.staged = 95;
        report.rejected = 5;
        assert!(report.is_trustworthy());

        report.rejected = 6;
        assert!(!report.is_trustworthy());
        report.finish();
        assert!(report.warnings.last().unwrap().starts_with("6 of 101 adds"));
    }

    #[test]
    fn test_unresolved_makes_untrustworthy() {
        let mut report = ExportReport::default();
        report.staged = 10;
        report.unresolved = 1;
        assert!(!report.is_trustworthy());
        assert_eq!(ExportReport::default().rejection_ratio(), 0.0);
    }
}
