// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the export engine
//!
//! Most variants never leave an export run: they are logged, counted in the
//! [`ExportReport`](crate::ExportReport) and the run carries on. Only write
//! failures, cancellation and unusable requests abort it.

use ifc_slice_model::{EntityId, ParseError};
use ifc_slice_parser::OutputError;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised while building or writing an export
#[derive(Error, Debug)]
pub enum ExportError {
    /// An expected structural relation is absent
    #[error("could not find {relation} for entity {entity}")]
    MissingStructuralRelation {
        relation: &'static str,
        entity: EntityId,
    },

    /// An attribute is not available on the entity's schema version
    #[error("attribute access failed: {0}")]
    AttributeAccess(#[source] ParseError),

    /// The output model refused an entity
    #[error("entity {entity} not added: {source}")]
    DuplicateOrInvalidEntity {
        entity: EntityId,
        #[source]
        source: OutputError,
    },

    /// A reference could not be closed by backfill
    #[error("reference from {referrer} to {missing} could not be resolved")]
    UnresolvedForwardReference { referrer: EntityId, missing: EntityId },

    /// The roots are neither presentation layers nor phase properties
    #[error("no phases found")]
    NoPhasesFound,

    /// The model holds no element assemblies
    #[error("no assemblies found")]
    NoAssembliesFound,

    /// A requested root does not exist in the source model
    #[error("entity {0} not found in source model")]
    EntityNotFound(EntityId),

    /// The export was cancelled between steps
    #[error("export cancelled")]
    Cancelled,

    /// Writing the output file failed
    #[error("failed to write output: {0}")]
    Write(#[source] OutputError),

    /// Reading the source model failed
    #[error("failed to read model: {0}")]
    Parse(#[from] ParseError),
}

impl ExportError {
    /// Whether the error is absorbed inside a run rather than ending it
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExportError::MissingStructuralRelation { .. }
                | ExportError::AttributeAccess(_)
                | ExportError::DuplicateOrInvalidEntity { .. }
                | ExportError::UnresolvedForwardReference { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_relation_message() {
        let err = ExportError::MissingStructuralRelation {
            relation: "IfcRelAggregates",
            entity: EntityId(10),
        };
        assert_eq!(err.to_string(), "could not find IfcRelAggregates for entity #10");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(!ExportError::Cancelled.is_recoverable());
        assert!(!ExportError::Write(OutputError::Duplicate(EntityId(1))).is_recoverable());
        assert!(!ExportError::NoPhasesFound.is_recoverable());
    }
}
