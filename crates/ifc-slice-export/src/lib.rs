// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Slice Export - self-contained subsets of an IFC model
//!
//! Given a loaded source model and a set of roots (element assemblies, or
//! phase markers), this crate computes the entities the roots need, stages
//! them into an [`OutputModel`](ifc_slice_parser::OutputModel) and writes a
//! file that opens on its own.
//!
//! # Architecture
//!
//! ```text
//! ExportPipeline
//!   ├── context injection   (project, site, building, owner data)
//!   ├── ClosureBuilder      (assemblies or phases)
//!   │     ├── RelationFilter      filtered relationship copies
//!   │     └── EntityGraphWalker   forward reference closure
//!   ├── ReferenceIntegrityChecker
//!   ├── grid pruning
//!   └── StepWriter
//! ```
//!
//! All staging goes through an [`ExportSession`], which owns the output
//! model, the [`IdentityStrategy`] and the dedup guard for one run. The
//! source model is only ever read.
//!
//! # Example
//!
//! ```ignore
//! use ifc_slice_export::{find_assemblies, ExportKind, ExportPipeline, ExportRequest};
//! use ifc_slice_parser::ParsedModel;
//!
//! let model = Arc::new(ParsedModel::open(Path::new("tower.ifc"))?);
//! let roots = find_assemblies(model.resolver())?;
//! let request = ExportRequest::new(ExportKind::Assemblies, vec![roots[0].id], "A1.ifc");
//! let result = ExportPipeline::new(model).run(&request)?;
//! println!("{} entities written", result.entities_written);
//! ```

mod cancel;
mod closure;
mod convert;
mod discovery;
mod error;
mod filter;
mod identity;
mod integrity;
mod pipeline;
mod report;
mod session;
mod walker;

pub use cancel::CancellationToken;
pub use closure::{ClosureBuilder, ClosureSummary, PhaseMode};
pub use convert::{convert_model, convert_schema, converted_path};
pub use discovery::{
    assembly_mark, find_assemblies, find_phases, property_value, DiscoveredRoot, NO_ASSEMBLY_MARK,
};
pub use error::{ExportError, Result};
pub use filter::{filtered_relation, RelationFilter, RelationKind};
pub use identity::{strategy_for, FreshIdentity, IdentityPolicy, IdentityStrategy, PreserveIdentity};
pub use integrity::{HealedReference, ReferenceIntegrityChecker};
pub use pipeline::{
    prune_grids, BuiltExport, ExportKind, ExportOptions, ExportPipeline, ExportRequest,
    ExportResult, ExportTask, GridPruning, CONTEXT_TYPES,
};
pub use report::{ExportReport, DEFAULT_FAILURE_THRESHOLD};
pub use session::{ClosureSet, ExportSession, StageOutcome};
pub use walker::{EntityGraphWalker, NON_STRUCTURAL_ATTRIBUTES};
