// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP backend for `ifc-slice-model`
//!
//! Reading: [`EntityScanner`] locates every instance with `memchr`,
//! [`SourceResolver`] decodes them with `nom` on first access and answers
//! inverse-reference queries from an index built once.
//!
//! Writing: an [`OutputModel`] collects copies of source entities under new
//! or preserved ids, and [`StepWriter`] renders it with an IFC2X3, IFC4 or
//! IFC4X3 header. References are translated to output ids only when the
//! file is written, so entities can be staged in any order.
//!
//! ```ignore
//! use ifc_slice_parser::{OutputModel, ParsedModel};
//!
//! let model = ParsedModel::open(Path::new("tower.ifc"))?;
//! let mut out = OutputModel::new(SchemaVersion::Ifc4);
//! for beam in model.resolver().find_by_type_name("IFCBEAM") {
//!     out.add(&beam)?;
//! }
//! out.write(Path::new("beams.ifc"))?;
//! ```

mod model;
mod output;
mod resolver;
mod scanner;
mod tokenizer;
mod writer;

pub use model::ParsedModel;
pub use output::{DanglingReference, OutputError, OutputModel};
pub use resolver::SourceResolver;
pub use scanner::{EntityScanner, HeaderInfo, ScannedEntity};
pub use tokenizer::{parse_entity, Token};
pub use writer::{StepWriter, WriteSummary};
