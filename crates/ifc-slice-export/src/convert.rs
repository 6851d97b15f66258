// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-file schema conversion
//!
//! Every entity is re-created under fresh identifiers in a model declaring
//! the target schema. Attribute layouts are carried over as they are.

use crate::identity::IdentityPolicy;
use crate::pipeline::ExportResult;
use crate::report::ExportReport;
use crate::session::ExportSession;
use crate::{ExportError, Result};
use ifc_slice_model::{EntityResolver, IfcModel, SchemaVersion};
use ifc_slice_parser::{OutputModel, ParsedModel};
use std::path::{Path, PathBuf};

/// Re-create every entity of `resolver` in an output model for `schema`
pub fn convert_model(resolver: &dyn EntityResolver, schema: SchemaVersion) -> (OutputModel, ExportReport) {
    let mut session = ExportSession::new(resolver, IdentityPolicy::NewIds, schema);
    for id in resolver.all_ids() {
        session.stage_id(id);
    }
    session.into_parts()
}

/// Convert the file at `source` to `schema`, writing it to `destination`
pub fn convert_schema(source: &Path, destination: &Path, schema: SchemaVersion) -> Result<ExportResult> {
    let model = ParsedModel::open(source)?;
    log::info!(
        "Converting {} from {} to {}",
        source.display(),
        model.metadata().schema_version,
        schema
    );

    let (output, mut report) = convert_model(model.resolver(), schema);
    let summary = output.write(destination).map_err(ExportError::Write)?;
    report.entities_written = summary.entities;
    report.dangling_written = summary.dangling;
    report.finish();

    Ok(ExportResult {
        path: destination.to_path_buf(),
        entities_written: summary.entities,
        report,
        healed: Vec::new(),
    })
}

/// Sibling path `<stem>(CONVERTED).ifc` used for converted exports
pub fn converted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}(CONVERTED).ifc"))
}
