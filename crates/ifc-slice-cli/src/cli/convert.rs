// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Convert subcommand - re-declare a whole file under another schema.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ifc_slice_export::{convert_schema, converted_path};
use ifc_slice_model::SchemaVersion;

use crate::config::{ReportFormat, Settings};

/// Convert a whole file to another schema.
///
/// Entities are copied as they are; attributes that differ between
/// schemas are not migrated.
#[derive(Parser)]
pub struct ConvertCommand {
    /// IFC file to read
    pub input: PathBuf,

    /// Target schema
    #[arg(long)]
    pub schema: SchemaVersion,

    /// File to write (defaults to `<stem>(CONVERTED).ifc`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConvertCommand {
    pub fn run(self, settings: &Settings) -> anyhow::Result<()> {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| converted_path(&self.input));
        let result = convert_schema(&self.input, &output, self.schema)
            .with_context(|| format!("failed to convert {}", self.input.display()))?;

        if settings.report_format == ReportFormat::Json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!(
                "Wrote {} entities as {} to {}",
                result.entities_written,
                self.schema,
                result.path.display()
            );
        }
        Ok(())
    }
}
