// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export subcommand - write selected roots to a new file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use ifc_slice_export::{
    convert_schema, converted_path, find_assemblies, find_phases, DiscoveredRoot, ExportKind,
    ExportPipeline, ExportRequest, ExportResult, IdentityPolicy,
};
use ifc_slice_model::{EntityId, IfcModel, SchemaVersion};
use ifc_slice_parser::ParsedModel;
use serde::Serialize;

use super::{parse_step_id, RootKind};
use crate::config::{ReportFormat, Settings};

/// Export assemblies or phases to a new file.
#[derive(Parser)]
pub struct ExportCommand {
    /// IFC file to read
    pub input: PathBuf,

    /// Kind of roots to export
    #[arg(long, value_enum, default_value = "assemblies")]
    pub kind: RootKind,

    /// STEP id of a root (repeatable)
    #[arg(long = "id", value_parser = parse_step_id)]
    pub ids: Vec<EntityId>,

    /// Assembly mark or phase label of a root (repeatable)
    #[arg(long = "mark")]
    pub marks: Vec<String>,

    /// Export every discovered root
    #[arg(long, conflicts_with_all = ["ids", "marks"])]
    pub all: bool,

    /// File to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Identity policy: preserve-ids or new-ids
    #[arg(long)]
    pub identity: Option<IdentityPolicy>,

    /// Keep IfcGrid and IfcGridAxis entities
    #[arg(long)]
    pub include_grids: bool,

    /// Schema declared by the written file
    #[arg(long)]
    pub schema: Option<SchemaVersion>,

    /// Also write `<stem>(CONVERTED).ifc` declared with this schema
    #[arg(long)]
    pub convert_to: Option<SchemaVersion>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ExportOutput<'a> {
    export: &'a ExportResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    converted: Option<&'a ExportResult>,
}

impl ExportCommand {
    pub fn run(self, settings: &Settings) -> anyhow::Result<()> {
        let model = Arc::new(
            ParsedModel::open(&self.input)
                .with_context(|| format!("failed to open {}", self.input.display()))?,
        );

        let mut options = settings.export_options();
        if let Some(identity) = self.identity {
            options.identity = identity;
        }
        options.include_grids |= self.include_grids;
        if self.schema.is_some() {
            options.schema = self.schema;
        }

        let kind = ExportKind::from(self.kind);
        let roots = self.select_roots(&model)?;
        tracing::info!(
            "Exporting {} {:?} roots from {}",
            roots.len(),
            kind,
            self.input.display()
        );

        let request = ExportRequest::from_options(
            kind,
            roots,
            self.output.clone(),
            &options,
            model.metadata().schema(),
        );
        let result = ExportPipeline::new(model)
            .with_options(options)
            .with_progress(Box::new(|phase, percent| {
                tracing::debug!("{phase} ({percent:.0}%)");
            }))
            .run(&request)
            .context("export failed")?;

        let converted = match self.convert_to {
            Some(schema) => {
                let destination = converted_path(&result.path);
                Some(
                    convert_schema(&result.path, &destination, schema)
                        .with_context(|| format!("failed to convert to {schema}"))?,
                )
            }
            None => None,
        };

        if self.json || settings.report_format == ReportFormat::Json {
            let output = ExportOutput {
                export: &result,
                converted: converted.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_summary(&result);
            if let Some(converted) = &converted {
                println!("Converted copy: {}", converted.path.display());
            }
        }

        if !result.report.is_trustworthy() {
            tracing::warn!("Export of {} may be incomplete", result.path.display());
        }
        Ok(())
    }

    /// Roots named by `--id`, `--mark` or `--all`
    fn select_roots(&self, model: &ParsedModel) -> anyhow::Result<Vec<EntityId>> {
        let mut roots = self.ids.clone();

        if self.all || !self.marks.is_empty() {
            let discovered = self.discover(model)?;
            if self.all {
                roots.extend(discovered.iter().map(|row| row.id));
            }
            for mark in &self.marks {
                let matching: Vec<EntityId> = discovered
                    .iter()
                    .filter(|row| &row.mark == mark)
                    .map(|row| row.id)
                    .collect();
                if matching.is_empty() {
                    bail!("no {:?} root with mark '{}'", self.kind, mark);
                }
                roots.extend(matching);
            }
        }

        if roots.is_empty() {
            bail!("no roots selected; use --id, --mark or --all");
        }
        roots.sort_unstable();
        roots.dedup();
        Ok(roots)
    }

    fn discover(&self, model: &ParsedModel) -> anyhow::Result<Vec<DiscoveredRoot>> {
        Ok(match self.kind {
            RootKind::Assemblies => find_assemblies(model.resolver())?,
            RootKind::Phases => find_phases(model.resolver())?,
        })
    }
}

fn print_summary(result: &ExportResult) {
    let report = &result.report;
    println!("Wrote {} entities to {}", result.entities_written, result.path.display());
    println!(
        "  staged {}, duplicates skipped {}, rejected {}",
        report.staged, report.dedup_hits, report.rejected
    );
    println!(
        "  missing relations {}, healed references {}, unresolved {}",
        report.missing_relations, report.healed, report.unresolved
    );
    if report.grids_removed > 0 {
        println!(
            "  grid entities removed {}, dependents removed {}",
            report.grids_removed, report.grid_dependents_removed
        );
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#10=IFCELEMENTASSEMBLY('a',$,'A1',$,$,$,$,$,$,$);
#11=IFCBEAM('b',$,'B1',$,$,$,$,$);
#12=IFCRELAGGREGATES('r',$,$,$,#10,(#11));
#13=IFCELEMENTASSEMBLY('c',$,'A2',$,$,$,$,$,$,$);
#14=IFCPROPERTYSINGLEVALUE('AssemblyMark',$,IFCLABEL('T-1'),$);
#15=IFCPROPERTYSET('ps',$,'Pset',$,(#14));
#16=IFCRELDEFINESBYPROPERTIES('rd',$,$,$,(#10),#15);
ENDSEC;
END-ISO-10303-21;
"#;

    fn command(args: &[&str]) -> ExportCommand {
        let mut full = vec!["export", "model.ifc", "-o", "out.ifc"];
        full.extend_from_slice(args);
        ExportCommand::parse_from(full)
    }

    #[test]
    fn test_select_roots() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();

        let by_mark = command(&["--mark", "T-1", "--id", "13"]);
        assert_eq!(by_mark.select_roots(&model).unwrap(), vec![EntityId(10), EntityId(13)]);

        let all = command(&["--all"]);
        assert_eq!(all.select_roots(&model).unwrap(), vec![EntityId(10), EntityId(13)]);

        assert!(command(&["--mark", "T-9"]).select_roots(&model).is_err());
        assert!(command(&[]).select_roots(&model).is_err());
    }

    #[test]
    fn test_run_writes_export_and_converted_copy() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("model.ifc");
        let output = dir.path().join("A1.ifc");
        std::fs::write(&input, TEST_IFC).unwrap();

        let cmd = ExportCommand::parse_from([
            "export",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--id",
            "10",
            "--convert-to",
            "IFC2X3",
        ]);
        cmd.run(&Settings::default()).unwrap();

        assert!(output.exists());
        let converted = ParsedModel::open(&dir.path().join("A1(CONVERTED).ifc")).unwrap();
        assert_eq!(converted.metadata().schema_version, "IFC2X3");
    }
}
