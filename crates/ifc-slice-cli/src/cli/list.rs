// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! List subcommand - show exportable roots.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ifc_slice_export::{find_assemblies, find_phases, DiscoveredRoot};
use ifc_slice_model::IfcModel;
use ifc_slice_parser::ParsedModel;

use super::RootKind;
use crate::config::{ReportFormat, Settings};

/// List assemblies or phases found in a file.
#[derive(Parser)]
pub struct ListCommand {
    /// What to list
    #[arg(value_enum)]
    pub kind: RootKind,

    /// IFC file to read
    pub input: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub fn run(self, settings: &Settings) -> anyhow::Result<()> {
        let model = ParsedModel::open(&self.input)
            .with_context(|| format!("failed to open {}", self.input.display()))?;
        let rows = match self.kind {
            RootKind::Assemblies => find_assemblies(model.resolver())?,
            RootKind::Phases => find_phases(model.resolver())?,
        };

        if self.json || settings.report_format == ReportFormat::Json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print!("{}", render_table(&rows));
        }
        Ok(())
    }
}

/// Rows as an aligned text table: STEP ID, mark, GlobalId, name, type
pub fn render_table(rows: &[DiscoveredRoot]) -> String {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| {
            [
                row.id.to_string(),
                row.mark.clone(),
                row.global_id.clone().unwrap_or_default(),
                row.name.clone().unwrap_or_default(),
                row.ifc_type.clone(),
            ]
        })
        .collect();

    let header = ["STEP ID", "Mark", "GlobalId", "Name", "Type"];
    let mut widths = header.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_line(&header);
    for row in &cells {
        let refs: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&refs);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::EntityId;

    #[test]
    fn test_render_table() {
        let rows = vec![DiscoveredRoot {
            id: EntityId(10),
            mark: "T-1".into(),
            global_id: Some("0aB".into()),
            name: None,
            ifc_type: "IFCELEMENTASSEMBLY".into(),
        }];
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("STEP ID  Mark"));
        assert!(lines[1].starts_with("#10      T-1 "));
        assert!(lines[1].ends_with("IFCELEMENTASSEMBLY"));
    }
}
