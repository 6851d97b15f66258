// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI module for ifc-slice.
//!
//! Subcommands:
//! - `list`: Show the assemblies or phases an export can start from
//! - `export`: Write the selected roots and what they need to a new file
//! - `convert`: Re-declare a whole file under another schema

mod convert;
mod export;
mod list;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ifc_slice_export::ExportKind;
use ifc_slice_model::EntityId;

use crate::config::Settings;

pub use convert::ConvertCommand;
pub use export::ExportCommand;
pub use list::ListCommand;

/// ifc-slice - self-contained subsets of IFC models
#[derive(Parser)]
#[command(name = "ifc-slice")]
#[command(about = "Export IFC assemblies and phases into self-contained files")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of ./.ifc-slice.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List assemblies or phases found in a file
    List(ListCommand),

    /// Export assemblies or phases to a new file
    Export(ExportCommand),

    /// Convert a whole file to another schema
    Convert(ConvertCommand),
}

/// Root kind selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RootKind {
    Assemblies,
    Phases,
}

impl From<RootKind> for ExportKind {
    fn from(kind: RootKind) -> Self {
        match kind {
            RootKind::Assemblies => ExportKind::Assemblies,
            RootKind::Phases => ExportKind::Phases,
        }
    }
}

/// Parse `10` or `#10` into an entity ID
pub fn parse_step_id(s: &str) -> Result<EntityId, String> {
    s.trim_start_matches('#')
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(EntityId)
        .ok_or_else(|| format!("invalid STEP id '{s}'"))
}

impl App {
    /// Run the CLI application.
    pub fn run(self) -> anyhow::Result<()> {
        let settings = Settings::load(self.config.as_deref())
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
        tracing::debug!(?settings, "Resolved configuration");

        match self.command {
            Command::List(cmd) => cmd.run(&settings),
            Command::Export(cmd) => cmd.run(&settings),
            Command::Convert(cmd) => cmd.run(&settings),
        }
    }
}
