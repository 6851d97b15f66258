// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/ifc-slice/config.toml` (XDG) or platform config dir
//! 3. Project config: `.ifc-slice.toml` in the working directory
//! 4. Environment variables: `IFC_SLICE_*`
//! 5. Command-line flags (applied by the caller)
//!
//! ```toml
//! identity = "new-ids"
//! include_grids = false
//! schema = "IFC2X3"
//! failure_threshold = 0.05
//! report_format = "json"
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use ifc_slice_export::{ExportOptions, IdentityPolicy, DEFAULT_FAILURE_THRESHOLD};
use ifc_slice_model::SchemaVersion;
use serde::{Deserialize, Serialize};

/// How command results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Resolved settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub identity: IdentityPolicy,
    pub include_grids: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaVersion>,
    pub failure_threshold: f64,
    pub report_format: ReportFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            identity: IdentityPolicy::default(),
            include_grids: false,
            schema: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            report_format: ReportFormat::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered resolution (defaults → user → project → env).
    ///
    /// `explicit` replaces the project file when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let project = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".ifc-slice.toml"));
        Self::figment(Self::user_config_path(), &project)
            .extract()
            .map_err(Box::new)
    }

    fn figment(user_config: Option<PathBuf>, project_config: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(user_config) = user_config {
            figment = figment.merge(Toml::file(user_config));
        }
        figment
            .merge(Toml::file(project_config))
            .merge(Env::prefixed("IFC_SLICE_"))
    }

    /// User config path: ~/.config/ifc-slice/config.toml (XDG) or platform config dir.
    fn user_config_path() -> Option<PathBuf> {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("ifc-slice").join("config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }
        dirs::config_dir().map(|p| p.join("ifc-slice").join("config.toml"))
    }

    /// Engine options for one export
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            identity: self.identity,
            include_grids: self.include_grids,
            schema: self.schema,
            failure_threshold: self.failure_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings = Settings::figment(None, &dir.path().join("absent.toml"))
            .extract()
            .unwrap();
        assert_eq!(settings.identity, IdentityPolicy::PreserveIds);
        assert!(!settings.include_grids);
        assert_eq!(settings.schema, None);
        assert_eq!(settings.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
    }

    #[test]
    fn test_project_file_overrides_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let project = dir.path().join("project.toml");
        std::fs::write(&user, "identity = \"new-ids\"\ninclude_grids = true\n").unwrap();
        std::fs::write(&project, "include_grids = false\nschema = \"IFC2X3\"\nreport_format = \"json\"\n")
            .unwrap();

        let settings: Settings = Settings::figment(Some(user), &project).extract().unwrap();
        assert_eq!(settings.identity, IdentityPolicy::NewIds);
        assert!(!settings.include_grids);
        assert_eq!(settings.schema, Some(SchemaVersion::Ifc2x3));
        assert_eq!(settings.report_format, ReportFormat::Json);

        let options = settings.export_options();
        assert_eq!(options.identity, IdentityPolicy::NewIds);
        assert_eq!(options.schema, Some(SchemaVersion::Ifc2x3));
    }
}
