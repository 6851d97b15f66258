// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source model loaded from STEP text

use std::path::Path;
use std::sync::Arc;

use ifc_slice_model::{
    EntityResolver, IfcModel, ModelMetadata, ParseError, ProgressCallback, Result,
};

use crate::resolver::SourceResolver;
use crate::scanner::{parse_header, EntityScanner, HeaderInfo};

/// A source file ready to be exported from
///
/// Loading only locates instances; attribute decoding happens on access.
pub struct ParsedModel {
    resolver: Arc<SourceResolver>,
    metadata: ModelMetadata,
}

impl From<HeaderInfo> for ModelMetadata {
    fn from(header: HeaderInfo) -> Self {
        ModelMetadata {
            schema_version: header.schema_version,
            originating_system: header.originating_system,
            preprocessor_version: header.preprocessor_version,
            file_name: header.file_name,
            file_description: header.file_description,
            author: header.author,
            organization: header.organization,
            timestamp: header.timestamp,
        }
    }
}

impl ParsedModel {
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_with_progress(content, Box::new(|_, _| {}))
    }

    /// Load `content`, reporting `(phase, percent)` to `on_progress`
    pub fn parse_with_progress(content: &str, on_progress: ProgressCallback) -> Result<Self> {
        if !content.trim_start().starts_with("ISO-10303-21") {
            return Err(ParseError::format("missing ISO-10303-21 preamble"));
        }
        if !content.contains("DATA;") {
            return Err(ParseError::format("missing DATA section"));
        }

        on_progress("Reading header", 0.0);
        let metadata = ModelMetadata::from(parse_header(content));

        on_progress("Locating instances", 10.0);
        let (spans, by_type) = EntityScanner::build_indices(content);
        let resolver = Arc::new(SourceResolver::new(content.to_owned(), spans, by_type));

        log::debug!(
            "Located {} instances, schema '{}'",
            resolver.entity_count(),
            metadata.schema_version
        );
        on_progress("Complete", 100.0);

        Ok(Self { resolver, metadata })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

impl IfcModel for ParsedModel {
    fn resolver(&self) -> &dyn EntityResolver {
        self.resolver.as_ref()
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::{EntityId, IfcType, SchemaVersion};
    use std::sync::Mutex;

    const STEELWORK: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [DesignTransferView]'),'2;1');
FILE_NAME('bay-4.ifc','2025-03-11T14:02:51',('Detailer'),('Steel Co'),'STEP writer','Detailing 2025','');
FILE_SCHEMA(('IFC4X3_ADD2'));
ENDSEC;
DATA;
#1=IFCPROJECT('0a',$,'Depot',$,$,$,$,$,$);
#2=IFCSITE('0b',$,'Yard',$,$,$,$,$,$,$,$,$,$,$);
#3=IFCRELAGGREGATES('0c',$,$,$,#1,(#2));
#20=IFCELEMENTASSEMBLY('0d',$,'Truss T1',$,$,$,$,$,$,$);
#21=IFCBEAM('0e',$,'Top chord',$,$,$,$,$);
#22=IFCRELAGGREGATES('0f',$,$,$,#20,(#21));
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_parse_reads_header_and_instances() {
        let model = ParsedModel::parse(STEELWORK).unwrap();
        let meta = model.metadata();
        assert_eq!(meta.schema_version, "IFC4X3_ADD2");
        assert_eq!(meta.schema(), Some(SchemaVersion::Ifc4x3));
        assert_eq!(meta.file_name.as_deref(), Some("bay-4.ifc"));
        assert_eq!(meta.organization.as_deref(), Some("Steel Co"));

        let resolver = model.resolver();
        assert_eq!(resolver.entity_count(), 6);
        assert_eq!(resolver.entities_by_type(&IfcType::IfcElementAssembly)[0].id, EntityId(20));
        assert_eq!(resolver.inverse_of(EntityId(21)), vec![EntityId(22)]);
    }

    #[test]
    fn test_rejects_text_without_preamble_or_data() {
        assert!(matches!(
            ParsedModel::parse("solid cube\nendsolid"),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            ParsedModel::parse("ISO-10303-21;\nHEADER;\nENDSEC;\n"),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_progress_phases() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        ParsedModel::parse_with_progress(
            STEELWORK,
            Box::new(move |phase, percent| sink.lock().unwrap().push((phase.to_owned(), percent))),
        )
        .unwrap();

        let phases = phases.lock().unwrap();
        assert_eq!(phases.first().map(|(phase, _)| phase.as_str()), Some("Reading header"));
        assert_eq!(phases.last().map(|(_, percent)| *percent), Some(100.0));
    }

    #[test]
    fn test_open_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bay-4.ifc");
        std::fs::write(&path, STEELWORK).unwrap();

        let model = ParsedModel::open(&path).unwrap();
        assert!(model.resolver().get(EntityId(21)).is_some());
        assert!(ParsedModel::open(&dir.path().join("missing.ifc")).is_err());
    }
}
