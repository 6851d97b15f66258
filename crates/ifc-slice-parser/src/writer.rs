// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP physical file writer
//!
//! Produces `ISO-10303-21` text with one `#<id>=TYPE(args);` line per
//! entity, ordered by output identifier.

use crate::output::OutputModel;
use ifc_slice_model::{AttributeValue, SchemaVersion};
use std::fmt::Write as _;
use std::io::{self, Write};

/// Counts reported after a model has been written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Entity lines written to DATA
    pub entities: usize,
    /// References written as `$` because their target was never staged
    pub dangling: usize,
}

/// Header settings for a written file
#[derive(Clone, Debug)]
pub struct StepWriter {
    schema: SchemaVersion,
    description: String,
    file_name: String,
    timestamp: Option<String>,
    originating_system: String,
}

impl StepWriter {
    pub fn new(schema: SchemaVersion) -> Self {
        Self {
            schema,
            description: "ViewDefinition [CoordinationView]".to_string(),
            file_name: String::new(),
            timestamp: None,
            originating_system: format!("ifc-slice {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fix the FILE_NAME timestamp instead of using the current time
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Write `model` to `sink`
    pub fn write<W: Write>(&self, model: &OutputModel, sink: &mut W) -> io::Result<WriteSummary> {
        self.write_header(sink)?;
        writeln!(sink, "DATA;")?;

        let mut summary = WriteSummary::default();
        let mut line = String::new();
        for id in model.ids() {
            let Some((entity, dangling)) = model.resolved(id) else {
                continue;
            };
            for reference in &dangling {
                log::warn!(
                    "Dangling reference from {} to source entity {} written as $",
                    reference.referrer,
                    reference.missing
                );
            }
            summary.dangling += dangling.len();

            line.clear();
            let _ = write!(line, "#{}={}(", entity.id.0, entity.ifc_type.name());
            for (i, value) in entity.attributes.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                format_value(value, &mut line);
            }
            line.push_str(");");
            writeln!(sink, "{}", line)?;
            summary.entities += 1;
        }

        writeln!(sink, "ENDSEC;")?;
        writeln!(sink, "END-ISO-10303-21;")?;
        Ok(summary)
    }

    fn write_header<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let timestamp = self.timestamp.clone().unwrap_or_else(|| {
            chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()
        });

        writeln!(sink, "ISO-10303-21;")?;
        writeln!(sink, "HEADER;")?;
        writeln!(
            sink,
            "FILE_DESCRIPTION(('{}'),'2;1');",
            escape(&self.description)
        )?;
        writeln!(
            sink,
            "FILE_NAME('{}','{}',(''),(''),'{}','{}','');",
            escape(&self.file_name),
            timestamp,
            escape(&self.originating_system),
            escape(&self.originating_system),
        )?;
        writeln!(sink, "FILE_SCHEMA(('{}'));", self.schema.identifier())?;
        writeln!(sink, "ENDSEC;")
    }
}

/// Escape a plain string for a STEP literal
fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Append the STEP encoding of `value` to `out`
pub fn format_value(value: &AttributeValue, out: &mut String) {
    match value {
        AttributeValue::Null => out.push('$'),
        AttributeValue::Derived => out.push('*'),
        AttributeValue::EntityRef(id) => {
            let _ = write!(out, "#{}", id.0);
        }
        AttributeValue::Bool(true) => out.push_str(".T."),
        AttributeValue::Bool(false) => out.push_str(".F."),
        AttributeValue::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        AttributeValue::Float(f) => format_float(*f, out),
        // Stored already escaped
        AttributeValue::String(s) => {
            out.push('\'');
            out.push_str(s);
            out.push('\'');
        }
        AttributeValue::Enum(e) => {
            let _ = write!(out, ".{}.", e);
        }
        AttributeValue::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                format_value(item, out);
            }
            out.push(')');
        }
        AttributeValue::TypedValue(name, args) => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                format_value(arg, out);
            }
            out.push(')');
        }
    }
}

/// STEP reals always carry a decimal point (`1.`, `1.5E-10`)
fn format_float(f: f64, out: &mut String) {
    if !f.is_finite() {
        out.push('$');
        return;
    }
    let repr = format!("{:?}", f);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            out.push_str(mantissa);
            if !mantissa.contains('.') {
                out.push('.');
            }
            out.push('E');
            out.push_str(exponent);
        }
        None => {
            // Debug output of a finite f64 without exponent always has '.'
            out.push_str(repr.trim_end_matches('0'));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParsedModel;
    use ifc_slice_model::{DecodedEntity, EntityId, EntityResolver, IfcModel, IfcType};

    fn fmt(value: &AttributeValue) -> String {
        let mut out = String::new();
        format_value(value, &mut out);
        out
    }

    #[test]
    fn test_format_floats() {
        assert_eq!(fmt(&AttributeValue::Float(1.0)), "1.");
        assert_eq!(fmt(&AttributeValue::Float(0.25)), "0.25");
        assert_eq!(fmt(&AttributeValue::Float(-3.5)), "-3.5");
        assert_eq!(fmt(&AttributeValue::Float(1e-10)), "1.E-10");
        assert_eq!(fmt(&AttributeValue::Float(1.5e20)), "1.5E20");
    }

    #[test]
    fn test_format_compound_values() {
        let value = AttributeValue::List(vec![
            AttributeValue::EntityRef(EntityId(3)),
            AttributeValue::TypedValue(
                "IFCLABEL".to_string(),
                vec![AttributeValue::String("it''s".to_string())],
            ),
            AttributeValue::Enum("ELEMENT".to_string()),
            AttributeValue::Bool(false),
            AttributeValue::Null,
            AttributeValue::Derived,
        ]);
        assert_eq!(fmt(&value), "(#3,IFCLABEL('it''s'),.ELEMENT.,.F.,$,*)");
    }

    #[test]
    fn test_written_file_reparses() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4x3);
        out.create_entity(
            EntityId(20),
            IfcType::IfcBeam,
            vec![
                AttributeValue::String("guid".to_string()),
                AttributeValue::EntityRef(EntityId(21)),
                AttributeValue::Float(2.0),
            ],
        )
        .unwrap();
        out.create_entity(EntityId(21), IfcType::IfcOwnerHistory, vec![])
            .unwrap();

        let writer = StepWriter::new(SchemaVersion::Ifc4x3)
            .with_file_name("beam.ifc")
            .with_timestamp("2024-01-01T00:00:00");
        let mut buf = Vec::new();
        let summary = writer.write(&out, &mut buf).unwrap();
        assert_eq!(summary, WriteSummary { entities: 2, dangling: 0 });

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("FILE_SCHEMA(('IFC4X3'));"));
        assert!(text.contains("#1=IFCBEAM('guid',#2,2.);"));

        let model = ParsedModel::parse(&text).unwrap();
        assert_eq!(model.metadata().file_name.as_deref(), Some("beam.ifc"));
        let beam: std::sync::Arc<DecodedEntity> = model.resolver().get(EntityId(1)).unwrap();
        assert_eq!(beam.get_ref(1), Some(EntityId(2)));
        assert_eq!(beam.attributes[2], AttributeValue::Float(2.0));
    }

    #[test]
    fn test_dangling_references_are_counted() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        out.add(&DecodedEntity::new(
            EntityId(4),
            IfcType::IfcBeam,
            vec![AttributeValue::EntityRef(EntityId(9))],
        ))
        .unwrap();

        let mut buf = Vec::new();
        let summary = StepWriter::new(SchemaVersion::Ifc4)
            .write(&out, &mut buf)
            .unwrap();
        assert_eq!(summary.dangling, 1);
        assert!(String::from_utf8(buf).unwrap().contains("#4=IFCBEAM($);"));
    }
}
