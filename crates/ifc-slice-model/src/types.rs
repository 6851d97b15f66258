// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifiers, entity types and attribute values shared by the reader,
//! the output model and the export engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// STEP instance name: `#123` is `EntityId(123)`
///
/// Instance names are positive, so `EntityId(0)` never names an entity.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Declares the known entity types once and derives parsing and naming
/// from the same list, so a type can never parse without also printing.
macro_rules! ifc_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Entity type keyword
        ///
        /// Named variants are the types exports reason about. Anything else
        /// is kept as `Unknown` with its upper-case keyword and is written
        /// back unchanged.
        #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum IfcType {
            $($variant,)+
            Unknown(String),
        }

        impl IfcType {
            /// Case-insensitive keyword lookup
            pub fn parse(s: &str) -> Self {
                let upper = s.to_ascii_uppercase();
                match upper.as_str() {
                    $($name => IfcType::$variant,)+
                    _ => IfcType::Unknown(upper),
                }
            }

            /// Upper-case STEP keyword
            pub fn name(&self) -> &str {
                match self {
                    $(IfcType::$variant => $name,)+
                    IfcType::Unknown(s) => s,
                }
            }
        }
    };
}

ifc_types! {
    // Context
    IfcProject => "IFCPROJECT",
    IfcSite => "IFCSITE",
    IfcBuilding => "IFCBUILDING",
    IfcBuildingStorey => "IFCBUILDINGSTOREY",
    IfcSpace => "IFCSPACE",
    IfcOrganization => "IFCORGANIZATION",
    IfcPerson => "IFCPERSON",
    IfcPersonAndOrganization => "IFCPERSONANDORGANIZATION",
    IfcApplication => "IFCAPPLICATION",
    IfcOwnerHistory => "IFCOWNERHISTORY",

    // Building elements
    IfcElementAssembly => "IFCELEMENTASSEMBLY",
    IfcWall => "IFCWALL",
    IfcWallStandardCase => "IFCWALLSTANDARDCASE",
    IfcCurtainWall => "IFCCURTAINWALL",
    IfcSlab => "IFCSLAB",
    IfcRoof => "IFCROOF",
    IfcBeam => "IFCBEAM",
    IfcColumn => "IFCCOLUMN",
    IfcDoor => "IFCDOOR",
    IfcWindow => "IFCWINDOW",
    IfcStair => "IFCSTAIR",
    IfcStairFlight => "IFCSTAIRFLIGHT",
    IfcRamp => "IFCRAMP",
    IfcRampFlight => "IFCRAMPFLIGHT",
    IfcRailing => "IFCRAILING",
    IfcCovering => "IFCCOVERING",
    IfcPlate => "IFCPLATE",
    IfcMember => "IFCMEMBER",
    IfcFooting => "IFCFOOTING",
    IfcPile => "IFCPILE",
    IfcBuildingElementPart => "IFCBUILDINGELEMENTPART",
    IfcBuildingElementProxy => "IFCBUILDINGELEMENTPROXY",
    IfcDiscreteAccessory => "IFCDISCRETEACCESSORY",
    IfcMechanicalFastener => "IFCMECHANICALFASTENER",
    IfcFastener => "IFCFASTENER",
    IfcReinforcingBar => "IFCREINFORCINGBAR",
    IfcReinforcingMesh => "IFCREINFORCINGMESH",
    IfcTendon => "IFCTENDON",

    // Openings
    IfcOpeningElement => "IFCOPENINGELEMENT",
    IfcOpeningStandardCase => "IFCOPENINGSTANDARDCASE",
    IfcVoidingFeature => "IFCVOIDINGFEATURE",

    // Grids
    IfcGrid => "IFCGRID",
    IfcGridAxis => "IFCGRIDAXIS",

    // Placement and representation
    IfcLocalPlacement => "IFCLOCALPLACEMENT",
    IfcGridPlacement => "IFCGRIDPLACEMENT",
    IfcAxis2Placement2D => "IFCAXIS2PLACEMENT2D",
    IfcAxis2Placement3D => "IFCAXIS2PLACEMENT3D",
    IfcCartesianPoint => "IFCCARTESIANPOINT",
    IfcDirection => "IFCDIRECTION",
    IfcPolyline => "IFCPOLYLINE",
    IfcExtrudedAreaSolid => "IFCEXTRUDEDAREASOLID",
    IfcRectangleProfileDef => "IFCRECTANGLEPROFILEDEF",
    IfcFacetedBrep => "IFCFACETEDBREP",
    IfcMappedItem => "IFCMAPPEDITEM",
    IfcRepresentationMap => "IFCREPRESENTATIONMAP",
    IfcShapeRepresentation => "IFCSHAPEREPRESENTATION",
    IfcProductDefinitionShape => "IFCPRODUCTDEFINITIONSHAPE",
    IfcGeometricRepresentationContext => "IFCGEOMETRICREPRESENTATIONCONTEXT",
    IfcGeometricRepresentationSubContext => "IFCGEOMETRICREPRESENTATIONSUBCONTEXT",
    IfcPresentationLayerAssignment => "IFCPRESENTATIONLAYERASSIGNMENT",
    IfcStyledItem => "IFCSTYLEDITEM",

    // Relationships
    IfcRelAggregates => "IFCRELAGGREGATES",
    IfcRelContainedInSpatialStructure => "IFCRELCONTAINEDINSPATIALSTRUCTURE",
    IfcRelDefinesByProperties => "IFCRELDEFINESBYPROPERTIES",
    IfcRelDefinesByType => "IFCRELDEFINESBYTYPE",
    IfcRelAssociatesMaterial => "IFCRELASSOCIATESMATERIAL",
    IfcRelVoidsElement => "IFCRELVOIDSELEMENT",
    IfcRelFillsElement => "IFCRELFILLSELEMENT",
    IfcRelDeclares => "IFCRELDECLARES",

    // Properties
    IfcPropertySet => "IFCPROPERTYSET",
    IfcPropertySingleValue => "IFCPROPERTYSINGLEVALUE",
    IfcElementQuantity => "IFCELEMENTQUANTITY",

    // Materials
    IfcMaterial => "IFCMATERIAL",
    IfcMaterialList => "IFCMATERIALLIST",
    IfcMaterialLayer => "IFCMATERIALLAYER",
    IfcMaterialLayerSet => "IFCMATERIALLAYERSET",
    IfcMaterialLayerSetUsage => "IFCMATERIALLAYERSETUSAGE",
    IfcMaterialProfile => "IFCMATERIALPROFILE",
    IfcMaterialProfileSet => "IFCMATERIALPROFILESET",
    IfcMaterialProfileSetUsage => "IFCMATERIALPROFILESETUSAGE",

    // Units
    IfcUnitAssignment => "IFCUNITASSIGNMENT",
    IfcSIUnit => "IFCSIUNIT",
}

impl FromStr for IfcType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl IfcType {
    /// `IfcRel*` objectified relationships
    pub fn is_relationship(&self) -> bool {
        self.name().starts_with("IFCREL")
    }
}

impl fmt::Display for IfcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// IFC schema version declared in FILE_SCHEMA
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaVersion {
    Ifc2x3,
    #[default]
    Ifc4,
    Ifc4x3,
}

impl SchemaVersion {
    /// All schema versions an export can target
    pub const ALL: [SchemaVersion; 3] = [
        SchemaVersion::Ifc2x3,
        SchemaVersion::Ifc4,
        SchemaVersion::Ifc4x3,
    ];

    /// FILE_SCHEMA identifier
    pub fn identifier(&self) -> &'static str {
        match self {
            SchemaVersion::Ifc2x3 => "IFC2X3",
            SchemaVersion::Ifc4 => "IFC4",
            SchemaVersion::Ifc4x3 => "IFC4X3",
        }
    }

    /// Parse a FILE_SCHEMA identifier (`IFC4X3_ADD2` maps to `IFC4X3`)
    pub fn from_identifier(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.starts_with("IFC4X3") {
            Some(SchemaVersion::Ifc4x3)
        } else if upper.starts_with("IFC2X3") {
            Some(SchemaVersion::Ifc2x3)
        } else if upper.starts_with("IFC4") {
            Some(SchemaVersion::Ifc4)
        } else {
            None
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_identifier(s).ok_or_else(|| format!("unsupported schema version: {s}"))
    }
}

/// One attribute of a STEP instance
#[derive(Clone, Debug, PartialEq, Default)]
pub enum AttributeValue {
    /// `$`
    #[default]
    Null,
    /// `*`, a value the schema derives
    Derived,
    EntityRef(EntityId),
    /// `.T.` / `.F.`
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Body of a quoted string with `''` escapes left in place
    String(String),
    /// `.NAME.`
    Enum(String),
    List(Vec<AttributeValue>),
    /// Wrapped select value, e.g. `IFCLABEL('A-12')`
    TypedValue(String, Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        if let AttributeValue::EntityRef(id) = self {
            Some(*id)
        } else {
            None
        }
    }

    /// String body, looking through a typed wrapper such as `IFCLABEL`
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(text) => Some(text),
            AttributeValue::TypedValue(_, inner) => inner.first()?.as_string(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        if let AttributeValue::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Human-readable text: escapes collapsed, wrappers removed, lists comma separated
    pub fn display_value(&self) -> String {
        match self {
            AttributeValue::Null | AttributeValue::Derived => String::new(),
            AttributeValue::EntityRef(id) => id.to_string(),
            AttributeValue::Bool(flag) => flag.to_string(),
            AttributeValue::Integer(n) => n.to_string(),
            AttributeValue::Float(x) => x.to_string(),
            AttributeValue::String(text) => text.replace("''", "'"),
            AttributeValue::Enum(name) => name.clone(),
            AttributeValue::List(items) => {
                let parts: Vec<String> = items.iter().map(Self::display_value).collect();
                parts.join(", ")
            }
            AttributeValue::TypedValue(_, inner) => {
                inner.first().map(Self::display_value).unwrap_or_default()
            }
        }
    }

    /// Push every reference in this value, depth first, onto `out`
    pub fn collect_refs(&self, out: &mut Vec<EntityId>) {
        match self {
            AttributeValue::EntityRef(id) => out.push(*id),
            AttributeValue::List(items) => items.iter().for_each(|item| item.collect_refs(out)),
            _ => {}
        }
    }

    /// `true` when `target` appears in this value or any nested list
    pub fn references(&self, target: EntityId) -> bool {
        match self {
            AttributeValue::EntityRef(id) => *id == target,
            AttributeValue::List(items) => items.iter().any(|item| item.references(target)),
            _ => false,
        }
    }
}

/// A STEP instance with its attributes decoded positionally
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEntity {
    pub id: EntityId,
    pub ifc_type: IfcType,
    pub attributes: Vec<AttributeValue>,
}

impl DecodedEntity {
    pub fn new(id: EntityId, ifc_type: IfcType, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            ifc_type,
            attributes,
        }
    }

    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    /// Reference held directly at position `index`
    pub fn get_ref(&self, index: usize) -> Option<EntityId> {
        self.get(index)?.as_entity_ref()
    }

    /// References in the list at position `index`; non-reference items are skipped
    pub fn get_refs(&self, index: usize) -> Option<Vec<EntityId>> {
        let items = self.get(index)?.as_list()?;
        Some(items.iter().filter_map(AttributeValue::as_entity_ref).collect())
    }

    /// Attribute looked up through the [`schema`](crate::schema) name table
    ///
    /// Fails with `UnknownAttribute` when the table has no such name for this
    /// type, and with `MissingAttribute` when the instance is shorter than the
    /// name's position (an attribute added in a later schema).
    pub fn get_named(&self, name: &str) -> crate::Result<&AttributeValue> {
        let Some(index) = crate::schema::attribute_index(&self.ifc_type, name) else {
            return Err(crate::ParseError::UnknownAttribute {
                entity: self.id,
                ifc_type: self.ifc_type.to_string(),
                attribute: name.to_owned(),
            });
        };
        self.get(index).ok_or(crate::ParseError::MissingAttribute {
            entity: self.id,
            attribute: index,
        })
    }

    /// Name of the attribute at `index`, if the table knows this type
    pub fn attribute_name(&self, index: usize) -> Option<&'static str> {
        crate::schema::attribute_name(&self.ifc_type, index)
    }

    /// All references in attribute order, duplicates kept
    pub fn references(&self) -> Vec<EntityId> {
        let mut found = Vec::new();
        self.attributes
            .iter()
            .for_each(|value| value.collect_refs(&mut found));
        found
    }
}

/// HEADER section of a source file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// FILE_SCHEMA identifier as written, e.g. `IFC4X3_ADD2`
    pub schema_version: String,
    pub originating_system: Option<String>,
    pub preprocessor_version: Option<String>,
    pub file_name: Option<String>,
    pub file_description: Option<String>,
    /// First FILE_NAME author
    pub author: Option<String>,
    /// First FILE_NAME organization
    pub organization: Option<String>,
    pub timestamp: Option<String>,
}

impl ModelMetadata {
    /// Declared schema, if it is one the writer supports
    pub fn schema(&self) -> Option<SchemaVersion> {
        SchemaVersion::from_identifier(&self.schema_version)
    }
}
