// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute names for the entity types the export engine inspects
//!
//! STEP stores attributes positionally. The tables below give the explicit
//! attribute names in declaration order (supertype attributes first), shared
//! by IFC2X3, IFC4 and IFC4X3 for the leading positions. An entity written in
//! an older schema may stop short of a name listed here, in which case named
//! access fails with `MissingAttribute`.

use crate::IfcType;

const ROOT: &[&str] = &["GlobalId", "OwnerHistory", "Name", "Description"];

const ELEMENT: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "Tag",
];

const ELEMENT_ASSEMBLY: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "Tag",
    "AssemblyPlace",
    "PredefinedType",
];

const PROJECT: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "LongName",
    "Phase",
    "RepresentationContexts",
    "UnitsInContext",
];

const SITE: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "LongName",
    "CompositionType",
    "RefLatitude",
    "RefLongitude",
    "RefElevation",
    "LandTitleNumber",
    "SiteAddress",
];

const BUILDING: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "LongName",
    "CompositionType",
    "ElevationOfRefHeight",
    "ElevationOfTerrain",
    "BuildingAddress",
];

const STOREY: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "LongName",
    "CompositionType",
    "Elevation",
];

const SPACE: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "LongName",
    "CompositionType",
    "PredefinedType",
    "ElevationWithFlooring",
];

const GRID: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "ObjectType",
    "ObjectPlacement",
    "Representation",
    "UAxes",
    "VAxes",
    "WAxes",
    "PredefinedType",
];

const REL_AGGREGATES: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatingObject",
    "RelatedObjects",
];

const REL_CONTAINED: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatedElements",
    "RelatingStructure",
];

const REL_DEFINES_BY_PROPERTIES: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatedObjects",
    "RelatingPropertyDefinition",
];

const REL_DEFINES_BY_TYPE: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatedObjects",
    "RelatingType",
];

const REL_ASSOCIATES_MATERIAL: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatedObjects",
    "RelatingMaterial",
];

const REL_VOIDS: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatingBuildingElement",
    "RelatedOpeningElement",
];

const REL_FILLS: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatingOpeningElement",
    "RelatedBuildingElement",
];

const REL_DECLARES: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "RelatingContext",
    "RelatedDefinitions",
];

const PROPERTY_SET: &[&str] = &["GlobalId", "OwnerHistory", "Name", "Description", "HasProperties"];

const ELEMENT_QUANTITY: &[&str] = &[
    "GlobalId",
    "OwnerHistory",
    "Name",
    "Description",
    "MethodOfMeasurement",
    "Quantities",
];

const PROPERTY_SINGLE_VALUE: &[&str] = &["Name", "Description", "NominalValue", "Unit"];

const LAYER_ASSIGNMENT: &[&str] = &["Name", "Description", "AssignedItems", "Identifier"];

const SHAPE_REPRESENTATION: &[&str] = &[
    "ContextOfItems",
    "RepresentationIdentifier",
    "RepresentationType",
    "Items",
];

const PRODUCT_DEFINITION_SHAPE: &[&str] = &["Name", "Description", "Representations"];

const MAPPED_ITEM: &[&str] = &["MappingSource", "MappingTarget"];

const LOCAL_PLACEMENT: &[&str] = &["PlacementRelTo", "RelativePlacement"];

const GRID_AXIS: &[&str] = &["AxisTag", "AxisCurve", "SameSense"];

const MATERIAL: &[&str] = &["Name", "Description", "Category"];

const ORGANIZATION: &[&str] = &["Identification", "Name", "Description", "Roles", "Addresses"];

const PERSON: &[&str] = &[
    "Identification",
    "FamilyName",
    "GivenName",
    "MiddleNames",
    "PrefixTitles",
    "SuffixTitles",
    "Roles",
    "Addresses",
];

const PERSON_AND_ORGANIZATION: &[&str] = &["ThePerson", "TheOrganization", "Roles"];

const APPLICATION: &[&str] = &[
    "ApplicationDeveloper",
    "Version",
    "ApplicationFullName",
    "ApplicationIdentifier",
];

const OWNER_HISTORY: &[&str] = &[
    "OwningUser",
    "OwningApplication",
    "State",
    "ChangeAction",
    "LastModifiedDate",
    "LastModifyingUser",
    "LastModifyingApplication",
    "CreationDate",
];

/// Explicit attribute names of `ifc_type` in positional order
///
/// Returns `None` for types without a table; such entities are still walked
/// positionally but cannot be accessed by name.
pub fn attribute_names(ifc_type: &IfcType) -> Option<&'static [&'static str]> {
    use IfcType::*;

    let names = match ifc_type {
        IfcProject => PROJECT,
        IfcSite => SITE,
        IfcBuilding => BUILDING,
        IfcBuildingStorey => STOREY,
        IfcSpace => SPACE,
        IfcElementAssembly => ELEMENT_ASSEMBLY,
        IfcWall | IfcWallStandardCase | IfcCurtainWall | IfcSlab | IfcRoof | IfcBeam
        | IfcColumn | IfcStair | IfcStairFlight | IfcRamp | IfcRampFlight | IfcRailing
        | IfcCovering | IfcPlate | IfcMember | IfcFooting | IfcPile | IfcBuildingElementPart
        | IfcBuildingElementProxy | IfcDiscreteAccessory | IfcMechanicalFastener
        | IfcFastener | IfcReinforcingBar | IfcReinforcingMesh | IfcTendon
        | IfcOpeningElement | IfcOpeningStandardCase | IfcVoidingFeature | IfcDoor
        | IfcWindow => ELEMENT,
        IfcGrid => GRID,
        IfcGridAxis => GRID_AXIS,
        IfcRelAggregates => REL_AGGREGATES,
        IfcRelContainedInSpatialStructure => REL_CONTAINED,
        IfcRelDefinesByProperties => REL_DEFINES_BY_PROPERTIES,
        IfcRelDefinesByType => REL_DEFINES_BY_TYPE,
        IfcRelAssociatesMaterial => REL_ASSOCIATES_MATERIAL,
        IfcRelVoidsElement => REL_VOIDS,
        IfcRelFillsElement => REL_FILLS,
        IfcRelDeclares => REL_DECLARES,
        IfcPropertySet => PROPERTY_SET,
        IfcElementQuantity => ELEMENT_QUANTITY,
        IfcPropertySingleValue => PROPERTY_SINGLE_VALUE,
        IfcPresentationLayerAssignment => LAYER_ASSIGNMENT,
        IfcShapeRepresentation => SHAPE_REPRESENTATION,
        IfcProductDefinitionShape => PRODUCT_DEFINITION_SHAPE,
        IfcMappedItem => MAPPED_ITEM,
        IfcLocalPlacement => LOCAL_PLACEMENT,
        IfcMaterial => MATERIAL,
        IfcOrganization => ORGANIZATION,
        IfcPerson => PERSON,
        IfcPersonAndOrganization => PERSON_AND_ORGANIZATION,
        IfcApplication => APPLICATION,
        IfcOwnerHistory => OWNER_HISTORY,
        Unknown(name) if name.starts_with("IFCREL") => ROOT,
        _ => return None,
    };
    Some(names)
}

/// Position of the attribute called `name`, if the type's table lists it
pub fn attribute_index(ifc_type: &IfcType, name: &str) -> Option<usize> {
    attribute_names(ifc_type)?.iter().position(|n| *n == name)
}

/// Name of the attribute at `index`, if the type's table covers it
pub fn attribute_name(ifc_type: &IfcType, index: usize) -> Option<&'static str> {
    attribute_names(ifc_type)?.get(index).copied()
}
