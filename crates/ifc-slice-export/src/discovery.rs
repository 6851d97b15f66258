// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of exportable roots: element assemblies and phases

use crate::{ExportError, Result};
use ifc_slice_model::{DecodedEntity, EntityId, EntityResolver, EntityResolverExt, IfcType};
use serde::Serialize;

/// Label used when an assembly carries no `AssemblyMark` property
pub const NO_ASSEMBLY_MARK: &str = "NO ASSEMBLY MARK";

/// One selectable row: an assembly or a phase marker
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredRoot {
    pub id: EntityId,
    /// Assembly mark, layer name or phase value
    pub mark: String,
    pub global_id: Option<String>,
    pub name: Option<String>,
    pub ifc_type: String,
}

impl DiscoveredRoot {
    fn new(entity: &DecodedEntity, mark: String) -> Self {
        let text = |name: &str| {
            entity
                .get_named(name)
                .ok()
                .and_then(|v| v.as_string())
                .map(|s| s.replace("''", "'"))
        };
        Self {
            id: entity.id,
            mark,
            global_id: text("GlobalId"),
            name: text("Name"),
            ifc_type: entity.ifc_type.name().to_string(),
        }
    }
}

/// Every element assembly, labelled with its assembly mark
pub fn find_assemblies(resolver: &dyn EntityResolver) -> Result<Vec<DiscoveredRoot>> {
    let assemblies = resolver.entities_by_type(&IfcType::IfcElementAssembly);
    log::info!("Found {} assemblies", assemblies.len());
    if assemblies.is_empty() {
        return Err(ExportError::NoAssembliesFound);
    }

    Ok(assemblies
        .iter()
        .map(|assembly| {
            let mark = assembly_mark(resolver, assembly).unwrap_or_else(|| NO_ASSEMBLY_MARK.to_string());
            DiscoveredRoot::new(assembly, mark)
        })
        .collect())
}

/// Value of the `AssemblyMark` property defined on `assembly`
pub fn assembly_mark(resolver: &dyn EntityResolver, assembly: &DecodedEntity) -> Option<String> {
    property_value(resolver, assembly.id, "AssemblyMark")
}

/// First single-value property named `property` reachable through the
/// entity's property-set definitions
pub fn property_value(resolver: &dyn EntityResolver, id: EntityId, property: &str) -> Option<String> {
    for rel in resolver.inverse_via(id, &IfcType::IfcRelDefinesByProperties, "RelatedObjects") {
        let Some(pset) = rel
            .get_named("RelatingPropertyDefinition")
            .ok()
            .and_then(|v| resolver.resolve_ref(v))
        else {
            continue;
        };
        let Ok(properties) = pset.get_named("HasProperties") else {
            continue;
        };
        for prop in resolver.resolve_ref_list(properties) {
            if prop.ifc_type == IfcType::IfcPropertySingleValue
                && prop.get_named("Name").ok().and_then(|v| v.as_string()) == Some(property)
            {
                return prop
                    .get_named("NominalValue")
                    .ok()
                    .map(|v| v.display_value());
            }
        }
    }
    None
}

/// Phase markers: presentation layers when the file has any, otherwise
/// single-value properties named `Phase`
pub fn find_phases(resolver: &dyn EntityResolver) -> Result<Vec<DiscoveredRoot>> {
    let layers = resolver.entities_by_type(&IfcType::IfcPresentationLayerAssignment);
    if !layers.is_empty() {
        log::info!("Found {} presentation layers", layers.len());
        return Ok(layers
            .iter()
            .map(|layer| {
                let mark = layer
                    .get_named("Name")
                    .ok()
                    .map(|v| v.display_value())
                    .unwrap_or_default();
                DiscoveredRoot::new(layer, mark)
            })
            .collect());
    }

    let phases: Vec<DiscoveredRoot> = resolver
        .entities_by_type(&IfcType::IfcPropertySingleValue)
        .iter()
        .filter(|p| p.get_named("Name").ok().and_then(|v| v.as_string()) == Some("Phase"))
        .map(|p| {
            let mark = p
                .get_named("NominalValue")
                .ok()
                .map(|v| v.display_value())
                .unwrap_or_default();
            DiscoveredRoot::new(p, mark)
        })
        .collect();
    log::info!("Found {} phase properties", phases.len());

    if phases.is_empty() {
        Err(ExportError::NoPhasesFound)
    } else {
        Ok(phases)
    }
}
