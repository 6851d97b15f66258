// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forward-reference traversal over the source model

use ifc_slice_model::{DecodedEntity, EntityId, EntityResolver};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Attribute names never treated as structural references
pub const NON_STRUCTURAL_ATTRIBUTES: &[&str] = &["id", "type", "Name", "Description", "GlobalId"];

/// Enumerates the entities an entity points at, directly or transitively
///
/// Only forward references are followed; inverse relations are never
/// chased here, so the closure of an element stays within its own
/// placement, representation and ownership data.
#[derive(Clone, Copy)]
pub struct EntityGraphWalker<'a> {
    resolver: &'a dyn EntityResolver,
}

impl<'a> EntityGraphWalker<'a> {
    pub fn new(resolver: &'a dyn EntityResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &'a dyn EntityResolver {
        self.resolver
    }

    /// IDs referenced by `entity`, in attribute order
    ///
    /// Nested lists are searched element by element; scalars are ignored.
    pub fn child_ids(&self, entity: &DecodedEntity) -> Vec<EntityId> {
        let mut ids = Vec::new();
        for (index, value) in entity.attributes.iter().enumerate() {
            if entity
                .attribute_name(index)
                .is_some_and(|name| NON_STRUCTURAL_ATTRIBUTES.contains(&name))
            {
                continue;
            }
            value.collect_refs(&mut ids);
        }
        ids
    }

    /// Entities directly referenced by `entity`
    ///
    /// References that do not resolve in the source model are skipped.
    pub fn children_of(&self, entity: &DecodedEntity) -> Vec<Arc<DecodedEntity>> {
        self.child_ids(entity)
            .into_iter()
            .filter_map(|id| {
                let child = self.resolver.get(id);
                if child.is_none() {
                    log::debug!("{} references {} which is not in the source model", entity.id, id);
                }
                child
            })
            .collect()
    }

    /// Every entity transitively reachable from `entity`, depth first
    ///
    /// Each entity is returned once. `entity` itself is excluded, even when
    /// a cycle leads back to it.
    pub fn children_recursive(&self, entity: &DecodedEntity) -> Vec<Arc<DecodedEntity>> {
        let mut visited = FxHashSet::default();
        visited.insert(entity.id);

        let mut result = Vec::new();
        let mut stack: Vec<Arc<DecodedEntity>> = self.children_of(entity);
        stack.reverse();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.id) {
                continue;
            }
            let mut next = self.children_of(&current);
            next.reverse();
            stack.extend(next);
            result.push(current);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::{IfcModel, IfcType};
    use ifc_slice_parser::ParsedModel;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCOWNERHISTORY(#2,$,$,.ADDED.,$,$,$,0);
#2=IFCPERSONANDORGANIZATION(#3,$,$);
#3=IFCPERSON($,'Doe',$,$,$,$,$,$);
#10=IFCBEAM('guid',#1,'Beam',$,$,#20,#30,$);
#20=IFCLOCALPLACEMENT(#21,#22);
#21=IFCLOCALPLACEMENT($,#22);
#22=IFCAXIS2PLACEMENT3D(#23,$,$);
#23=IFCCARTESIANPOINT((0.,0.,0.));
#30=IFCPRODUCTDEFINITIONSHAPE($,$,(#31,#77));
#31=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#32));
#32=IFCEXTRUDEDAREASOLID(#33,#22,$,1.);
#33=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,0.1,0.2);
#40=IFCRELAGGREGATES('g',$,$,$,#41,(#42));
#41=IFCELEMENTASSEMBLY('a',$,$,$,$,$,$,$,$,$);
#42=IFCRELAGGREGATES('h',$,$,$,#41,(#40));
ENDSEC;
END-ISO-10303-21;
"#;

    fn ids(entities: &[Arc<DecodedEntity>]) -> Vec<u64> {
        entities.iter().map(|e| e.id.0).collect()
    }

    #[test]
    fn test_children_of_skips_metadata_and_missing() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let walker = EntityGraphWalker::new(model.resolver());
        let beam = model.resolver().get(EntityId(10)).unwrap();

        assert_eq!(walker.child_ids(&beam), vec![EntityId(1), EntityId(20), EntityId(30)]);

        let pds = model.resolver().get(EntityId(30)).unwrap();
        // #77 does not exist
        assert_eq!(walker.child_ids(&pds), vec![EntityId(31), EntityId(77)]);
        assert_eq!(ids(&walker.children_of(&pds)), vec![31]);
    }

    #[test]
    fn test_children_recursive_is_depth_first_and_unique() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let walker = EntityGraphWalker::new(model.resolver());
        let beam = model.resolver().get(EntityId(10)).unwrap();

        let closure = ids(&walker.children_recursive(&beam));
        assert_eq!(closure, vec![1, 2, 3, 20, 21, 22, 23, 30, 31, 32, 33]);
    }

    #[test]
    fn test_children_recursive_terminates_on_cycles() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let walker = EntityGraphWalker::new(model.resolver());
        let rel = model.resolver().get(EntityId(40)).unwrap();

        let closure = walker.children_recursive(&rel);
        assert_eq!(ids(&closure), vec![41, 42]);
        assert!(closure.iter().all(|e| e.id != rel.id));
        assert_eq!(closure[0].ifc_type, IfcType::IfcElementAssembly);
    }
}
