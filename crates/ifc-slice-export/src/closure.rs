// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closure construction for assembly and phase exports
//!
//! Both export kinds seed the output with their roots, resolve the roots to
//! member objects and then pull in each member's structural relations,
//! filtered so that no relation points at an object outside the selection.

use crate::filter::{RelationFilter, RelationKind};
use crate::session::ExportSession;
use crate::{ExportError, Result};
use ifc_slice_model::{DecodedEntity, EntityId, EntityResolverExt, IfcType};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Position of `Representation` on every IfcProduct subtype
const PRODUCT_REPRESENTATION_INDEX: usize = 6;

/// How phases are modelled in the source file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseMode {
    /// Phases are presentation layers over the members' geometry
    Layer,
    /// Phases are single-value properties attached to the members
    Property,
}

impl PhaseMode {
    /// Detect the mode from a root entity's type
    pub fn detect(root: &DecodedEntity) -> Option<PhaseMode> {
        match root.ifc_type {
            IfcType::IfcPresentationLayerAssignment => Some(PhaseMode::Layer),
            IfcType::IfcPropertySingleValue => Some(PhaseMode::Property),
            _ => None,
        }
    }
}

/// What a closure pass resolved
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClosureSummary {
    /// Roots processed
    pub roots: usize,
    /// Member objects, in discovery order
    pub members: Vec<EntityId>,
    /// Element assemblies found to own members (phase export only)
    pub assemblies: Vec<EntityId>,
}

/// Drives staging for one export kind
pub struct ClosureBuilder<'s, 'a> {
    session: &'s mut ExportSession<'a>,
}

impl<'s, 'a> ClosureBuilder<'s, 'a> {
    pub fn new(session: &'s mut ExportSession<'a>) -> Self {
        Self { session }
    }

    /// Export whole element assemblies
    pub fn export_assemblies(&mut self, roots: &[Arc<DecodedEntity>]) -> Result<ClosureSummary> {
        let root_set: FxHashSet<EntityId> = roots.iter().map(|r| r.id).collect();
        let mut members = Vec::new();
        let mut seen = FxHashSet::default();

        for root in roots {
            self.session.check_cancelled()?;
            log::info!("Staging assembly {}", root.id);

            self.session.stage_with_children(root);

            for rel in self.relations(root.id, RelationKind::SpatialContainment, "RelatedElements") {
                RelationFilter::stage_kind(self.session, RelationKind::SpatialContainment, &rel, &root_set);
            }
            for rel in self.relations(root.id, RelationKind::PropertyDefinition, "RelatedObjects") {
                RelationFilter::stage_kind(self.session, RelationKind::PropertyDefinition, &rel, &root_set);
            }

            let decomposition = self.relations(root.id, RelationKind::Aggregation, "RelatingObject");
            if decomposition.is_empty() {
                self.missing(RelationKind::Aggregation, root.id);
                continue;
            }
            for aggregation in decomposition {
                self.session.stage_with_children(&aggregation);
                for member in self.named_entities(&aggregation, "RelatedObjects") {
                    if seen.insert(member.id) {
                        members.push(member);
                    }
                }
            }
        }

        let containment: FxHashSet<EntityId> =
            members.iter().map(|m| m.id).chain(root_set.iter().copied()).collect();
        self.stage_member_objects(&members, Some(&containment))?;

        Ok(ClosureSummary {
            roots: roots.len(),
            members: members.iter().map(|m| m.id).collect(),
            assemblies: Vec::new(),
        })
    }

    /// Export construction phases
    ///
    /// Fails with `NoPhasesFound` when the first root is neither a
    /// presentation layer nor a phase property.
    pub fn export_phases(&mut self, roots: &[Arc<DecodedEntity>]) -> Result<ClosureSummary> {
        let mode = roots
            .first()
            .and_then(|root| PhaseMode::detect(root))
            .ok_or(ExportError::NoPhasesFound)?;
        log::info!("Exporting {} phases as {:?}", roots.len(), mode);

        let mut members = Vec::new();
        let mut seen = FxHashSet::default();
        for root in roots {
            self.session.check_cancelled()?;
            if PhaseMode::detect(root) != Some(mode) {
                log::warn!("Skipping phase root {} of type {}", root.id, root.ifc_type);
                continue;
            }

            self.session.stage_with_children(root);
            let found = match mode {
                PhaseMode::Layer => self.layer_members(root),
                PhaseMode::Property => self.property_members(root),
            };
            for member in found {
                if seen.insert(member.id) {
                    members.push(member);
                }
            }
        }

        self.stage_member_objects(&members, None)?;
        let assemblies = self.stage_owning_assemblies(&members);

        Ok(ClosureSummary {
            roots: roots.len(),
            members: members.iter().map(|m| m.id).collect(),
            assemblies,
        })
    }

    /// Object-level staging shared by both export kinds
    ///
    /// Containment relations are staged only when `containment` gives the
    /// set to filter them to.
    pub fn stage_member_objects(
        &mut self,
        members: &[Arc<DecodedEntity>],
        containment: Option<&FxHashSet<EntityId>>,
    ) -> Result<()> {
        let allowed: FxHashSet<EntityId> = members.iter().map(|m| m.id).collect();

        for member in members {
            self.session.check_cancelled()?;

            let associations =
                self.relations(member.id, RelationKind::MaterialAssociation, "RelatedObjects");
            if associations.is_empty() {
                log::debug!("{} has no material association", member.id);
            }
            for assoc in associations {
                RelationFilter::stage_kind(self.session, RelationKind::MaterialAssociation, &assoc, &allowed);
            }

            for voids in self.relations(member.id, RelationKind::Voiding, "RelatingBuildingElement") {
                self.session.stage_with_children(&voids);
            }

            self.session.stage_with_children(member);

            for rel in self.relations(member.id, RelationKind::PropertyDefinition, "RelatedObjects") {
                RelationFilter::stage_kind(self.session, RelationKind::PropertyDefinition, &rel, &allowed);
            }

            if let Some(containment) = containment {
                for rel in self.relations(member.id, RelationKind::SpatialContainment, "RelatedElements") {
                    RelationFilter::stage_kind(self.session, RelationKind::SpatialContainment, &rel, containment);
                }
            }
        }
        Ok(())
    }

    /// Trailing phase pass over aggregations and their assemblies
    ///
    /// Each member's owning aggregation is staged filtered to the members;
    /// an aggregation owned by an element assembly brings the assembly and
    /// the assembly's containment relation along. Every relation and
    /// assembly is visited once.
    fn stage_owning_assemblies(&mut self, members: &[Arc<DecodedEntity>]) -> Vec<EntityId> {
        let member_set: FxHashSet<EntityId> = members.iter().map(|m| m.id).collect();
        let mut visited: FxHashSet<EntityId> = FxHashSet::default();
        let mut assemblies = Vec::new();

        for member in members {
            for aggregation in self.relations(member.id, RelationKind::Aggregation, "RelatedObjects") {
                if !visited.insert(aggregation.id) {
                    continue;
                }
                RelationFilter::stage_kind(self.session, RelationKind::Aggregation, &aggregation, &member_set);

                for owner in self.named_entities(&aggregation, "RelatingObject") {
                    if owner.ifc_type == IfcType::IfcElementAssembly && visited.insert(owner.id) {
                        self.session.stage_with_children(&owner);
                        assemblies.push(owner);
                    }
                }
            }
        }

        let allowed: FxHashSet<EntityId> = member_set
            .iter()
            .copied()
            .chain(assemblies.iter().map(|a| a.id))
            .collect();

        for assembly in &assemblies {
            let containment =
                self.relations(assembly.id, RelationKind::SpatialContainment, "RelatedElements");
            if containment.is_empty() {
                self.missing(RelationKind::SpatialContainment, assembly.id);
            }
            for rel in containment {
                if visited.insert(rel.id) {
                    RelationFilter::stage_kind(self.session, RelationKind::SpatialContainment, &rel, &allowed);
                }
            }
        }
        for member in members {
            for rel in self.relations(member.id, RelationKind::SpatialContainment, "RelatedElements") {
                if visited.insert(rel.id) {
                    RelationFilter::stage_kind(self.session, RelationKind::SpatialContainment, &rel, &allowed);
                }
            }
        }

        assemblies.iter().map(|a| a.id).collect()
    }

    /// Products whose geometry is assigned to a presentation layer
    fn layer_members(&mut self, layer: &DecodedEntity) -> Vec<Arc<DecodedEntity>> {
        let resolver = self.session.resolver();
        let mut products = Vec::new();

        for item in self.named_entities(layer, "AssignedItems") {
            let representations = if item.ifc_type == IfcType::IfcShapeRepresentation {
                vec![item.clone()]
            } else {
                resolver.inverse_via(item.id, &IfcType::IfcShapeRepresentation, "Items")
            };

            let before = products.len();
            for representation in representations {
                for shape in resolver.inverse_via(
                    representation.id,
                    &IfcType::IfcProductDefinitionShape,
                    "Representations",
                ) {
                    products.extend(resolver.inverse_entities(shape.id).into_iter().filter(|p| {
                        p.get_ref(PRODUCT_REPRESENTATION_INDEX) == Some(shape.id)
                    }));
                }
            }
            if products.len() == before {
                self.session.record_error(ExportError::MissingStructuralRelation {
                    relation: "IfcProductDefinitionShape",
                    entity: item.id,
                });
            }
        }
        products
    }

    /// Objects carrying a phase property
    fn property_members(&mut self, property: &DecodedEntity) -> Vec<Arc<DecodedEntity>> {
        let resolver = self.session.resolver();
        let mut objects = Vec::new();

        let property_sets =
            resolver.inverse_via(property.id, &IfcType::IfcPropertySet, "HasProperties");
        if property_sets.is_empty() {
            self.session.record_error(ExportError::MissingStructuralRelation {
                relation: "IfcPropertySet",
                entity: property.id,
            });
        }
        for pset in property_sets {
            for rel in resolver.inverse_via(
                pset.id,
                &IfcType::IfcRelDefinesByProperties,
                "RelatingPropertyDefinition",
            ) {
                objects.extend(self.named_entities(&rel, "RelatedObjects"));
            }
        }
        objects
    }

    /// Relations of `kind` whose `attribute` points at `id`
    fn relations(&self, id: EntityId, kind: RelationKind, attribute: &str) -> Vec<Arc<DecodedEntity>> {
        self.session
            .resolver()
            .inverse_via(id, &kind.ifc_type(), attribute)
    }

    /// Entities referenced by a named attribute
    fn named_entities(&mut self, entity: &DecodedEntity, attribute: &str) -> Vec<Arc<DecodedEntity>> {
        match entity.get_named(attribute) {
            Ok(value) => {
                let mut ids = Vec::new();
                value.collect_refs(&mut ids);
                let resolver = self.session.resolver();
                ids.into_iter().filter_map(|id| resolver.get(id)).collect()
            }
            Err(e) => {
                self.session.record_error(ExportError::AttributeAccess(e));
                Vec::new()
            }
        }
    }

    fn missing(&mut self, kind: RelationKind, entity: EntityId) {
        self.session.record_error(ExportError::MissingStructuralRelation {
            relation: kind.label(),
            entity,
        });
    }
}
