// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural relations and their allow-list filtering
//!
//! A relation such as "this material serves these twelve objects" is copied
//! to the output restricted to the objects being exported. Filtering builds
//! a new entity value; the source relation is never touched.

use crate::session::{ExportSession, StageOutcome};
use crate::ExportError;
use ifc_slice_model::{AttributeValue, DecodedEntity, EntityId, IfcType, ParseError};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// The relation types the closure builder understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    SpatialContainment,
    PropertyDefinition,
    MaterialAssociation,
    Voiding,
    Aggregation,
}

impl RelationKind {
    pub const ALL: [RelationKind; 5] = [
        RelationKind::SpatialContainment,
        RelationKind::PropertyDefinition,
        RelationKind::MaterialAssociation,
        RelationKind::Voiding,
        RelationKind::Aggregation,
    ];

    /// IFC entity type of the relation
    pub fn ifc_type(&self) -> IfcType {
        match self {
            RelationKind::SpatialContainment => IfcType::IfcRelContainedInSpatialStructure,
            RelationKind::PropertyDefinition => IfcType::IfcRelDefinesByProperties,
            RelationKind::MaterialAssociation => IfcType::IfcRelAssociatesMaterial,
            RelationKind::Voiding => IfcType::IfcRelVoidsElement,
            RelationKind::Aggregation => IfcType::IfcRelAggregates,
        }
    }

    /// Attribute intersected with the allowed set before staging
    pub fn filterable_attribute(&self) -> &'static str {
        match self {
            RelationKind::SpatialContainment => "RelatedElements",
            RelationKind::PropertyDefinition => "RelatedObjects",
            RelationKind::MaterialAssociation => "RelatedObjects",
            RelationKind::Voiding => "RelatedOpeningElement",
            RelationKind::Aggregation => "RelatedObjects",
        }
    }

    /// The single "relating" side of the relation
    pub fn relating_attribute(&self) -> &'static str {
        match self {
            RelationKind::SpatialContainment => "RelatingStructure",
            RelationKind::PropertyDefinition => "RelatingPropertyDefinition",
            RelationKind::MaterialAssociation => "RelatingMaterial",
            RelationKind::Voiding => "RelatingBuildingElement",
            RelationKind::Aggregation => "RelatingObject",
        }
    }

    /// Relation kind of an entity type, if it is one of the known relations
    pub fn of(ifc_type: &IfcType) -> Option<RelationKind> {
        Self::ALL.into_iter().find(|kind| &kind.ifc_type() == ifc_type)
    }

    /// IFC type name for messages
    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::SpatialContainment => "IfcRelContainedInSpatialStructure",
            RelationKind::PropertyDefinition => "IfcRelDefinesByProperties",
            RelationKind::MaterialAssociation => "IfcRelAssociatesMaterial",
            RelationKind::Voiding => "IfcRelVoidsElement",
            RelationKind::Aggregation => "IfcRelAggregates",
        }
    }
}

/// Copy of `relation` with `attribute` restricted to `allowed`
///
/// A list keeps the allowed references in their original order and drops
/// everything else. A single reference is kept when allowed and becomes `$`
/// otherwise. Fails when the relation's type has no attribute of that name
/// or the entity stops short of it.
pub fn filtered_relation(
    relation: &DecodedEntity,
    attribute: &str,
    allowed: &FxHashSet<EntityId>,
) -> Result<DecodedEntity, ParseError> {
    let index = ifc_slice_model::schema::attribute_index(&relation.ifc_type, attribute)
        .ok_or_else(|| ParseError::UnknownAttribute {
            entity: relation.id,
            ifc_type: relation.ifc_type.name().to_string(),
            attribute: attribute.to_string(),
        })?;
    let original = relation.get(index).ok_or(ParseError::MissingAttribute {
        entity: relation.id,
        attribute: index,
    })?;

    let filtered = match original {
        AttributeValue::List(items) => AttributeValue::List(
            items
                .iter()
                .filter(|item| item.as_entity_ref().is_some_and(|id| allowed.contains(&id)))
                .cloned()
                .collect(),
        ),
        AttributeValue::EntityRef(id) if !allowed.contains(id) => AttributeValue::Null,
        other => other.clone(),
    };

    let mut copy = relation.clone();
    copy.attributes[index] = filtered;
    Ok(copy)
}

/// Filters relations against an allow-list and stages the copies
pub struct RelationFilter;

impl RelationFilter {
    /// Stage `relation` with `attribute` restricted to `allowed`
    ///
    /// The filtered copy is staged through the session's identity strategy
    /// together with everything it still references (owner history, the
    /// relating side, allowed targets).
    pub fn filter_and_stage(
        session: &mut ExportSession<'_>,
        relation: &DecodedEntity,
        attribute: &str,
        allowed: &FxHashSet<EntityId>,
    ) -> StageOutcome {
        if session.is_staged(relation.id) {
            return Self::widen(session, relation, attribute, allowed);
        }

        let copy = match filtered_relation(relation, attribute, allowed) {
            Ok(copy) => copy,
            Err(e) => {
                session.record_error(ExportError::AttributeAccess(e));
                return StageOutcome::Rejected;
            }
        };

        log::debug!(
            "Staging {} {} with {} filtered to {} allowed targets",
            relation.ifc_type,
            relation.id,
            attribute,
            allowed.len()
        );
        let outcome = session.stage(&copy);
        if outcome == StageOutcome::Added {
            session.remember_filter(relation.id, allowed);
            session.stage_children(&copy);
        }
        outcome
    }

    /// Re-filter a relation staged earlier when `allowed` brings new targets
    ///
    /// The staged copy is replaced in place, so the relation keeps its output
    /// identifier and stays a subset of the source relation.
    fn widen(
        session: &mut ExportSession<'_>,
        relation: &DecodedEntity,
        attribute: &str,
        allowed: &FxHashSet<EntityId>,
    ) -> StageOutcome {
        let Some(merged) = session.widen_filter(relation.id, allowed) else {
            session.record_dedup_hit(relation.id);
            return StageOutcome::AlreadyStaged;
        };

        let copy = match filtered_relation(relation, attribute, &merged) {
            Ok(copy) => copy,
            Err(e) => {
                session.record_error(ExportError::AttributeAccess(e));
                return StageOutcome::Rejected;
            }
        };
        if let Err(source) = session.output_mut().replace(&copy) {
            session.record_error(ExportError::DuplicateOrInvalidEntity {
                entity: relation.id,
                source,
            });
            return StageOutcome::Rejected;
        }

        log::debug!(
            "Widened {} {} to {} allowed targets",
            relation.ifc_type,
            relation.id,
            merged.len()
        );
        session.stage_children(&copy);
        StageOutcome::Widened
    }

    /// Stage a relation of a known kind, filtered on its filterable attribute
    pub fn stage_kind(
        session: &mut ExportSession<'_>,
        kind: RelationKind,
        relation: &DecodedEntity,
        allowed: &FxHashSet<EntityId>,
    ) -> StageOutcome {
        Self::filter_and_stage(session, relation, kind.filterable_attribute(), allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityPolicy;
    use ifc_slice_model::{EntityResolver, IfcModel, SchemaVersion};
    use ifc_slice_parser::{OutputModel, ParsedModel};

    fn reference(id: u64) -> AttributeValue {
        AttributeValue::EntityRef(EntityId(id))
    }

    fn allowed(ids: &[u64]) -> FxHashSet<EntityId> {
        ids.iter().copied().map(EntityId).collect()
    }

    fn material_relation() -> DecodedEntity {
        DecodedEntity::new(
            EntityId(50),
            IfcType::IfcRelAssociatesMaterial,
            vec![
                AttributeValue::String("guid".into()),
                reference(1),
                AttributeValue::Null,
                AttributeValue::Null,
                AttributeValue::List(vec![reference(11), reference(12), reference(13)]),
                reference(60),
            ],
        )
    }

    #[test]
    fn test_filter_keeps_only_allowed_targets() {
        let relation = material_relation();
        let copy = filtered_relation(&relation, "RelatedObjects", &allowed(&[11, 13, 99])).unwrap();

        assert_eq!(
            copy.get_named("RelatedObjects").unwrap(),
            &AttributeValue::List(vec![reference(11), reference(13)])
        );
        // Everything else is untouched
        assert_eq!(copy.attributes[5], reference(60));
        assert_eq!(copy.id, relation.id);
    }

    #[test]
    fn test_filter_never_alters_the_source() {
        let relation = material_relation();
        let before = relation.clone();

        let _ = filtered_relation(&relation, "RelatedObjects", &allowed(&[]));
        let _ = filtered_relation(&relation, "RelatingStructure", &allowed(&[11]));

        assert_eq!(relation, before);
    }

    #[test]
    fn test_filter_single_reference() {
        let voids = DecodedEntity::new(
            EntityId(70),
            IfcType::IfcRelVoidsElement,
            vec![
                AttributeValue::String("guid".into()),
                AttributeValue::Null,
                AttributeValue::Null,
                AttributeValue::Null,
                reference(11),
                reference(71),
            ],
        );
        let kept = filtered_relation(&voids, "RelatedOpeningElement", &allowed(&[71])).unwrap();
        assert_eq!(kept.attributes[5], reference(71));

        let dropped = filtered_relation(&voids, "RelatedOpeningElement", &allowed(&[11])).unwrap();
        assert_eq!(dropped.attributes[5], AttributeValue::Null);
    }

    #[test]
    fn test_filter_unknown_attribute_is_an_error() {
        let relation = material_relation();
        assert!(matches!(
            filtered_relation(&relation, "RelatedElements", &allowed(&[11])),
            Err(ParseError::UnknownAttribute { .. })
        ));

        let mut short = material_relation();
        short.attributes.truncate(4);
        assert!(matches!(
            filtered_relation(&short, "RelatedObjects", &allowed(&[11])),
            Err(ParseError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_relation_kinds() {
        assert_eq!(
            RelationKind::of(&IfcType::IfcRelAggregates),
            Some(RelationKind::Aggregation)
        );
        assert_eq!(RelationKind::of(&IfcType::IfcRelDefinesByType), None);
        for kind in RelationKind::ALL {
            let names = ifc_slice_model::schema::attribute_names(&kind.ifc_type()).unwrap();
            assert!(names.contains(&kind.filterable_attribute()));
            assert!(names.contains(&kind.relating_attribute()));
            assert_eq!(IfcType::parse(kind.label()), kind.ifc_type());
        }
    }

    const MATERIAL_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCOWNERHISTORY($,$,$,.ADDED.,$,$,$,0);
#5=IFCBUILDINGSTOREY('s',#1,'Level 1',$,$,$,$,$,.ELEMENT.,0.);
#11=IFCBEAM('b1',#1,'B1',$,$,$,$,$);
#12=IFCBEAM('b2',#1,'B2',$,$,$,$,$);
#13=IFCBEAM('b3',#1,'B3',$,$,$,$,$);
#50=IFCRELASSOCIATESMATERIAL('m',#1,$,$,(#11,#12,#13),#60);
#60=IFCMATERIAL('S355',$,$);
#70=IFCRELCONTAINEDINSPATIALSTRUCTURE('c',#1,$,$,(#11,#12,#13),#5);
ENDSEC;
END-ISO-10303-21;
"#;

    fn source(model: &ParsedModel, id: u64) -> DecodedEntity {
        model.resolver().get(EntityId(id)).unwrap().as_ref().clone()
    }

    #[test]
    fn test_filter_and_stage_adds_filtered_copy() {
        let model = ParsedModel::parse(MATERIAL_IFC).unwrap();
        let relation = source(&model, 50);
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::PreserveIds, SchemaVersion::Ifc4);

        let outcome =
            RelationFilter::filter_and_stage(&mut session, &relation, "RelatedObjects", &allowed(&[11]));
        assert_eq!(outcome, StageOutcome::Added);

        let out = session.output();
        assert_eq!(out.get_by_source(EntityId(50)).unwrap().get_refs(4), Some(vec![EntityId(11)]));
        for id in [1, 11, 60] {
            assert!(out.contains_source(EntityId(id)), "missing #{id}");
        }
        assert!(!out.contains_source(EntityId(12)));
        assert_eq!(session.report().rejected, 0);
        assert_eq!(source(&model, 50), relation);
    }

    #[test]
    fn test_filter_and_stage_widens_on_new_targets() {
        let model = ParsedModel::parse(MATERIAL_IFC).unwrap();
        let relation = source(&model, 50);
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::NewIds, SchemaVersion::Ifc4);

        let first = RelationKind::MaterialAssociation;
        assert_eq!(
            RelationFilter::stage_kind(&mut session, first, &relation, &allowed(&[13])),
            StageOutcome::Added
        );
        let out_id = session.output().output_id(EntityId(50));

        // Same targets again is a dedup hit
        let hits = session.report().dedup_hits;
        assert_eq!(
            RelationFilter::stage_kind(&mut session, first, &relation, &allowed(&[13])),
            StageOutcome::AlreadyStaged
        );
        assert_eq!(session.report().dedup_hits, hits + 1);

        assert_eq!(
            RelationFilter::stage_kind(&mut session, first, &relation, &allowed(&[11, 99])),
            StageOutcome::Widened
        );
        let out = session.output();
        assert_eq!(out.output_id(EntityId(50)), out_id);
        assert_eq!(
            out.get_by_source(EntityId(50)).unwrap().get_refs(4),
            Some(vec![EntityId(11), EntityId(13)])
        );
        assert!(out.contains_source(EntityId(11)));
        assert!(!out.contains_source(EntityId(12)));
        assert_eq!(out.by_type(&IfcType::IfcRelAssociatesMaterial).len(), 1);
        assert_eq!(source(&model, 50), relation);
    }

    #[test]
    fn test_stage_kind_uses_the_kind_attribute() {
        let model = ParsedModel::parse(MATERIAL_IFC).unwrap();
        let containment = source(&model, 70);
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::PreserveIds, SchemaVersion::Ifc4);

        let outcome = RelationFilter::stage_kind(
            &mut session,
            RelationKind::SpatialContainment,
            &containment,
            &allowed(&[12, 13]),
        );
        assert_eq!(outcome, StageOutcome::Added);
        assert_eq!(
            session.output().get(EntityId(70)).unwrap().get_refs(4),
            Some(vec![EntityId(12), EntityId(13)])
        );
        assert!(session.output().contains_source(EntityId(5)));

        // A kind whose attribute the relation does not carry
        let material = source(&model, 50);
        let outcome =
            RelationFilter::stage_kind(&mut session, RelationKind::Voiding, &material, &allowed(&[11]));
        assert_eq!(outcome, StageOutcome::Rejected);
        assert_eq!(session.report().attribute_access_errors, 1);
        assert!(!session.output().contains_source(EntityId(50)));
    }

    #[test]
    fn test_filter_and_stage_rejected_add_leaves_source_intact() {
        let model = ParsedModel::parse(MATERIAL_IFC).unwrap();
        let relation = source(&model, 50);

        // Output id 50 is taken by an entity copied from another source id
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        out.add(&DecodedEntity::new(EntityId(49), IfcType::IfcBeam, vec![AttributeValue::Null]))
            .unwrap();
        let taken = out
            .create_entity(EntityId(900), IfcType::IfcBeam, vec![AttributeValue::Null])
            .unwrap();
        assert_eq!(taken, EntityId(50));

        let mut session = ExportSession::with_output(model.resolver(), IdentityPolicy::PreserveIds, out);
        let outcome =
            RelationFilter::filter_and_stage(&mut session, &relation, "RelatedObjects", &allowed(&[11]));

        assert_eq!(outcome, StageOutcome::Rejected);
        assert_eq!(session.report().rejected, 1);
        assert_eq!(session.report().staged, 0);
        assert!(!session.output().contains_source(EntityId(50)));
        assert!(!session.output().contains_source(EntityId(11)));
        assert_eq!(session.output().get(EntityId(50)).unwrap().ifc_type, IfcType::IfcBeam);
        assert_eq!(source(&model, 50), relation);
        assert_eq!(relation.get_refs(4).unwrap().len(), 3);
    }
}
