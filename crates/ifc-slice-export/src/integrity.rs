// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed-graph verification of the output model
//!
//! Every forward reference held by an output entity must name an entity
//! that is also in the output. Gaps are healed by staging the missing
//! entity with its full forward closure; entities added that way are
//! checked in turn.

use crate::session::{ExportSession, StageOutcome};
use crate::walker::NON_STRUCTURAL_ATTRIBUTES;
use crate::ExportError;
use ifc_slice_model::{DecodedEntity, EntityId};
use ifc_slice_parser::{DanglingReference, OutputModel};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::VecDeque;

/// One missing reference found by the checker
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealedReference {
    /// Output ID of the entity holding the reference
    pub referrer: EntityId,
    /// Attribute name, when the referrer's type has named attributes
    pub attribute: Option<&'static str>,
    /// Source ID of the missing target
    pub missing: EntityId,
    /// Whether the target is now in the output model
    pub healed: bool,
    /// Entities added while healing (target plus its closure)
    pub added: usize,
}

/// Finds and backfills references that leave the output model
pub struct ReferenceIntegrityChecker;

impl ReferenceIntegrityChecker {
    /// Heal every reference that does not resolve within the output model
    ///
    /// Returns one record per distinct missing entity. Healing runs through
    /// the session, so it honours the session's identity policy and dedup
    /// guard and is counted in its report.
    pub fn check(session: &mut ExportSession<'_>) -> Vec<HealedReference> {
        let mut queue: VecDeque<EntityId> = session.output().ids().into();
        let mut attempted: FxHashSet<EntityId> = FxHashSet::default();
        let mut records = Vec::new();

        while let Some(out_id) = queue.pop_front() {
            let Some(entity) = session.output().get(out_id).cloned() else {
                continue;
            };

            for (attribute, missing) in structural_refs(&entity) {
                if session.output().contains_source(missing) || !attempted.insert(missing) {
                    continue;
                }

                let added = Self::backfill(session, missing, &mut queue);
                let healed = session.output().contains_source(missing);

                if healed {
                    session.report_mut().healed += 1;
                    if session.policy() == crate::IdentityPolicy::NewIds {
                        log::warn!(
                            "{} was missing under new identifiers (closure gap), added with {} entities",
                            missing,
                            added
                        );
                    } else {
                        log::info!("{} was missing so added to model with {} entities", missing, added);
                    }
                } else {
                    session.record_error(ExportError::UnresolvedForwardReference {
                        referrer: out_id,
                        missing,
                    });
                }

                records.push(HealedReference {
                    referrer: out_id,
                    attribute,
                    missing,
                    healed,
                    added,
                });
            }
        }

        records
    }

    /// Stage `missing` and its closure, queueing every new output entity
    fn backfill(
        session: &mut ExportSession<'_>,
        missing: EntityId,
        queue: &mut VecDeque<EntityId>,
    ) -> usize {
        let Some(target) = session.resolver().get(missing) else {
            log::debug!("{} is not in the source model", missing);
            return 0;
        };

        let mut candidates = vec![target.clone()];
        candidates.extend(session.walker().children_recursive(&target));

        let mut added = 0;
        for candidate in candidates {
            if session.stage(&candidate) == StageOutcome::Added {
                added += 1;
                if let Some(out_id) = session.output().output_id(candidate.id) {
                    queue.push_back(out_id);
                }
            }
        }
        added
    }

    /// References that do not resolve within `output`, without healing
    pub fn unresolved(output: &OutputModel) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for (id, entity) in output.iter() {
            for (_, missing) in structural_refs(entity) {
                if !output.contains_source(missing) {
                    dangling.push(DanglingReference {
                        referrer: id,
                        missing,
                    });
                }
            }
        }
        dangling
    }
}

/// (attribute name, target) for every reference outside the metadata attributes
fn structural_refs(entity: &DecodedEntity) -> Vec<(Option<&'static str>, EntityId)> {
    let mut refs = Vec::new();
    for (index, value) in entity.attributes.iter().enumerate() {
        let name = entity.attribute_name(index);
        if name.is_some_and(|n| NON_STRUCTURAL_ATTRIBUTES.contains(&n)) {
            continue;
        }
        let mut targets = Vec::new();
        value.collect_refs(&mut targets);
        refs.extend(targets.into_iter().map(|target| (name, target)));
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityPolicy;
    use ifc_slice_model::{AttributeValue, IfcModel, IfcType, SchemaVersion};
    use ifc_slice_parser::ParsedModel;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCOWNERHISTORY(#2,$,$,.ADDED.,$,$,$,0);
#2=IFCPERSONANDORGANIZATION(#3,$,$);
#3=IFCPERSON($,'Doe',$,$,$,$,$,$);
#10=IFCBEAM('a',#1,'A',$,$,#20,$,$);
#20=IFCLOCALPLACEMENT($,#21);
#21=IFCAXIS2PLACEMENT3D(#22,$,$);
#22=IFCCARTESIANPOINT((0.,0.,0.));
#30=IFCBEAM('b',#1,'B',$,$,#20,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_dangling_reference_is_healed() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::PreserveIds, SchemaVersion::Ifc4);

        // A references B (#20) which is absent
        let a = model.resolver().get(EntityId(10)).unwrap();
        let mut only_placement = (*a).clone();
        only_placement.attributes[1] = AttributeValue::Null;
        session.output_mut().add(&only_placement).unwrap();
        assert_eq!(ReferenceIntegrityChecker::unresolved(session.output()).len(), 1);

        let healed = ReferenceIntegrityChecker::check(&mut session);
        assert_eq!(healed.len(), 1);
        assert_eq!(healed[0].missing, EntityId(20));
        assert_eq!(healed[0].attribute, Some("ObjectPlacement"));
        assert!(healed[0].healed);
        assert_eq!(healed[0].added, 3);

        for id in [20, 21, 22] {
            assert!(session.output().contains_source(EntityId(id)));
        }
        assert!(ReferenceIntegrityChecker::unresolved(session.output()).is_empty());
        assert!(ReferenceIntegrityChecker::check(&mut session).is_empty());
        assert_eq!(session.report().healed, 1);
    }

    #[test]
    fn test_healing_follows_new_entities() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::NewIds, SchemaVersion::Ifc4);

        // Only the owner history; its person data arrives through healing
        let history = model.resolver().get(EntityId(1)).unwrap();
        session.stage(&history);
        let healed = ReferenceIntegrityChecker::check(&mut session);

        assert_eq!(healed.len(), 1);
        assert_eq!(session.output().len(), 3);
        assert!(session.output().dangling_references().is_empty());
    }

    #[test]
    fn test_unhealable_reference_is_reported() {
        let model = ParsedModel::parse(TEST_IFC).unwrap();
        let mut session =
            ExportSession::new(model.resolver(), IdentityPolicy::PreserveIds, SchemaVersion::Ifc4);
        session
            .output_mut()
            .add(&DecodedEntity::new(
                EntityId(40),
                IfcType::IfcBeam,
                vec![
                    AttributeValue::String("c".into()),
                    AttributeValue::EntityRef(EntityId(404)),
                ],
            ))
            .unwrap();

        let healed = ReferenceIntegrityChecker::check(&mut session);
        assert_eq!(healed.len(), 1);
        assert!(!healed[0].healed);
        assert_eq!(session.report().unresolved, 1);
        assert!(!session.report().is_trustworthy());
    }
}
