// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Output identity policies

use crate::{ExportError, Result};
use ifc_slice_model::{DecodedEntity, EntityId};
use ifc_slice_parser::OutputModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether output entities keep their source identifiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityPolicy {
    #[default]
    PreserveIds,
    NewIds,
}

impl IdentityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityPolicy::PreserveIds => "preserve-ids",
            IdentityPolicy::NewIds => "new-ids",
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "preserve-ids" => Ok(IdentityPolicy::PreserveIds),
            "new-ids" => Ok(IdentityPolicy::NewIds),
            other => Err(format!(
                "unknown identity policy '{other}' (expected preserve-ids or new-ids)"
            )),
        }
    }
}

/// Materializes source entities into an output model
pub trait IdentityStrategy: Send {
    /// Policy this strategy implements
    fn policy(&self) -> IdentityPolicy;

    /// Add one entity, returning its output identifier
    fn add(&mut self, out: &mut OutputModel, entity: &DecodedEntity) -> Result<EntityId>;

    /// Add several entities independently; one failure does not stop the rest
    fn add_many(
        &mut self,
        out: &mut OutputModel,
        entities: &[&DecodedEntity],
    ) -> Vec<Result<EntityId>> {
        entities.iter().map(|entity| self.add(out, entity)).collect()
    }
}

/// Reuses the source identifier for every output entity
#[derive(Debug, Default)]
pub struct PreserveIdentity;

impl IdentityStrategy for PreserveIdentity {
    fn policy(&self) -> IdentityPolicy {
        IdentityPolicy::PreserveIds
    }

    fn add(&mut self, out: &mut OutputModel, entity: &DecodedEntity) -> Result<EntityId> {
        out.add(entity)
            .map_err(|source| ExportError::DuplicateOrInvalidEntity {
                entity: entity.id,
                source,
            })
    }
}

/// Copies attribute values into a newly allocated output entity
///
/// References are copied as they are; the output model translates them when
/// the file is written, whichever order the targets arrive in.
#[derive(Debug, Default)]
pub struct FreshIdentity;

impl IdentityStrategy for FreshIdentity {
    fn policy(&self) -> IdentityPolicy {
        IdentityPolicy::NewIds
    }

    fn add(&mut self, out: &mut OutputModel, entity: &DecodedEntity) -> Result<EntityId> {
        out.create_entity(entity.id, entity.ifc_type.clone(), entity.attributes.clone())
            .map_err(|source| ExportError::DuplicateOrInvalidEntity {
                entity: entity.id,
                source,
            })
    }
}

/// Strategy implementing `policy`
pub fn strategy_for(policy: IdentityPolicy) -> Box<dyn IdentityStrategy> {
    match policy {
        IdentityPolicy::PreserveIds => Box::new(PreserveIdentity),
        IdentityPolicy::NewIds => Box::new(FreshIdentity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_slice_model::{AttributeValue, IfcType, SchemaVersion};

    fn beam(id: u64) -> DecodedEntity {
        DecodedEntity::new(
            EntityId(id),
            IfcType::IfcBeam,
            vec![AttributeValue::String("guid".into()), AttributeValue::EntityRef(EntityId(1))],
        )
    }

    #[test]
    fn test_preserve_identity_reuses_ids() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        let mut strategy = PreserveIdentity;
        assert_eq!(strategy.add(&mut out, &beam(11)).unwrap(), EntityId(11));
        assert!(matches!(
            strategy.add(&mut out, &beam(11)),
            Err(ExportError::DuplicateOrInvalidEntity { entity: EntityId(11), .. })
        ));
    }

    #[test]
    fn test_fresh_identity_allocates_and_copies() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        let mut strategy = FreshIdentity;
        let id = strategy.add(&mut out, &beam(11)).unwrap();
        assert_eq!(id, EntityId(1));

        let staged = out.get(id).unwrap();
        assert_eq!(staged.attributes, beam(11).attributes);
        assert_eq!(out.output_id(EntityId(11)), Some(id));
    }

    #[test]
    fn test_add_many_is_per_entity() {
        let mut out = OutputModel::new(SchemaVersion::Ifc4);
        let mut strategy = strategy_for(IdentityPolicy::PreserveIds);
        let (a, b) = (beam(11), beam(12));
        let results = strategy.add_many(&mut out, &[&a, &a, &b]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("new-ids".parse::<IdentityPolicy>(), Ok(IdentityPolicy::NewIds));
        assert!("keep".parse::<IdentityPolicy>().is_err());
        assert_eq!(strategy_for(IdentityPolicy::NewIds).policy(), IdentityPolicy::NewIds);
        assert_eq!(IdentityPolicy::PreserveIds.to_string(), "preserve-ids");
    }
}
