// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read access to the entity graph of a source model

use crate::{AttributeValue, DecodedEntity, EntityId, IfcType};
use std::sync::Arc;

/// Lookup by id, by type and by incoming reference
///
/// Exports walk the graph in both directions: forward through attribute
/// references, and backward from an element to the relationships that point
/// at it. Backends answer `get` in constant time and compute the inverse map
/// at most once.
///
/// ```ignore
/// for storey in resolver.entities_by_type(&IfcType::IfcBuildingStorey) {
///     for rel in resolver.inverse_entities(storey.id) {
///         println!("{} <- {} {}", storey.id, rel.id, rel.ifc_type);
///     }
/// }
/// ```
pub trait EntityResolver: Send + Sync {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>>;

    /// Instances of one type, in file order
    fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>>;

    /// Every id in the model, ascending
    fn all_ids(&self) -> Vec<EntityId>;

    /// Ids of the entities whose attributes mention `id`, ascending and unique
    fn inverse_of(&self, id: EntityId) -> Vec<EntityId>;

    fn entity_count(&self) -> usize {
        self.all_ids().len()
    }

    /// Like [`entities_by_type`](Self::entities_by_type) with a keyword in any case
    fn find_by_type_name(&self, type_name: &str) -> Vec<Arc<DecodedEntity>> {
        self.entities_by_type(&IfcType::parse(type_name))
    }

    /// Follow `#id`; any other value resolves to nothing
    fn resolve_ref(&self, value: &AttributeValue) -> Option<Arc<DecodedEntity>> {
        value.as_entity_ref().and_then(|id| self.get(id))
    }

    /// Follow every `#id` of a list, skipping other items and dangling ids
    fn resolve_ref_list(&self, value: &AttributeValue) -> Vec<Arc<DecodedEntity>> {
        value
            .as_list()
            .map(|items| items.iter().filter_map(|item| self.resolve_ref(item)).collect())
            .unwrap_or_default()
    }

    fn inverse_entities(&self, id: EntityId) -> Vec<Arc<DecodedEntity>> {
        let referrers = self.inverse_of(id);
        referrers.into_iter().filter_map(|r| self.get(r)).collect()
    }
}

/// Queries composed from [`EntityResolver`]
pub trait EntityResolverExt: EntityResolver {
    /// Referrers of `id` of type `ifc_type` whose `attribute` is the one pointing at `id`
    ///
    /// Stands in for IFC inverse attributes: `IsDecomposedBy` of an element is
    /// `inverse_via(element, IfcRelAggregates, "RelatingObject")`.
    fn inverse_via(
        &self,
        id: EntityId,
        ifc_type: &IfcType,
        attribute: &str,
    ) -> Vec<Arc<DecodedEntity>> {
        let mut found = self.inverse_entities(id);
        found.retain(|referrer| {
            &referrer.ifc_type == ifc_type
                && referrer
                    .get_named(attribute)
                    .is_ok_and(|value| value.references(id))
        });
        found
    }
}

impl<T: EntityResolver + ?Sized> EntityResolverExt for T {}
