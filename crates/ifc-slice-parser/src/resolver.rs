// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lazy, cached access to the instances of one source file

use crate::scanner::{EntityIndex, TypeIndex};
use crate::tokenizer::parse_entity_at;
use ifc_slice_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Target id to the ids referencing it
type InverseIndex = FxHashMap<EntityId, Vec<EntityId>>;

/// [`EntityResolver`] over the text of a STEP file
///
/// Holds the file text and the spans found by the scanner. An instance is
/// decoded the first time it is asked for and shared from then on.
pub struct SourceResolver {
    text: String,
    spans: EntityIndex,
    by_type: TypeIndex,
    decoded: RwLock<FxHashMap<EntityId, Arc<DecodedEntity>>>,
    inverse: OnceCell<InverseIndex>,
}

impl SourceResolver {
    pub fn new(text: String, spans: EntityIndex, by_type: TypeIndex) -> Self {
        Self {
            text,
            spans,
            by_type,
            decoded: RwLock::new(FxHashMap::default()),
            inverse: OnceCell::new(),
        }
    }

    fn decode(&self, id: EntityId) -> Option<DecodedEntity> {
        let &(start, end) = self.spans.get(&id.0)?;
        parse_entity_at(&self.text, start, end)
            .map_err(|err| log::warn!("Skipping undecodable instance {id}: {err}"))
            .ok()
    }

    fn cached(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.decoded.read().ok()?.get(&id).cloned()
    }

    /// Walks every instance once without filling the cache, so one inverse
    /// query does not keep the whole file decoded
    fn index_referrers(&self) -> InverseIndex {
        let mut inverse = InverseIndex::default();
        for &id in self.spans.keys() {
            let referrer = EntityId(id);
            let Some(entity) = self.decode(referrer) else {
                continue;
            };
            for target in entity.references() {
                inverse.entry(target).or_default().push(referrer);
            }
        }
        inverse.values_mut().for_each(|ids| {
            ids.sort_unstable();
            ids.dedup();
        });
        log::debug!("Inverse index covers {} targets", inverse.len());
        inverse
    }
}

impl EntityResolver for SourceResolver {
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        if let Some(hit) = self.cached(id) {
            return Some(hit);
        }
        let entity = Arc::new(self.decode(id)?);
        if let Ok(mut decoded) = self.decoded.write() {
            // Another reader may have won the race; keep its copy
            return Some(Arc::clone(decoded.entry(id).or_insert(entity)));
        }
        Some(entity)
    }

    fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>> {
        let Some(ids) = self.by_type.get(ifc_type) else {
            return Vec::new();
        };
        ids.iter().filter_map(|&id| self.get(id)).collect()
    }

    fn all_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.spans.keys().copied().map(EntityId).collect();
        ids.sort_unstable();
        ids
    }

    fn entity_count(&self) -> usize {
        self.spans.len()
    }

    fn inverse_of(&self, id: EntityId) -> Vec<EntityId> {
        let inverse = self.inverse.get_or_init(|| self.index_referrers());
        inverse.get(&id).cloned().unwrap_or_default()
    }
}
