// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Append-only output model
//!
//! Entities are staged with their attributes still pointing into the source
//! model's identifier space. Each staged entity records the source entity it
//! came from, and references are translated to output identifiers only when
//! the model is written. This keeps entities created under fresh identifiers
//! free of half-translated handles: a reference either names a source entity
//! that is (or will be) staged, or it is dangling.

use crate::writer::{StepWriter, WriteSummary};
use ifc_slice_model::{AttributeValue, DecodedEntity, EntityId, IfcType, SchemaVersion};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors raised by the output model
#[derive(Error, Debug)]
pub enum OutputError {
    /// The identifier (or its source entity) is already present
    #[error("Entity {0} is already present in the output model")]
    Duplicate(EntityId),

    /// The entity cannot be stored
    #[error("Entity {id} rejected: {reason}")]
    Invalid { id: EntityId, reason: String },

    /// IO error while writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reference whose target was never staged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DanglingReference {
    /// Output identifier of the entity holding the reference
    pub referrer: EntityId,
    /// Source identifier of the missing target
    pub missing: EntityId,
}

/// Output model under construction
#[derive(Debug, Default)]
pub struct OutputModel {
    schema: SchemaVersion,
    /// Output ID -> entity (whose `id` and references are source IDs)
    entities: BTreeMap<EntityId, DecodedEntity>,
    /// Source ID -> output ID
    by_source: FxHashMap<EntityId, EntityId>,
    /// Next identifier handed out by `create_entity`
    next_id: u64,
}

impl OutputModel {
    /// Create an empty output model declared with `schema`
    pub fn new(schema: SchemaVersion) -> Self {
        Self {
            schema,
            entities: BTreeMap::new(),
            by_source: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Schema written to FILE_SCHEMA
    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// Change the declared schema (no attribute migration happens)
    pub fn set_schema(&mut self, schema: SchemaVersion) {
        self.schema = schema;
    }

    /// Add a source entity keeping its identifier
    pub fn add(&mut self, entity: &DecodedEntity) -> Result<EntityId, OutputError> {
        Self::validate(entity.id, &entity.ifc_type)?;
        if self.by_source.contains_key(&entity.id) || self.entities.contains_key(&entity.id) {
            return Err(OutputError::Duplicate(entity.id));
        }

        self.entities.insert(entity.id, entity.clone());
        self.by_source.insert(entity.id, entity.id);
        self.next_id = self.next_id.max(entity.id.0.saturating_add(1));
        Ok(entity.id)
    }

    /// Swap the staged copy of `entity.id` (a source id) for `entity`
    ///
    /// The output identifier is kept. The type must not change.
    pub fn replace(&mut self, entity: &DecodedEntity) -> Result<EntityId, OutputError> {
        let Some(id) = self.output_id(entity.id) else {
            return Err(OutputError::Invalid {
                id: entity.id,
                reason: "entity is not staged".to_string(),
            });
        };
        let Some(staged) = self.entities.get_mut(&id) else {
            return Err(OutputError::Invalid {
                id: entity.id,
                reason: "entity is not staged".to_string(),
            });
        };
        if staged.ifc_type != entity.ifc_type {
            return Err(OutputError::Invalid {
                id: entity.id,
                reason: format!("cannot change type {} to {}", staged.ifc_type, entity.ifc_type),
            });
        }
        staged.attributes = entity.attributes.clone();
        Ok(id)
    }

    /// Create a new entity with a freshly allocated identifier
    ///
    /// `origin` is the source entity the attributes were copied from; it is
    /// what references elsewhere in the model use to reach the new entity.
    pub fn create_entity(
        &mut self,
        origin: EntityId,
        ifc_type: IfcType,
        attributes: Vec<AttributeValue>,
    ) -> Result<EntityId, OutputError> {
        Self::validate(origin, &ifc_type)?;
        if self.by_source.contains_key(&origin) {
            return Err(OutputError::Duplicate(origin));
        }

        let id = EntityId(self.next_id);
        if self.entities.contains_key(&id) {
            return Err(OutputError::Invalid {
                id: origin,
                reason: "no identifiers left to allocate".to_string(),
            });
        }
        self.next_id = self.next_id.saturating_add(1);
        self.entities
            .insert(id, DecodedEntity::new(origin, ifc_type, attributes));
        self.by_source.insert(origin, id);
        Ok(id)
    }

    fn validate(id: EntityId, ifc_type: &IfcType) -> Result<(), OutputError> {
        if !id.is_valid() {
            return Err(OutputError::Invalid {
                id,
                reason: "identifier must be positive".to_string(),
            });
        }
        if ifc_type.name().is_empty() {
            return Err(OutputError::Invalid {
                id,
                reason: "entity has no type".to_string(),
            });
        }
        Ok(())
    }

    /// Remove an entity by output identifier
    ///
    /// References to it held by the remaining entities are scrubbed: a
    /// single reference becomes `$`, a list element is dropped.
    pub fn remove(&mut self, id: EntityId) -> Option<DecodedEntity> {
        let removed = self.entities.remove(&id)?;
        self.by_source.remove(&removed.id);

        for entity in self.entities.values_mut() {
            for value in &mut entity.attributes {
                scrub(value, removed.id);
            }
        }
        Some(removed)
    }

    /// Whether the source entity `source` has been staged
    pub fn contains_source(&self, source: EntityId) -> bool {
        self.by_source.contains_key(&source)
    }

    /// Output identifier assigned to a source entity
    pub fn output_id(&self, source: EntityId) -> Option<EntityId> {
        self.by_source.get(&source).copied()
    }

    /// Staged entity by output identifier (attributes in source space)
    pub fn get(&self, id: EntityId) -> Option<&DecodedEntity> {
        self.entities.get(&id)
    }

    /// Staged entity by source identifier
    pub fn get_by_source(&self, source: EntityId) -> Option<&DecodedEntity> {
        self.output_id(source).and_then(|id| self.entities.get(&id))
    }

    /// Output identifiers of every entity of `ifc_type`, ascending
    pub fn by_type(&self, ifc_type: &IfcType) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| &e.ifc_type == ifc_type)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Iterate over (output ID, staged entity) in output order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &DecodedEntity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Output identifiers, ascending
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity translated into output identifier space
    ///
    /// Unstaged targets become `$` (or are dropped from lists) and are
    /// returned as dangling references.
    pub fn resolved(&self, id: EntityId) -> Option<(DecodedEntity, Vec<DanglingReference>)> {
        let entity = self.entities.get(&id)?;
        let mut dangling = Vec::new();
        let attributes = entity
            .attributes
            .iter()
            .filter_map(|value| self.translate(id, value, &mut dangling))
            .collect();
        Some((
            DecodedEntity::new(id, entity.ifc_type.clone(), attributes),
            dangling,
        ))
    }

    fn translate(
        &self,
        referrer: EntityId,
        value: &AttributeValue,
        dangling: &mut Vec<DanglingReference>,
    ) -> Option<AttributeValue> {
        Some(match value {
            AttributeValue::EntityRef(source) => match self.output_id(*source) {
                Some(target) => AttributeValue::EntityRef(target),
                None => {
                    dangling.push(DanglingReference {
                        referrer,
                        missing: *source,
                    });
                    AttributeValue::Null
                }
            },
            AttributeValue::List(items) => AttributeValue::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        // A dangling list element is dropped, not nulled
                        AttributeValue::EntityRef(source) if !self.contains_source(*source) => {
                            dangling.push(DanglingReference {
                                referrer,
                                missing: *source,
                            });
                            None
                        }
                        _ => self.translate(referrer, item, dangling),
                    })
                    .collect(),
            ),
            other => other.clone(),
        })
    }

    /// Every reference that would be written as dangling
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for (id, entity) in &self.entities {
            for target in entity.references() {
                if !self.contains_source(target) {
                    dangling.push(DanglingReference {
                        referrer: *id,
                        missing: target,
                    });
                }
            }
        }
        dangling
    }

    /// Serialize with `writer` into any sink
    pub fn write_to<W: Write>(
        &self,
        writer: &StepWriter,
        sink: &mut W,
    ) -> Result<WriteSummary, OutputError> {
        Ok(writer.write(self, sink)?)
    }

    /// Write the model to `path` with a default header
    pub fn write(&self, path: &Path) -> Result<WriteSummary, OutputError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let writer = StepWriter::new(self.schema).with_file_name(file_name);

        let mut sink = BufWriter::new(File::create(path)?);
        let summary = self.write_to(&writer, &mut sink)?;
        sink.flush()?;
        Ok(summary)
    }
}

/// Drop references to `target` from a value
fn scrub(value: &mut AttributeValue, target: EntityId) {
    match value {
        AttributeValue::EntityRef(id) if *id == target => *value = AttributeValue::Null,
        AttributeValue::List(items) => {
            items.retain(|item| item.as_entity_ref() != Some(target));
            for item in items.iter_mut() {
                scrub(item, target);
            }
        }
        _ => {}
    }
}
