// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-side errors

use crate::EntityId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Failure to read a source file or to access an attribute of one of its entities
#[derive(Error, Debug)]
pub enum ParseError {
    /// The text is not an ISO-10303-21 exchange file, or an instance head is unreadable
    #[error("Invalid IFC format: {0}")]
    InvalidFormat(String),

    #[error("Failed to parse entity {0}: {1}")]
    EntityParse(EntityId, String),

    /// Name lookup against the attribute table of the entity's type failed
    #[error("Entity {entity} of type {ifc_type} has no attribute named {attribute}")]
    UnknownAttribute {
        entity: EntityId,
        ifc_type: String,
        attribute: String,
    },

    /// The instance has fewer attributes than the position asked for
    #[error("Missing required attribute {attribute} on entity {entity}")]
    MissingAttribute { entity: EntityId, attribute: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn format(msg: impl Into<String>) -> Self {
        ParseError::InvalidFormat(msg.into())
    }

    pub fn entity_parse(id: EntityId, msg: impl Into<String>) -> Self {
        ParseError::EntityParse(id, msg.into())
    }
}
