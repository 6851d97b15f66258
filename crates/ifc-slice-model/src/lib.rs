// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared types and read-side traits for IFC entity graphs
//!
//! The export engine is written against [`IfcModel`] and [`EntityResolver`]
//! only; `ifc-slice-parser` provides the STEP backend.
//!
//! - [`types`]: entity ids, IFC types, attribute values, decoded entities
//! - [`schema`]: attribute names for the entity types exports inspect
//! - [`EntityResolver`]: lookup by id, by type and by incoming reference
//!
//! ```ignore
//! let beam = model.resolver().get(EntityId(123)).ok_or(...)?;
//! let placement = beam.get_named("ObjectPlacement")?;
//! ```

pub mod error;
pub mod resolver;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::*;
pub use resolver::*;
pub use traits::*;
pub use types::*;
