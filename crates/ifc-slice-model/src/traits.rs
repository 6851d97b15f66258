// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model-level traits

use crate::{EntityResolver, ModelMetadata};

/// Receives `(phase, percent)` while a long operation runs
pub type ProgressCallback = Box<dyn Fn(&str, f32) + Send>;

/// A loaded source model
///
/// Exports only read through this trait. It is `Send + Sync` so that one
/// loaded file can feed several exports running on worker threads.
pub trait IfcModel: Send + Sync {
    /// Forward lookups, type queries and inverse references
    fn resolver(&self) -> &dyn EntityResolver;

    /// Header data of the source file
    fn metadata(&self) -> &ModelMetadata;
}
