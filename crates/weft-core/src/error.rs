// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type for translation and synchronization.

use thiserror::Error;
use weft_port::{EntityRef, RenderError};

/// Failure of a translation, build or sync operation.
///
/// Translation misses are not errors: they are recorded in the
/// [`MissingTranslationSet`](crate::MissingTranslationSet) and surface as
/// `Ok(None)`. An interrupted pass is not one either; it ends with
/// [`BuildStatus::Aborted`](crate::BuildStatus).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The renderer rejected a mutation.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A shading-network walk revisited an entity still being translated.
    #[error("connection cycle through {entity}")]
    Cycle {
        /// Entity at which the cycle closed.
        entity: EntityRef,
    },
    /// The options node could not be built.
    #[error("options translation failed: {0}")]
    OptionsFailed(String),
}
