//! Error taxonomy for imprint-core.
//!
//! Two rules govern propagation:
//! - Resolution misses inside the identity map are *data*, not errors:
//!   they surface as `None` and are aggregated by the validator into a
//!   `SchemaModification` report.
//! - Pipeline failures are errors: they trigger rollback and re-raise as
//!   `PublishAborted` to the invoking CLI/service layer, which owns
//!   user-visible reporting and exit codes.

use thiserror::Error;

use crate::schema::validator::SchemaModification;
use crate::Revision;

pub type ImprintResult<T> = Result<T, ImprintError>;

#[derive(Debug, Error)]
pub enum ImprintError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema drift detected before publish. Carries the full modification
    /// report; always fatal to the attempted publish, never auto-retried.
    #[error("schema has been modified: {0}")]
    SchemaModification(SchemaModification),

    /// A failure during commit/render/finalize after rollback completed.
    /// The previously published revision is untouched.
    #[error("publish of revision {revision} aborted during {stage}: {source}")]
    PublishAborted {
        revision: Revision,
        stage: &'static str,
        #[source]
        source: Box<ImprintError>,
    },

    /// A second publish was attempted while one is in flight.
    #[error("a publish is already in progress (pending revision {0})")]
    PublishInProgress(Revision),

    /// Failure reported by an external collaborator (content store,
    /// renderer, revision log).
    #[error("{0}")]
    Collaborator(String),
}

impl ImprintError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }
}
