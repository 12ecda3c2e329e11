use shared::error::FilterError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("filter view is not available until filters and values have both been published")]
    NotReady,
    #[error("filter session has been shut down")]
    Closed,
}
