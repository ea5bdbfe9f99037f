use thiserror::Error;

use crate::model::ParseIdError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
