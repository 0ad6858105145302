use std::sync::Arc;

use derive_more::From;

use super::data_loader::LoadError;

#[derive(From, thiserror::Error, Debug)]
pub enum Error {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{} not found", _0)]
    #[from(ignore)]
    NotFound(&'static str),

    #[error("{}", _0)]
    #[from(ignore)]
    Forbidden(&'static str),

    #[error("Invalid id: {}", _0)]
    #[from(ignore)]
    InvalidId(String),

    #[error("Data Loader Error: {}", _0)]
    Load(LoadError<Arc<anyhow::Error>>),

    #[error("Store Error: {}", _0)]
    Anyhow(anyhow::Error),
}

pub type Result<A> = std::result::Result<A, Error>;
