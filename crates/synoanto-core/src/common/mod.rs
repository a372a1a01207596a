pub mod error;
pub mod types;

pub use error::{Error, FetchError, FetchErrorKind, Result, StoreError};
pub use types::*;
