//! Planguard Core - plan data model, plugin schemas, request protocol, errors

pub mod error;
pub mod protocol;
pub mod schema;
pub mod types;

pub use error::{PlanError, RequestError};
pub use protocol::*;
pub use schema::*;
pub use types::*;
