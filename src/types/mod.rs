//! Shared types: host records, session tokens and error taxonomy

pub mod errors;
pub mod host;
pub mod token;

pub use errors::{
    AuthRequired, HostError, RemoteError, SourceError, SourceUnavailable, StoreError,
};
pub(crate) use host::deserialize_optional_port;
pub use host::{Host, Source, DEFAULT_PORT};
pub use token::SessionToken;
