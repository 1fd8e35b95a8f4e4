pub mod error;
pub mod feeds;
pub mod registry;
pub mod snapshot;
pub mod source;
