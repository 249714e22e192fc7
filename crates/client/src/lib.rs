// hangwire-client: sync coordinator, channel runtime and their collaborators.

pub mod client;
pub mod config;
pub mod events;
pub mod model;
pub mod runtime;
pub mod sync;
pub mod transport;
