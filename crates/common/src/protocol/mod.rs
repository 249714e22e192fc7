// Typed protocol messages, service endpoints and the channel envelope.

pub mod envelope;
pub mod messages;
pub mod service;

pub use envelope::{parse_frame, ChannelMessage, ChannelPayload, Envelope};
pub use service::{GetSelfInfo, ServiceMethod, SetActiveClient, SyncAllNewEvents};
