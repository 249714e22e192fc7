// Request/response pairs of the chat API, keyed by endpoint path.

use crate::pblite::{Decode, Encode};

use super::messages::{
    GetSelfInfoRequest, GetSelfInfoResponse, ResponseHeader, SetActiveClientRequest,
    SetActiveClientResponse, SyncAllNewEventsRequest, SyncAllNewEventsResponse,
};

/// One API method: where to send it and how to read the reply.
pub trait ServiceMethod {
    const ENDPOINT: &'static str;
    type Request: Encode + Send + Sync;
    type Response: Decode + Send;

    fn response_header(response: &Self::Response) -> Option<&ResponseHeader>;
}

pub struct SyncAllNewEvents;

impl ServiceMethod for SyncAllNewEvents {
    const ENDPOINT: &'static str = "conversations/syncallnewevents";
    type Request = SyncAllNewEventsRequest;
    type Response = SyncAllNewEventsResponse;

    fn response_header(response: &Self::Response) -> Option<&ResponseHeader> {
        response.response_header.as_ref()
    }
}

pub struct SetActiveClient;

impl ServiceMethod for SetActiveClient {
    const ENDPOINT: &'static str = "clients/setactiveclient";
    type Request = SetActiveClientRequest;
    type Response = SetActiveClientResponse;

    fn response_header(response: &Self::Response) -> Option<&ResponseHeader> {
        response.response_header.as_ref()
    }
}

pub struct GetSelfInfo;

impl ServiceMethod for GetSelfInfo {
    const ENDPOINT: &'static str = "contacts/getselfinfo";
    type Request = GetSelfInfoRequest;
    type Response = GetSelfInfoResponse;

    fn response_header(response: &Self::Response) -> Option<&ResponseHeader> {
        response.response_header.as_ref()
    }
}

/// Every endpoint the client calls.
pub const ENDPOINTS: &[&str] =
    &[SyncAllNewEvents::ENDPOINT, SetActiveClient::ENDPOINT, GetSelfInfo::ENDPOINT];
