// Request/response and channel-send seam between the coordinator and the network.
//
// The coordinator never touches sockets; it encodes a request, hands it to a
// `Transport`, and decodes whatever text comes back.

use std::collections::BTreeMap;
use std::future::Future;

use anyhow::{anyhow, Context, Result};
use hangwire_common::pblite::{Encode, PbliteDecoder};
use hangwire_common::protocol::ServiceMethod;
use hangwire_common::wire::WireValue;
use tracing::debug;

/// One `sendMaps` entry: `{"p": "<json>"}`.
pub type ChannelMap = BTreeMap<String, String>;

/// Abstraction over the HTTP API and the channel's outbound side.
///
/// Implementations own retry and backoff; a returned error is final for that
/// call.
pub trait Transport: Send + Sync {
    /// POST a positional request body to `endpoint` and return the raw response text.
    fn request(&self, endpoint: &str, body: WireValue) -> impl Future<Output = Result<String>> + Send;

    /// Send maps over the open channel session.
    fn send_maps(&self, maps: Vec<ChannelMap>) -> impl Future<Output = Result<()>> + Send;
}

/// Encode, send, decode and check the response status of one API call.
pub async fn execute<M, T>(transport: &T, request: &M::Request) -> Result<M::Response>
where
    M: ServiceMethod,
    T: Transport,
{
    let body = request.encode();
    let text = transport
        .request(M::ENDPOINT, body)
        .await
        .with_context(|| format!("request to `{}` failed", M::ENDPOINT))?;
    let response: M::Response = PbliteDecoder::new()
        .decode_response(&text)
        .with_context(|| format!("failed to decode `{}` response", M::ENDPOINT))?;

    match M::response_header(&response) {
        Some(header) if header.is_ok() => Ok(response),
        Some(header) => Err(anyhow!(
            "`{}` returned status {:?}: {}",
            M::ENDPOINT,
            header.status,
            header.error_description.as_deref().unwrap_or("no description")
        )),
        None => Err(anyhow!("`{}` response has no header", M::ENDPOINT)),
    }
}

/// Maps that subscribe the channel to `services`.
///
/// Each service becomes `{"p": "{\"3\":{\"1\":{\"1\":\"<service>\"}}}"}`.
pub fn service_registration_maps(services: &[String]) -> Vec<ChannelMap> {
    services
        .iter()
        .map(|service| {
            let payload = serde_json::json!({ "3": { "1": { "1": service } } });
            ChannelMap::from([("p".to_string(), payload.to_string())])
        })
        .collect()
}

/// Transport with no network behind it, for replaying captured frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    async fn request(&self, endpoint: &str, _body: WireValue) -> Result<String> {
        Err(anyhow!("offline: `{endpoint}` is not reachable"))
    }

    async fn send_maps(&self, maps: Vec<ChannelMap>) -> Result<()> {
        debug!(count = maps.len(), "offline transport dropped channel maps");
        Ok(())
    }
}
