//! Reverse proxy between the tunnel and the local process.
//!
//! Each request arriving over a tunnel connection is replayed against the
//! local listen URL with its method, path, query, headers and body intact;
//! only the scheme and authority change. The upstream response is relayed
//! back chunk by chunk, so long-lived responses (server-sent events, long
//! polls) flow through without waiting for completion.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{Request, Response};
use log::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Response body relayed to the tunnel: streamed from upstream, or a short
/// fixed body for proxy-generated responses.
pub type ProxyBody = UnsyncBoxBody<Bytes, Error>;

fn fixed_body(bytes: Bytes) -> ProxyBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

/// Forwards tunneled requests to the local listen URL.
#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
    listen_url: String,
}

impl Proxy {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            listen_url: config.listen_url(),
        }
    }

    /// Replays `request` against the local listen URL and returns the
    /// upstream response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request body cannot be read, the upstream is
    /// unreachable, or the response cannot be rebuilt.
    pub async fn handle(&self, request: Request<Incoming>) -> Result<Response<ProxyBody>> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", hyper::http::uri::PathAndQuery::as_str);
        info!("{} {}", parts.method, path_and_query);

        let body = body.collect().await.map_err(Error::RequestBody)?.to_bytes();

        let upstream = match self
            .client
            .request(parts.method, format!("{}{}", self.listen_url, path_and_query))
            .headers(parts.headers)
            .body(body)
            .send()
            .await
        {
            Ok(upstream) => upstream,
            Err(err) => {
                // An unreachable local process answers 502, as any reverse
                // proxy would; the tunnel connection stays usable.
                warn!("Error forwarding request to {}: {err}", self.listen_url);
                return Ok(Response::builder()
                    .status(hyper::StatusCode::BAD_GATEWAY)
                    .body(fixed_body(Bytes::new()))?);
            }
        };

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = StreamBody::new(
            upstream
                .bytes_stream()
                .map_ok(Frame::data)
                .map_err(Error::Upstream),
        )
        .boxed_unsync();

        let mut response = Response::builder().status(status);
        if let Some(response_headers) = response.headers_mut() {
            *response_headers = headers;
        }
        Ok(response.body(body)?)
    }
}
