//! Client for the localtunnel protocol.
//!
//! A lease is requested over HTTPS; the server answers with a public URL and
//! a dedicated TCP port. The client then keeps a small pool of outbound TCP
//! connections open to that port, and the server forwards each public HTTP
//! request down one of them. Every pooled connection speaks plain HTTP/1.1,
//! served locally and answered by the reverse proxy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::proxy::Proxy;

/// Give up after this many connect failures in a row.
const MAX_CONNECT_FAILURES: u32 = 5;
/// Pause between reconnect attempts after a failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Lease granted by the tunnel server.
#[derive(Debug, Clone, Deserialize)]
pub struct Lease {
    pub id: String,
    /// Public URL requests arrive on.
    pub url: String,
    /// TCP port on the tunnel server the client dials back to.
    pub port: u16,
    /// Number of concurrent connections the server accepts.
    pub max_conn_count: u32,
}

/// An established tunnel: a lease plus the connection pool serving it.
pub struct Tunnel {
    lease: Lease,
    remote_host: String,
    token: CancellationToken,
}

/// Handle that shuts the tunnel's connection pool down.
#[derive(Clone)]
pub struct TunnelCloser {
    token: CancellationToken,
}

impl TunnelCloser {
    pub fn close(&self) {
        self.token.cancel();
    }
}

impl Tunnel {
    /// Requests a lease from the tunnel server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed, the request fails,
    /// or the server answers with an unusable lease.
    pub async fn open(client: &reqwest::Client, base_url: &str) -> Result<Self> {
        let parsed =
            Url::parse(base_url).map_err(|err| Error::base_url_error(base_url.to_string(), err))?;
        let Some(remote_host) = parsed.host_str().map(ToString::to_string) else {
            return Err(Error::TunnelLease(format!(
                "base URL `{base_url}` has no host"
            )));
        };

        let lease: Lease = client
            .get(parsed)
            .query(&[("new", "")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| Error::tunnel_request_error(base_url.to_string(), err))?
            .json()
            .await
            .map_err(|err| Error::tunnel_request_error(base_url.to_string(), err))?;

        if lease.max_conn_count == 0 {
            return Err(Error::TunnelLease(format!(
                "lease `{}` allows zero connections",
                lease.id
            )));
        }
        info!("Tunnel `{}` open at {}", lease.id, lease.url);

        Ok(Self {
            lease,
            remote_host,
            token: CancellationToken::new(),
        })
    }

    /// Public URL requests arrive on.
    pub fn url(&self) -> &str {
        &self.lease.url
    }

    pub fn closer(&self) -> TunnelCloser {
        TunnelCloser {
            token: self.token.clone(),
        }
    }

    /// Serves the tunnel until it is closed, answering each forwarded request
    /// through `proxy`.
    ///
    /// Runs one worker per allowed connection. Returns `Ok(())` once the
    /// tunnel is closed via its [`TunnelCloser`].
    ///
    /// # Errors
    ///
    /// Returns an error when a worker gives up after repeated connect
    /// failures, which usually means the lease has expired.
    pub async fn serve(self, proxy: Proxy) -> Result<()> {
        let endpoint = format!("{}:{}", self.remote_host, self.lease.port);
        let failures = Arc::new(AtomicU32::new(0));

        let mut workers = JoinSet::new();
        for _ in 0..self.lease.max_conn_count {
            workers.spawn(worker(
                endpoint.clone(),
                proxy.clone(),
                self.token.clone(),
                Arc::clone(&failures),
            ));
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    // One worker giving up dooms the rest.
                    self.token.cancel();
                    first_error.get_or_insert(err);
                }
                Err(err) => {
                    self.token.cancel();
                    first_error.get_or_insert(Error::TunnelWorker(err.to_string()));
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// One pooled connection: dial, serve HTTP/1.1 on the stream, redial when the
/// server hangs up.
async fn worker(
    endpoint: String,
    proxy: Proxy,
    token: CancellationToken,
    failures: Arc<AtomicU32>,
) -> Result<()> {
    loop {
        let stream = tokio::select! {
            () = token.cancelled() => return Ok(()),
            connected = TcpStream::connect(&endpoint) => match connected {
                Ok(stream) => {
                    failures.store(0, Ordering::Relaxed);
                    stream
                }
                Err(err) => {
                    let attempts = failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if attempts >= MAX_CONNECT_FAILURES {
                        return Err(Error::TunnelConnect {
                            host: endpoint,
                            attempts,
                            original: err,
                        });
                    }
                    warn!("Error connecting to tunnel endpoint {endpoint}: {err}");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            },
        };
        debug!("Tunnel connection established to {endpoint}");

        let service = service_fn({
            let proxy = proxy.clone();
            move |request| {
                let proxy = proxy.clone();
                async move { proxy.handle(request).await }
            }
        });
        let connection = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(TokioIo::new(stream), service);

        tokio::select! {
            () = token.cancelled() => return Ok(()),
            served = connection => {
                if let Err(err) = served {
                    debug!("Tunnel connection to {endpoint} ended: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease_json() -> &'static str {
        r#"{"id":"witty-mole-12","url":"https://witty-mole-12.localtunnel.me","port":41034,"max_conn_count":10}"#
    }

    #[test]
    fn test_lease_deserializes_from_server_response() {
        let lease: Lease = serde_json::from_str(lease_json()).unwrap();
        assert_eq!(lease.id, "witty-mole-12");
        assert_eq!(lease.url, "https://witty-mole-12.localtunnel.me");
        assert_eq!(lease.port, 41034);
        assert_eq!(lease.max_conn_count, 10);
    }

    #[test]
    fn test_lease_rejects_missing_fields() {
        let result: std::result::Result<Lease, _> =
            serde_json::from_str(r#"{"id":"x","url":"https://x"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_base_url() {
        let client = reqwest::Client::new();
        let result = Tunnel::open(&client, "not a url").await;
        assert!(matches!(result, Err(Error::BaseUrl { .. })));
    }

    #[tokio::test]
    async fn test_open_rejects_hostless_base_url() {
        let client = reqwest::Client::new();
        let result = Tunnel::open(&client, "unix:/tmp/socket").await;
        assert!(matches!(result, Err(Error::TunnelLease(_))));
    }
}
