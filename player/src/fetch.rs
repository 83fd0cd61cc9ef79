use crate::error::PlayerError;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{header, Method, Request, Uri};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, error};

/// Retrieves a document over the network.
#[async_trait]
pub trait Fetcher {
    async fn get(&self, url: &str) -> Result<Bytes, PlayerError>;
}

/// Plain HTTP/1.1 GET, one connection per request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn fetch(&self, uri: Uri) -> Result<Bytes, PlayerError> {
        let mut sender = self.connect(&uri).await?;

        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default();
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let req = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, authority)
            .header(header::USER_AGENT, "abr-player/1.0")
            .body(Empty::<Bytes>::new())
            .map_err(|e| PlayerError::NetworkError(format!("build request: {}", e)))?;

        let res = sender
            .send_request(req)
            .await
            .map_err(|e| PlayerError::NetworkError(format!("send request: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            return Err(PlayerError::NetworkError(format!("{} returned {}", uri, status)));
        }

        let body = res
            .into_body()
            .collect()
            .await
            .map_err(|e| PlayerError::NetworkError(format!("read body: {}", e)))?
            .to_bytes();
        debug!("fetched {} bytes from {}", body.len(), uri);

        Ok(body)
    }

    async fn connect(&self, uri: &Uri) -> Result<http1::SendRequest<Empty<Bytes>>, PlayerError> {
        if uri.scheme_str() != Some("http") {
            return Err(PlayerError::NetworkError(format!(
                "unsupported url {}: only http is supported",
                uri
            )));
        }

        let host = uri
            .host()
            .ok_or_else(|| PlayerError::NetworkError(format!("no host in {}", uri)))?;
        let port = uri.port_u16().unwrap_or(80);
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| PlayerError::NetworkError(format!("connect to {}: {}", addr, e)))?;

        let (sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| PlayerError::NetworkError(format!("http1 handshake: {}", e)))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                error!("connection: {:?}", err);
            }
        });

        Ok(sender)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, PlayerError> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| PlayerError::NetworkError(format!("invalid url {}: {}", url, e)))?;

        match tokio::time::timeout(self.timeout, self.fetch(uri)).await {
            Ok(result) => result,
            Err(_) => Err(PlayerError::NetworkError(format!(
                "{} timed out after {}s",
                url,
                self.timeout.as_secs_f64()
            ))),
        }
    }
}
