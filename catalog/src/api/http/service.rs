use crate::errors::ServerError;
use crate::library::{content_type, Library};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, warn};

const CORS_HEADERS: [(HeaderName, &str); 5] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        "GET, POST, PUT, DELETE, OPTIONS",
    ),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, Authorization, X-Requested-With, Range",
    ),
    (
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        "Content-Length, Content-Range, Accept-Ranges",
    ),
    (header::ACCESS_CONTROL_MAX_AGE, "3600"),
];

const STREAM_PREFIX: &str = "/stream/";

/// Which half of the library a listener exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `GET /videos`
    Catalog,
    /// `GET /stream/<path>`
    Stream,
}

#[derive(Clone)]
pub struct LibraryService {
    library: Arc<Library>,
    role: Role,
}

impl LibraryService {
    pub fn new(library: Arc<Library>, role: Role) -> Self {
        LibraryService { library, role }
    }

    async fn handle<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
        if req.method() == Method::OPTIONS {
            return Ok(empty_response(StatusCode::OK));
        }
        let head = req.method() == Method::HEAD;
        if !head && req.method() != Method::GET {
            let mut response = empty_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
            return Ok(response);
        }

        let path = req.uri().path();
        let response = match self.role {
            Role::Catalog if path == "/videos" => self.videos().await,
            Role::Stream if path.starts_with(STREAM_PREFIX) => {
                let range = req
                    .headers()
                    .get(header::RANGE)
                    .and_then(|value| value.to_str().ok());
                self.stream(&path[STREAM_PREFIX.len()..], range, head).await
            }
            _ => empty_response(StatusCode::NOT_FOUND),
        };

        if head {
            return Ok(without_body(response));
        }
        Ok(response)
    }

    async fn videos(&self) -> Response<BoxBody<Bytes, Infallible>> {
        let videos = match self.library.videos().await {
            Ok(videos) => videos,
            Err(e) => {
                error!("catalog: {}", e);
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        match serde_json::to_vec(&videos) {
            Ok(body) => {
                let length = body.len() as u64;
                body_response(StatusCode::OK, Bytes::from(body), length, "application/json")
            }
            Err(e) => {
                error!("catalog: encode: {}", e);
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn stream(
        &self,
        relative: &str,
        range: Option<&str>,
        head: bool,
    ) -> Response<BoxBody<Bytes, Infallible>> {
        debug!("stream: request for {} (range: {:?})", relative, range);
        let total = match self.library.size(relative).await {
            Ok(Some(total)) => total,
            Ok(None) => return empty_response(StatusCode::NOT_FOUND),
            Err(e) => return storage_failure(e),
        };

        let (status, start, end) = match range.map(|r| byte_range(r, total)) {
            None | Some(ByteRange::Whole) => (StatusCode::OK, 0, total),
            Some(ByteRange::Span(start, end)) => (StatusCode::PARTIAL_CONTENT, start, end + 1),
            Some(ByteRange::Unsatisfiable) => {
                let mut response = empty_response(StatusCode::RANGE_NOT_SATISFIABLE);
                insert(&mut response, header::CONTENT_RANGE, format!("bytes */{}", total));
                return response;
            }
        };

        let length = end - start;
        let data = if head {
            Bytes::new()
        } else {
            match self.library.read_at(relative, start, length).await {
                Ok(data) => data,
                Err(e) => return storage_failure(e),
            }
        };

        let mut response = body_response(status, data, length, content_type(relative));
        response
            .headers_mut()
            .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if status == StatusCode::PARTIAL_CONTENT {
            insert(
                &mut response,
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end - 1, total),
            );
        }
        response
    }
}

/// Outcome of matching a `Range` header against a file of known size.
#[derive(Debug, PartialEq, Eq)]
enum ByteRange {
    /// No usable range: serve the whole file.
    Whole,
    /// Inclusive first and last byte.
    Span(u64, u64),
    Unsatisfiable,
}

/// Supports a single `bytes=` range in its `a-b`, `a-` and `-n` forms.
/// Other units and multi-range requests fall back to the whole file.
fn byte_range(value: &str, total: u64) -> ByteRange {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Whole;
    };
    if spec.contains(',') {
        return ByteRange::Whole;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return ByteRange::Unsatisfiable;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return match last.parse::<u64>() {
            Ok(suffix) if suffix > 0 && total > 0 => {
                ByteRange::Span(total.saturating_sub(suffix), total - 1)
            }
            _ => ByteRange::Unsatisfiable,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return ByteRange::Unsatisfiable;
    };
    if start >= total {
        return ByteRange::Unsatisfiable;
    }
    if last.is_empty() {
        return ByteRange::Span(start, total - 1);
    }
    match last.parse::<u64>() {
        Ok(end) if end >= start => ByteRange::Span(start, end.min(total - 1)),
        _ => ByteRange::Unsatisfiable,
    }
}

impl Service<Request<Incoming>> for LibraryService {
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.handle(req).await })
    }
}

fn body_response(
    status: StatusCode,
    body: Bytes,
    length: u64,
    content_type: &'static str,
) -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(Full::new(body).boxed());
    *response.status_mut() = status;
    with_cors(&mut response);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

fn empty_response(status: StatusCode) -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(BoxBody::default());
    *response.status_mut() = status;
    with_cors(&mut response);
    response
}

fn without_body(
    response: Response<BoxBody<Bytes, Infallible>>,
) -> Response<BoxBody<Bytes, Infallible>> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, BoxBody::default())
}

fn storage_failure(e: ServerError) -> Response<BoxBody<Bytes, Infallible>> {
    match e {
        ServerError::RequestError(msg) => {
            warn!("stream: {}", msg);
            empty_response(StatusCode::BAD_REQUEST)
        }
        e => {
            error!("stream: {}", e);
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn insert<B>(response: &mut Response<B>, name: HeaderName, value: String) {
    match HeaderValue::try_from(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(e) => error!("header {}: {}", name, e),
    }
}

fn with_cors<B>(response: &mut Response<B>) {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}
