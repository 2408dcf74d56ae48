use std::time::{Duration, Instant};

use super::Transport;
use crate::error::{TransportError, TransportErrorKind};
use crate::message::{AuthScheme, Headers, Request, Response, TransferInfo};

/// Blocking transport backed by `reqwest`. Redirects are left to the
/// redirect plugin, so the underlying client never follows them.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> { Self::with_timeout(Duration::from_secs(30)) }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(classify)?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::blocking::Client) -> Self { Self { client } }
}

fn classify(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Io
    } else {
        TransportErrorKind::Other
    };
    let mut transport_error = TransportError::new(kind, error.to_string());
    if let Some(status) = error.status() {
        transport_error = transport_error.with_code(i32::from(status.as_u16()));
    }
    transport_error
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
        let mut builder = self.client.request(method, request.url().clone());
        for (name, values) in request.headers().iter() {
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }
        if let Some(credentials) = request.credentials() {
            // Digest is answered by the digest plugin from the 401 challenge.
            if credentials.scheme == AuthScheme::Basic {
                builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
            }
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let reply = builder.send().map_err(classify)?;
        let status = reply.status();
        let mut headers = Headers::new();
        for (name, value) in reply.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let effective_url = reply.url().clone();
        let body = reply.bytes().map_err(classify)?;

        let mut response = Response::new(status.as_u16())
            .with_headers(headers)
            .with_body(body);
        if let Some(reason) = status.canonical_reason() {
            response = response.with_reason(reason);
        }
        response.set_info(TransferInfo {
            effective_url: Some(effective_url),
            connect_time:  None,
            total_time:    Some(started.elapsed()),
        });
        Ok(response)
    }

    /// Sends each request on its own scoped thread.
    fn send_batch(&self, requests: &[&Request]) -> Vec<Result<Response, TransportError>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|request| scope.spawn(move || self.send(request)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(TransportError::new(TransportErrorKind::Other, "transfer thread panicked"))
                    })
                })
                .collect()
        })
    }
}
