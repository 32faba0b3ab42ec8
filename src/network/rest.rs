//! HTTP transport.
//!
//! A request is `POST {base}/v1/paginate` with the JSON encoded
//! [`PageRequest`]. The response body is a sequence of newline-delimited
//! JSON [`Delivery`] records, one per page. The server may hand back a
//! session token in the `x-session-id` header; it is sent again with the
//! follow-up requests of the same session.

use super::transport::{Delivery, DeliveryStream, PageRequest, Transport, TransportError};
use async_trait::async_trait;
use futures::prelude::*;
use reqwest::{Client, StatusCode, Url};
use std::{io, time::Duration};
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    io::StreamReader,
};

pub const SESSION_HEADER: &str = "x-session-id";
const PAGINATE_PATH: &str = "v1/paginate";
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

pub struct RestTransport {
    base: Url,
}

/// An HTTP client with its own connection pool, plus the token of the
/// server-side session once one was handed back.
pub struct RestSession {
    client: Client,
    token: Option<String>,
}

impl RestSession {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl RestTransport {
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        RestTransport { base }
    }

    pub fn paginate_url(&self) -> Result<Url, TransportError> {
        self.base
            .join(PAGINATE_PATH)
            .map_err(|e| TransportError::Send(e.into()))
    }
}

#[async_trait]
impl Transport for RestTransport {
    type Handle = RestSession;

    fn destination(&self) -> String {
        self.base.to_string()
    }

    async fn connect(&self) -> Result<RestSession, TransportError> {
        let client = Client::builder()
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| TransportError::Connect {
                destination: self.destination(),
                source: e.into(),
            })?;
        Ok(RestSession {
            client,
            token: None,
        })
    }

    async fn send(
        &self,
        handle: &mut RestSession,
        request: &PageRequest,
    ) -> Result<DeliveryStream, TransportError> {
        let mut builder = handle.client.post(self.paginate_url()?).json(request);
        if let Some(token) = &handle.token {
            builder = builder.header(SESSION_HEADER, token.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Send(e.into()))?;
        if response.status() == StatusCode::GONE {
            handle.token = None;
            return Err(TransportError::SessionClosed);
        }
        let response = response
            .error_for_status()
            .map_err(|e| TransportError::Send(e.into()))?;

        if let Some(token) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            tracing::trace!(token, "server handed back a session token");
            handle.token = Some(token.to_owned());
        }

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());
        Ok(lines
            .map_err(|e| TransportError::Receive(e.into()))
            .try_filter(|line| future::ready(!line.trim().is_empty()))
            .and_then(|line| {
                future::ready(serde_json::from_str::<Delivery>(&line).map_err(TransportError::from))
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_url_keeps_base_path() {
        let transport = RestTransport::new("http://127.0.0.1:7770/api".parse().unwrap());
        assert_eq!(
            transport.paginate_url().unwrap().as_str(),
            "http://127.0.0.1:7770/api/v1/paginate"
        );
    }

    #[test]
    fn delivery_line_decodes() {
        let line = r#"{"page":{"pageNumber":0,"nodes":[],"errorCode":5,"errorText":"too many nodes","backward":false},"sessionOpen":true}"#;
        let delivery: Delivery = serde_json::from_str(line).unwrap();
        assert_eq!(delivery.page.error_code, 5);
        assert!(delivery.session_open);
    }
}
