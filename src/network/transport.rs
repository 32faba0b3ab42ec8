use crate::node::{Direction, Node, NodeId};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// the request was served
pub const CODE_OK: u32 = 0;
/// the start node is not known to the server
pub const CODE_UNKNOWN_START: u32 = 1;
/// page size or page count rejected by the server
pub const CODE_INVALID_ARGUMENT: u32 = 2;
/// more nodes were requested than the server hands out at once
pub const CODE_TOO_MANY_NODES: u32 = 5;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot connect to {destination}")]
    Connect {
        destination: String,
        #[source]
        source: BoxError,
    },
    #[error("the session was closed by the remote end")]
    SessionClosed,
    #[error("request could not be sent")]
    Send(#[source] BoxError),
    #[error("response stream failed")]
    Receive(#[source] BoxError),
    #[error("malformed response")]
    Decode(#[from] serde_json::Error),
}

/// One paginated fetch, as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub start_id: NodeId,
    pub page_size: u32,
    pub page_count: u32,
    pub backward: bool,
}

impl PageRequest {
    pub fn new(start_id: NodeId, page_size: u32, page_count: u32, direction: Direction) -> Self {
        PageRequest {
            start_id,
            page_size,
            page_count,
            backward: direction.is_backward(),
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_backward(self.backward)
    }

    /// total number of nodes asked for
    pub fn node_count(&self) -> u64 {
        u64::from(self.page_size) * u64::from(self.page_count)
    }
}

/// One batch of nodes produced by a fetch round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub error_code: u32,
    #[serde(default)]
    pub error_text: String,
    pub backward: bool,
}

impl Page {
    pub fn error(page_number: u32, error_code: u32, error_text: impl Into<String>, backward: bool) -> Self {
        Page {
            page_number,
            nodes: Vec::new(),
            error_code,
            error_text: error_text.into(),
            backward,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == CODE_OK
    }
}

/// A page together with the state the server left the session in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub page: Page,
    /// false once the server has closed the session after this page
    #[serde(default = "default_session_open")]
    pub session_open: bool,
}

fn default_session_open() -> bool {
    true
}

pub type DeliveryStream = BoxStream<'static, Result<Delivery, TransportError>>;

/// The substrate carrying page requests to the data source.
///
/// A handle stands for one logical connection. Handles are reused for
/// follow-up requests for as long as the server keeps them open.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// human readable destination, for logs and errors
    fn destination(&self) -> String;

    /// open a new session
    async fn connect(&self) -> Result<Self::Handle, TransportError>;

    /// send one request on an open session; the response pages arrive
    /// on the returned stream in page number order
    async fn send(
        &self,
        handle: &mut Self::Handle,
        request: &PageRequest,
    ) -> Result<DeliveryStream, TransportError>;
}
