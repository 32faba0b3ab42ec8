//! Access to the remote data source.
//!
//! A [`Transport`] carries page requests; a [`Session`] is one reusable
//! connection through it, owned by whoever issues requests; the
//! [`PageFetcher`] issues requests on a session and classifies what comes
//! back.

mod fetcher;
pub mod rest;
mod session;
mod transport;

pub use self::{
    fetcher::{FetchError, PageFetcher, PageStream},
    session::Session,
    transport::{
        Delivery, DeliveryStream, Page, PageRequest, Transport, TransportError, CODE_INVALID_ARGUMENT,
        CODE_OK, CODE_TOO_MANY_NODES, CODE_UNKNOWN_START,
    },
};
