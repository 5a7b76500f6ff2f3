//! Synchronous client core for the USPS Web Tools XML API.
//!
//! # Overview
//! Requests are built from whitelist-gated records, wrapped with the
//! credential in a nested tree, rendered to XML and POSTed as form fields.
//! The XML reply is decoded back into a tree and classified into success or
//! a single error code/message, reconciling transport failures, HTTP status
//! and `Error` nodes embedded in the body.
//!
//! # Design
//! - `Record` enforces a field whitelist; unknown fields produce diagnostics,
//!   not errors.
//! - `Request` is single-use: `Unsent -> Sent -> Classified`. Its assembly
//!   and classification steps are pure; `execute` runs them around a
//!   `Transport`.
//! - `XmlCodec` is the boundary to the XML grammar; `QuickXmlCodec` is the
//!   default.
//! - Only configuration errors are returned. Everything observed after the
//!   request leaves is recorded on the `Outcome`.

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod find;
pub mod http;
pub mod models;
pub mod record;
pub mod request;
pub mod tree;
pub mod zip_lookup;

pub use api::ApiCode;
pub use codec::{QuickXmlCodec, XmlCodec};
pub use config::ClientConfig;
pub use error::{CodecError, FieldDiagnostic, TransportError, TransportErrorKind, UspsError};
pub use find::{contains_key_deep, find_first};
pub use http::{HttpExchange, HttpRequest, HttpResponse, Transport, TransportOptions, UreqTransport};
pub use models::Address;
pub use record::{FieldNaming, Record, Schema};
pub use request::{ApiFault, Outcome, Request, State};
pub use tree::{Node, Tree};
pub use zip_lookup::ZipCodeLookup;
