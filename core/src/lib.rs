//! Client core for the SAP ABAP Development Tools (ADT) REST API.
//!
//! # Overview
//! Two halves: a declarative marshalling engine mapping Rust structs to the
//! namespaced XML documents ADT speaks, and a connection layer that sends
//! requests, negotiates content types and classifies failures. Object
//! metadata, scoped source editing and check reporters are built on top.
//!
//! # Design
//! - A marshalled type implements `Marshal` by returning a `Registry` of
//!   property descriptors, built once and kept in a `OnceLock`. Registry
//!   order is wire order.
//! - `Connection` builds plain `HttpRequest` values and interprets plain
//!   `HttpResponse` values; a `Transport` does the I/O in between, so the
//!   request and response logic is testable without a server.
//! - Source edits only happen inside `session::edit`, which guarantees the
//!   unlock call.

pub mod checks;
pub mod config;
pub mod connection;
pub mod error;
pub mod exception;
pub mod http;
pub mod marshal;
pub mod objects;
pub mod property;
pub mod registry;
pub mod session;
pub mod transport;
pub mod xml;

#[cfg(test)]
mod testing;

pub use config::ConnectionConfig;
pub use connection::{Accept, Connection, Request};
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use marshal::{Marshal, XmlRoot};
pub use objects::{AdtObject, CoreData, EditorKind, ObjectType, ADTCORE};
pub use registry::{Registry, RegistryBuilder};
pub use session::{Editor, LockHandle};
pub use transport::{HttpSession, Transport};
pub use xml::{Element, Namespace, QName};
