//! Structured exception payloads returned by the ADT server on failure.

use std::sync::OnceLock;

use crate::marshal::{self, Marshal};
use crate::registry::Registry;
use crate::xml::{Element, Namespace, QName};

pub const EXC: Namespace = Namespace::new(
    "exc",
    "http://www.sap.com/abapxml/types/communicationframework",
);

/// An element carrying its value in an unqualified `id` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRef {
    pub id: String,
}

impl Marshal for IdRef {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<IdRef>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .attribute("id", QName::unqualified("id"), |r| &r.id, |r| &mut r.id)
                .build()
        })
    }
}

/// `<exc:exception>` with its namespace, type id and message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionPayload {
    pub namespace: IdRef,
    pub exception_type: IdRef,
    pub message: String,
    pub localized_message: String,
}

impl Marshal for ExceptionPayload {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<ExceptionPayload>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .node(
                    "namespace",
                    QName::unqualified("namespace"),
                    |e| &e.namespace,
                    |e| &mut e.namespace,
                )
                .node(
                    "exception_type",
                    QName::unqualified("type"),
                    |e| &e.exception_type,
                    |e| &mut e.exception_type,
                )
                .text("message", QName::unqualified("message"), |e| &e.message, |e| &mut e.message)
                .text(
                    "localized_message",
                    QName::unqualified("localizedMessage"),
                    |e| &e.localized_message,
                    |e| &mut e.localized_message,
                )
                .build()
        })
    }
}

/// Decode `body` as an exception payload. Returns `None` when the body is
/// not XML or its root is not `exc:exception`.
pub fn parse_exception(body: &str) -> Option<ExceptionPayload> {
    let root = Element::parse(body).ok()?;
    if !root.name.matches(&EXC.name("exception")) {
        return None;
    }

    let mut payload = ExceptionPayload::default();
    marshal::unmarshal(&root, &mut payload);
    Some(payload)
}
