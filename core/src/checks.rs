//! Object check reporters.

use std::sync::OnceLock;

use crate::connection::{Connection, Request};
use crate::error::Result;
use crate::http::HttpMethod;
use crate::marshal::{self, Marshal, XmlRoot};
use crate::objects::{EditorKind, ObjectType};
use crate::registry::Registry;
use crate::xml::Namespace;

pub const CHKRUN: Namespace = Namespace::new("chkrun", "http://www.sap.com/adt/checkrun");

pub static REPORTERS: ObjectType = ObjectType {
    code: None,
    basepath: "checkruns/reporters",
    namespaces: &[CHKRUN],
    mimetype: "application/vnd.sap.adt.reporters+xml",
    alternate_mimetypes: &[],
    xml_element: "checkReporters",
    editor: EditorKind::None,
};

/// A check run reporter and the object types it can check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reporter {
    pub name: String,
    pub supported_types: Vec<String>,
}

impl Marshal for Reporter {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<Reporter>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .attribute("name", CHKRUN.name("name"), |r| &r.name, |r| &mut r.name)
                .text_list(
                    "supported_types",
                    CHKRUN.name("supportedType"),
                    |r| &r.supported_types,
                    |r| &mut r.supported_types,
                )
                .build()
        })
    }
}

impl Reporter {
    /// Whether this reporter checks objects of `type_code` (e.g. `PROG*`).
    pub fn supports(&self, type_code: &str) -> bool {
        self.supported_types.iter().any(|supported| {
            match supported.strip_suffix('*') {
                Some(prefix) => type_code.starts_with(prefix),
                None => supported == type_code,
            }
        })
    }
}

/// `<chkrun:checkReporters>` wrapping one `<chkrun:reporter>` per reporter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportersContainer {
    pub items: Vec<Reporter>,
}

impl Marshal for ReportersContainer {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<ReportersContainer>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .node_list("items", CHKRUN.name("reporter"), |c| &c.items, |c| &mut c.items)
                .build()
        })
    }
}

impl XmlRoot for ReportersContainer {
    fn object_type(&self) -> &'static ObjectType {
        &REPORTERS
    }
}

/// The reporters available on the server.
pub fn fetch_reporters(connection: &mut Connection) -> Result<Vec<Reporter>> {
    let response = connection.execute(
        HttpMethod::Get,
        REPORTERS.basepath,
        &Request::new().accept(REPORTERS.mimetype),
    )?;

    let mut reporters = ReportersContainer::default();
    marshal::deserialize(&response.body, &mut reporters)?;
    Ok(reporters.items)
}
