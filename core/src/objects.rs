//! Object type metadata and generic ADT resource handles.
//!
//! # Design
//! Every resource kind is described by one `ObjectType` living in a
//! `static`: base path, XML namespaces, MIME types and editor capability.
//! It is read-only and shared freely. `AdtObject` pairs an object type with
//! a name and the `CoreData` common to all workbench objects; it knows how
//! to address itself (`uri`, `source_uri`) and how to create, read and edit
//! itself over a `Connection`.

use std::sync::OnceLock;

use tracing::info;

use crate::connection::{Connection, Request};
use crate::error::{ApiError, Result};
use crate::http::HttpMethod;
use crate::marshal::{self, Marshal, XmlRoot};
use crate::registry::Registry;
use crate::session::{self, Editor};
use crate::xml::{Namespace, QName};

/// The namespace shared by the core attributes of every workbench object.
pub const ADTCORE: Namespace = Namespace::new("adtcore", "http://www.sap.com/adt/core");

/// Whether objects of a type carry editable source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    None,
    /// Plain-text source at `<uri>/source/main`.
    Source,
}

/// Static description of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectType {
    /// ADT type code such as `PROG/P`; `None` for non-workbench resources.
    pub code: Option<&'static str>,
    /// Path below the ADT mount, e.g. `programs/programs`.
    pub basepath: &'static str,
    /// Namespaces declared on the root element; the first one qualifies the
    /// root element itself.
    pub namespaces: &'static [Namespace],
    pub mimetype: &'static str,
    /// Alternate MIME types keyed by the representation a caller asks for.
    /// Empty when the type has a single representation.
    pub alternate_mimetypes: &'static [(&'static str, &'static str)],
    /// Local name of the root element.
    pub xml_element: &'static str,
    pub editor: EditorKind,
}

impl ObjectType {
    pub fn root_name(&self) -> QName {
        match self.namespaces.first() {
            Some(ns) => ns.name(self.xml_element),
            None => QName::unqualified(self.xml_element),
        }
    }

    pub fn alternate_mimetype(&self, key: &str) -> Option<&'static str> {
        self.alternate_mimetypes
            .iter()
            .find(|(alternate, _)| *alternate == key)
            .map(|(_, mimetype)| *mimetype)
    }

    /// The alternate MIME type registered under `key`, or the default one.
    pub fn mimetype_for(&self, key: &str) -> &'static str {
        self.alternate_mimetype(key).unwrap_or(self.mimetype)
    }

    /// Path of the object named `name`: `<basepath>/<encoded lowercase name>`.
    pub fn object_uri(&self, name: &str) -> String {
        let segment: String =
            url::form_urlencoded::byte_serialize(name.to_lowercase().as_bytes()).collect();
        format!("{}/{}", self.basepath, segment)
    }

    fn label(&self) -> &'static str {
        self.code.unwrap_or(self.basepath)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
}

impl Marshal for PackageRef {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<PackageRef>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .attribute("name", ADTCORE.name("name"), |p| &p.name, |p| &mut p.name)
                .build()
        })
    }
}

/// Attributes every workbench object carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreData {
    pub description: String,
    pub language: String,
    pub master_language: String,
    pub master_system: String,
    pub responsible: String,
    pub package_ref: PackageRef,
}

impl CoreData {
    pub fn package(&self) -> &str {
        &self.package_ref.name
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package_ref.name = package.into();
        self
    }
}

impl Marshal for CoreData {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<CoreData>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .attribute(
                    "description",
                    ADTCORE.name("description"),
                    |c| &c.description,
                    |c| &mut c.description,
                )
                .attribute("language", ADTCORE.name("language"), |c| &c.language, |c| &mut c.language)
                .attribute(
                    "master_language",
                    ADTCORE.name("masterLanguage"),
                    |c| &c.master_language,
                    |c| &mut c.master_language,
                )
                .attribute(
                    "master_system",
                    ADTCORE.name("masterSystem"),
                    |c| &c.master_system,
                    |c| &mut c.master_system,
                )
                .attribute(
                    "responsible",
                    ADTCORE.name("responsible"),
                    |c| &c.responsible,
                    |c| &mut c.responsible,
                )
                .node(
                    "package_ref",
                    ADTCORE.name("packageRef"),
                    |c| &c.package_ref,
                    |c| &mut c.package_ref,
                )
                .build()
        })
    }
}

/// A named workbench object of some `ObjectType`.
#[derive(Debug, Clone)]
pub struct AdtObject {
    object_type: &'static ObjectType,
    name: String,
    type_code: String,
    core: CoreData,
}

impl Marshal for AdtObject {
    fn registry() -> &'static Registry<Self> {
        static REGISTRY: OnceLock<Registry<AdtObject>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Registry::<Self>::builder()
                .inherit(|o| &o.core, |o| &mut o.core)
                .attribute("name", ADTCORE.name("name"), |o| &o.name, |o| &mut o.name)
                .attribute("type", ADTCORE.name("type"), |o| &o.type_code, |o| &mut o.type_code)
                .build()
        })
    }
}

impl XmlRoot for AdtObject {
    fn object_type(&self) -> &'static ObjectType {
        self.object_type
    }
}

impl std::fmt::Display for AdtObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.object_type.label(), self.name)
    }
}

impl AdtObject {
    pub fn new(object_type: &'static ObjectType, name: impl Into<String>, core: CoreData) -> Self {
        Self {
            object_type,
            name: name.into(),
            type_code: object_type.code.unwrap_or_default().to_string(),
            core,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> &'static ObjectType {
        self.object_type
    }

    pub fn core(&self) -> &CoreData {
        &self.core
    }

    pub fn uri(&self) -> String {
        self.object_type.object_uri(&self.name)
    }

    pub fn source_uri(&self) -> String {
        format!("{}/source/main", self.uri())
    }

    /// Create the object on the server.
    pub fn create(&self, connection: &mut Connection, corrnr: Option<&str>) -> Result<()> {
        let body = marshal::serialize(self)?;
        let mut request = Request::new()
            .content_type(self.object_type.mimetype)
            .body(body);
        if let Some(corrnr) = corrnr {
            request = request.param("corrNr", corrnr);
        }

        connection.execute(HttpMethod::Post, self.object_type.basepath, &request)?;
        info!(object = %self, "created");
        Ok(())
    }

    /// Fetch the object's metadata from the server.
    pub fn fetch(
        connection: &mut Connection,
        object_type: &'static ObjectType,
        name: &str,
    ) -> Result<Self> {
        let mut object = Self::new(object_type, name, CoreData::default());
        let response = connection.execute(
            HttpMethod::Get,
            &object.uri(),
            &Request::new().accept(object_type.mimetype),
        )?;
        marshal::deserialize(&response.body, &mut object)?;
        Ok(object)
    }

    /// Read the main source text.
    pub fn read_text(&self, connection: &mut Connection) -> Result<String> {
        let accept = self
            .object_type
            .alternate_mimetype("text/plain")
            .unwrap_or("text/plain");
        let response = connection.execute(
            HttpMethod::Get,
            &self.source_uri(),
            &Request::new().accept(accept),
        )?;
        Ok(response.body)
    }

    /// Lock the object, run `edit` with an editor, and unlock again no
    /// matter how `edit` ends.
    pub fn open_editor<R>(
        &self,
        connection: &mut Connection,
        corrnr: Option<&str>,
        edit: impl FnOnce(&mut Editor<'_>) -> Result<R>,
    ) -> Result<R> {
        if self.object_type.editor != EditorKind::Source {
            return Err(ApiError::NoEditor(self.object_type.label().to_string()));
        }
        session::edit(connection, &self.uri(), corrnr, edit)
    }
}
