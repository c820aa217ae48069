//! Namespaced XML element tree.
//!
//! # Design
//! The marshal engine works on a small owned tree instead of a streaming
//! serde bridge: ADT documents are small, and descriptors need random access
//! to attributes and repeated children by `(namespace URI, local name)`.
//! Parsing resolves every prefix to its URI with `quick_xml::NsReader`, so
//! matching never depends on the prefixes a server happens to choose.
//! Writing declares all namespaces once, on the root element.

use std::fmt;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};

use crate::error::{ApiError, Result};

/// An XML namespace binding: the prefix used when writing and the URI used
/// when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

impl Namespace {
    pub const fn new(prefix: &'static str, uri: &'static str) -> Self {
        Self { prefix, uri }
    }

    /// Qualified name `prefix:local` in this namespace.
    pub const fn name(self, local: &'static str) -> QName {
        QName {
            namespace: Some(self),
            local,
        }
    }
}

/// A statically declared element or attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<Namespace>,
    pub local: &'static str,
}

impl QName {
    /// A name outside of any namespace, e.g. `LOCK_HANDLE` or `id`.
    pub const fn unqualified(local: &'static str) -> Self {
        Self {
            namespace: None,
            local,
        }
    }

    pub fn uri(&self) -> Option<&'static str> {
        self.namespace.map(|ns| ns.uri)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Some(ns) => write!(f, "{}:{}", ns.prefix, self.local),
            None => f.write_str(self.local),
        }
    }
}

/// The name of a node in an `Element` tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl Name {
    pub fn matches(&self, name: &QName) -> bool {
        self.local == name.local && self.namespace.as_deref() == name.uri()
    }

    fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", self.local),
            _ => self.local.clone(),
        }
    }
}

impl From<QName> for Name {
    fn from(name: QName) -> Self {
        Self {
            namespace: name.uri().map(str::to_string),
            prefix: name.namespace.map(|ns| ns.prefix.to_string()),
            local: name.local.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: Name,
    pub value: String,
}

/// An owned XML element with its attributes, child elements and the
/// concatenation of its direct text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: Name,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn with_text(name: impl Into<Name>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.text = text.into();
        element
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty() && self.text.is_empty()
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.matches(name))
            .map(|attr| attr.value.as_str())
    }

    pub fn child(&self, name: &QName) -> Option<&Element> {
        self.children.iter().find(|child| child.name.matches(name))
    }

    /// All direct children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a QName) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name.matches(name))
    }

    /// Text of the first descendant (depth-first, document order) whose
    /// local name is `local`, regardless of namespace.
    pub fn find_descendant_text(&self, local: &str) -> Option<&str> {
        for child in &self.children {
            if child.name.local == local {
                return Some(child.text.as_str());
            }
            if let Some(text) = child.find_descendant_text(local) {
                return Some(text);
            }
        }
        None
    }

    /// Parse a complete document and return its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(ApiError::parse)? {
                Event::Start(start) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(ApiError::Parse("multiple root elements".to_string()));
                    }
                    stack.push(open_element(&reader, &start)?);
                }
                Event::Empty(start) => {
                    let element = open_element(&reader, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ApiError::Parse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(utf8(&text)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(utf8(&data)?);
                    }
                }
                Event::GeneralRef(reference) => {
                    let Some(top) = stack.last_mut() else {
                        continue;
                    };
                    match reference.resolve_char_ref().map_err(ApiError::parse)? {
                        Some(ch) => top.text.push(ch),
                        None => {
                            let entity = utf8(&reference)?;
                            let resolved = resolve_predefined_entity(entity).ok_or_else(|| {
                                ApiError::Parse(format!("unknown entity &{entity};"))
                            })?;
                            top.text.push_str(resolved);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ApiError::Parse("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| ApiError::Parse("document has no root element".to_string()))
    }

    /// Render this element as a complete document. `declared` namespaces
    /// are bound on the root first; any other namespace used in the tree is
    /// bound there as well, in order of first use.
    pub fn to_xml(&self, declared: &[Namespace]) -> Result<String> {
        let mut bindings: Vec<(String, String)> = Vec::new();
        for ns in declared {
            bind(&mut bindings, ns.prefix, ns.uri)?;
        }
        collect_bindings(self, &mut bindings)?;

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(ApiError::serialization)?;
        write_element(&mut writer, self, &bindings)?;
        String::from_utf8(writer.into_inner()).map_err(ApiError::serialization)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(ApiError::parse)
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(ApiError::Parse(format!(
            "undeclared namespace prefix {}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn open_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Element> {
    let (resolved, local) = reader.resolve_element(start.name());
    let mut element = Element::new(Name {
        namespace: namespace_uri(resolved)?,
        prefix: match start.name().prefix() {
            Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
            None => None,
        },
        local: utf8(local.as_ref())?.to_string(),
    });

    for attr in start.attributes() {
        let attr = attr.map_err(ApiError::parse)?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let name = Name {
            namespace: namespace_uri(resolved)?,
            prefix: match attr.key.prefix() {
                Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
                None => None,
            },
            local: utf8(local.as_ref())?.to_string(),
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(ApiError::parse)?
            .into_owned();
        element.attributes.push(Attribute { name, value });
    }

    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(ApiError::Parse("multiple root elements".to_string())),
    }
    Ok(())
}

fn bind(bindings: &mut Vec<(String, String)>, prefix: &str, uri: &str) -> Result<()> {
    match bindings.iter().find(|(bound, _)| bound == prefix) {
        Some((_, bound_uri)) if bound_uri == uri => Ok(()),
        Some((_, bound_uri)) => Err(ApiError::Serialization(format!(
            "prefix '{prefix}' bound to both {bound_uri} and {uri}"
        ))),
        None => {
            bindings.push((prefix.to_string(), uri.to_string()));
            Ok(())
        }
    }
}

fn bind_name(bindings: &mut Vec<(String, String)>, name: &Name) -> Result<()> {
    match (&name.namespace, &name.prefix) {
        (Some(uri), prefix) => bind(bindings, prefix.as_deref().unwrap_or(""), uri),
        (None, Some(prefix)) if !prefix.is_empty() => Err(ApiError::Serialization(format!(
            "prefix '{prefix}' of {} has no namespace",
            name.local
        ))),
        (None, _) => Ok(()),
    }
}

fn collect_bindings(element: &Element, bindings: &mut Vec<(String, String)>) -> Result<()> {
    bind_name(bindings, &element.name)?;
    for attr in &element.attributes {
        bind_name(bindings, &attr.name)?;
    }
    for child in &element.children {
        collect_bindings(child, bindings)?;
    }
    Ok(())
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    bindings: &[(String, String)],
) -> Result<()> {
    let qualified = element.name.qualified();
    let mut start = BytesStart::new(qualified.as_str());

    for (prefix, uri) in bindings {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{prefix}")
        };
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    for attr in &element.attributes {
        let key = attr.name.qualified();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(ApiError::serialization)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(ApiError::serialization)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(ApiError::serialization)?;
    }
    for child in &element.children {
        write_element(writer, child, &[])?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(qualified.as_str())))
        .map_err(ApiError::serialization)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHKRUN: Namespace = Namespace::new("chkrun", "http://www.sap.com/adt/checkrun");
    const ADTCORE: Namespace = Namespace::new("adtcore", "http://www.sap.com/adt/core");

    #[test]
    fn parse_resolves_prefixes_to_uris() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<x:reporters xmlns:x="http://www.sap.com/adt/checkrun">
  <x:reporter x:name="abapCheckRun"/>
</x:reporters>"#;
        let root = Element::parse(xml).unwrap();
        assert!(root.name.matches(&CHKRUN.name("reporters")));

        let reporter = root.child(&CHKRUN.name("reporter")).unwrap();
        assert_eq!(reporter.attribute(&CHKRUN.name("name")), Some("abapCheckRun"));
        assert_eq!(reporter.name.prefix.as_deref(), Some("x"));
    }

    #[test]
    fn parse_unqualified_names_have_no_namespace() {
        let root = Element::parse(r#"<sap><LOCK_HANDLE>win</LOCK_HANDLE></sap>"#).unwrap();
        let handle = root.child(&QName::unqualified("LOCK_HANDLE")).unwrap();
        assert_eq!(handle.text, "win");
        assert!(handle.name.namespace.is_none());
    }

    #[test]
    fn parse_unescapes_text_and_attributes() {
        let root = Element::parse(r#"<a b="x &amp; y">1 &lt; 2 &#x41;</a>"#).unwrap();
        assert_eq!(root.attribute(&QName::unqualified("b")), Some("x & y"));
        assert_eq!(root.text, "1 < 2 A");
    }

    #[test]
    fn parse_rejects_malformed_documents() {
        let err = Element::parse(r#"<?xml version="1.0" encoding="utf-8"><error>random failure</error>"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));

        let err = Element::parse("<a><b></a>").unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));

        let err = Element::parse("<a>").unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));

        let err = Element::parse("").unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn parse_rejects_undeclared_prefix() {
        let err = Element::parse(r#"<nope:a/>"#).unwrap_err();
        assert!(matches!(err, ApiError::Parse(msg) if msg.contains("nope")));
    }

    #[test]
    fn find_descendant_text_searches_depth_first() {
        let xml = r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml"><asx:values><DATA><LOCK_HANDLE>deep</LOCK_HANDLE></DATA></asx:values></asx:abap>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.find_descendant_text("LOCK_HANDLE"), Some("deep"));
        assert_eq!(root.find_descendant_text("MISSING"), None);
    }

    #[test]
    fn to_xml_declares_namespaces_once_on_root() {
        let mut root = Element::new(CHKRUN.name("checkReporters"));
        let mut reporter = Element::new(CHKRUN.name("reporter"));
        reporter.attributes.push(Attribute {
            name: CHKRUN.name("name").into(),
            value: "a&b".to_string(),
        });
        reporter
            .children
            .push(Element::with_text(ADTCORE.name("packageRef"), "$TMP"));
        root.children.push(reporter);

        let xml = root.to_xml(&[CHKRUN]).unwrap();
        assert_eq!(
            xml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<chkrun:checkReporters xmlns:chkrun="http://www.sap.com/adt/checkrun" xmlns:adtcore="http://www.sap.com/adt/core">"#,
                r#"<chkrun:reporter chkrun:name="a&amp;b"><adtcore:packageRef>$TMP</adtcore:packageRef></chkrun:reporter>"#,
                r#"</chkrun:checkReporters>"#
            )
        );
    }

    #[test]
    fn to_xml_rejects_conflicting_prefixes() {
        let other = Namespace::new("chkrun", "http://example.com/other");
        let mut root = Element::new(CHKRUN.name("root"));
        root.children.push(Element::new(other.name("child")));

        let err = root.to_xml(&[]).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn written_document_parses_back() {
        let mut root = Element::new(ADTCORE.name("objectReferences"));
        root.children
            .push(Element::with_text(QName::unqualified("plain"), "text <here>"));
        let xml = root.to_xml(&[ADTCORE]).unwrap();

        let parsed = Element::parse(&xml).unwrap();
        assert!(parsed.name.matches(&ADTCORE.name("objectReferences")));
        assert_eq!(
            parsed.child(&QName::unqualified("plain")).map(|c| c.text.as_str()),
            Some("text <here>")
        );
    }
}
