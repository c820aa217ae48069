//! Marshal engine: object graph ⇄ XML.
//!
//! # Design
//! Serialization walks `T::registry()` in declaration order and emits one
//! attribute or child element per member, so the order on the wire is the
//! order in the registry. Deserialization is lenient: descriptors look up
//! their node by `(namespace URI, local name)`, unmatched XML is ignored and
//! unmatched members keep whatever value the instance already had. Callers
//! that need strictness inspect the populated values themselves.
//!
//! Empty values produce no output: an empty attribute or text is omitted,
//! an empty list emits no children, and a nested node with nothing in it is
//! left out. Items of a `ListContainer` are always emitted so the number of
//! repetitions survives a round trip.

use tracing::{debug, trace};

use crate::error::Result;
use crate::objects::ObjectType;
use crate::property::{PropertyKind, Value};
use crate::registry::Registry;
use crate::xml::{Attribute, Element, Namespace, QName};

/// A type with an ordered member registry.
pub trait Marshal: Sized + 'static {
    fn registry() -> &'static Registry<Self>;
}

/// A marshalled type that can be the root of a request or response body.
pub trait XmlRoot: Marshal {
    fn object_type(&self) -> &'static ObjectType;
}

/// Serialize `instance` as a document rooted at its object type's element.
pub fn serialize<T: XmlRoot>(instance: &T) -> Result<String> {
    let object_type = instance.object_type();
    serialize_as(instance, object_type.root_name(), object_type.namespaces)
}

/// Serialize `instance` under an explicit root element; `namespaces` are
/// declared on the root before any namespace used further down.
pub fn serialize_as<T: Marshal>(instance: &T, root: QName, namespaces: &[Namespace]) -> Result<String> {
    let element = to_element(instance, root);
    debug!(root = %root, members = T::registry().len(), "serializing");
    element.to_xml(namespaces)
}

/// Parse `xml` and populate `instance` from its root element.
pub fn deserialize<T: Marshal>(xml: &str, instance: &mut T) -> Result<()> {
    let root = Element::parse(xml)?;
    debug!(root = %root.name.local, members = T::registry().len(), "deserializing");
    unmarshal(&root, instance);
    Ok(())
}

/// Build the element `name` holding every member of `instance`.
pub fn to_element<T: Marshal>(instance: &T, name: QName) -> Element {
    let mut element = Element::new(name);

    for property in T::registry().members() {
        let tag = property.name();
        match (property.kind(), property.read(instance)) {
            (_, Value::Text(value)) if value.is_empty() => {}
            (PropertyKind::Attribute, Value::Text(value)) => element.attributes.push(Attribute {
                name: tag.into(),
                value,
            }),
            (_, Value::Text(text)) => element.children.push(Element::with_text(tag, text)),
            (_, Value::Texts(texts)) => element
                .children
                .extend(texts.into_iter().map(|text| Element::with_text(tag, text))),
            (PropertyKind::Node, Value::Nodes(nodes)) => element
                .children
                .extend(nodes.into_iter().filter(|node| !node.is_empty())),
            (_, Value::Nodes(nodes)) => element.children.extend(nodes),
        }
    }

    element
}

/// Populate `instance` from `element` using `T`'s registry; nested objects
/// are populated recursively through their own registries.
pub fn unmarshal<T: Marshal>(element: &Element, instance: &mut T) {
    for property in T::registry().members() {
        let tag = property.name();
        let value = match property.kind() {
            PropertyKind::Attribute => Some(Value::Text(
                element.attribute(&tag).unwrap_or_default().to_string(),
            )),
            PropertyKind::TextElement { repeated: false } => Some(Value::Text(
                element
                    .child(&tag)
                    .map(|child| child.text.clone())
                    .unwrap_or_default(),
            )),
            PropertyKind::TextElement { repeated: true } => {
                let texts: Vec<String> = element
                    .children_named(&tag)
                    .map(|child| child.text.clone())
                    .collect();
                (!texts.is_empty()).then_some(Value::Texts(texts))
            }
            PropertyKind::Node => element
                .child(&tag)
                .map(|child| Value::Nodes(vec![child.clone()])),
            PropertyKind::ListContainer => {
                let nodes: Vec<Element> = element.children_named(&tag).cloned().collect();
                (!nodes.is_empty()).then_some(Value::Nodes(nodes))
            }
        };

        match value {
            Some(value) => property.write(instance, value),
            None => trace!(field = property.field(), tag = %tag, "no matching node"),
        }
    }
}
