//! Property descriptors: typed accessors binding one struct field to one XML
//! location.
//!
//! # Design
//! The set of descriptor kinds is closed (`PropertyKind`), so the marshal
//! engine dispatches with a single `match` instead of per-field trait
//! objects. Field access is type-erased behind `read`/`write` closures that
//! exchange a `Value`; the closures are built from plain `fn` accessors, so
//! a descriptor can only ever touch the field it was declared for.

use crate::marshal::{self, Marshal};
use crate::xml::{Element, QName};

/// Where and how a field lives in the XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// An attribute of the owning element.
    Attribute,
    /// Text content of a child element. With `repeated`, every child with
    /// the same tag contributes one string, in document order.
    TextElement { repeated: bool },
    /// A single child element materialized as a nested marshalled object.
    Node,
    /// Repeated child elements, each materialized as one nested object.
    ListContainer,
}

/// The value exchanged between a descriptor and the marshal engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Texts(Vec<String>),
    Nodes(Vec<Element>),
}

type ReadFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type WriteFn<T> = Box<dyn Fn(&mut T, Value) + Send + Sync>;

/// A descriptor bound to one field of `T`.
pub struct Property<T> {
    field: &'static str,
    name: QName,
    kind: PropertyKind,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

impl<T> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("field", &self.field)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl<T: 'static> Property<T> {
    /// Name of the bound struct field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// XML tag or attribute name.
    pub fn name(&self) -> QName {
        self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn read(&self, instance: &T) -> Value {
        (self.read)(instance)
    }

    /// Store `value` into the bound field. A value whose shape does not fit
    /// the descriptor kind is ignored.
    pub fn write(&self, instance: &mut T, value: Value) {
        (self.write)(instance, value)
    }

    pub(crate) fn attribute(
        field: &'static str,
        name: QName,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        Self::scalar(field, name, PropertyKind::Attribute, get, get_mut)
    }

    pub(crate) fn text(
        field: &'static str,
        name: QName,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        Self::scalar(
            field,
            name,
            PropertyKind::TextElement { repeated: false },
            get,
            get_mut,
        )
    }

    fn scalar(
        field: &'static str,
        name: QName,
        kind: PropertyKind,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        Self {
            field,
            name,
            kind,
            read: Box::new(move |instance| Value::Text(get(instance).clone())),
            write: Box::new(move |instance, value| {
                if let Value::Text(text) = value {
                    *get_mut(instance) = text;
                }
            }),
        }
    }

    pub(crate) fn text_list(
        field: &'static str,
        name: QName,
        get: fn(&T) -> &Vec<String>,
        get_mut: fn(&mut T) -> &mut Vec<String>,
    ) -> Self {
        Self {
            field,
            name,
            kind: PropertyKind::TextElement { repeated: true },
            read: Box::new(move |instance| Value::Texts(get(instance).clone())),
            write: Box::new(move |instance, value| {
                if let Value::Texts(texts) = value {
                    *get_mut(instance) = texts;
                }
            }),
        }
    }

    pub(crate) fn node<N: Marshal + Default>(
        field: &'static str,
        name: QName,
        get: fn(&T) -> &N,
        get_mut: fn(&mut T) -> &mut N,
    ) -> Self {
        Self {
            field,
            name,
            kind: PropertyKind::Node,
            read: Box::new(move |instance| {
                Value::Nodes(vec![marshal::to_element(get(instance), name)])
            }),
            write: Box::new(move |instance, value| {
                if let Value::Nodes(elements) = value {
                    if let Some(element) = elements.first() {
                        *get_mut(instance) = materialize(element);
                    }
                }
            }),
        }
    }

    pub(crate) fn node_list<N: Marshal + Default>(
        field: &'static str,
        name: QName,
        get: fn(&T) -> &Vec<N>,
        get_mut: fn(&mut T) -> &mut Vec<N>,
    ) -> Self {
        Self {
            field,
            name,
            kind: PropertyKind::ListContainer,
            read: Box::new(move |instance| {
                Value::Nodes(
                    get(instance)
                        .iter()
                        .map(|item| marshal::to_element(item, name))
                        .collect(),
                )
            }),
            write: Box::new(move |instance, value| {
                if let Value::Nodes(elements) = value {
                    *get_mut(instance) = elements.iter().map(materialize::<N>).collect();
                }
            }),
        }
    }

    /// Re-bind a parent type's descriptor to a type embedding it, reaching
    /// the parent value through `get`/`get_mut`.
    pub(crate) fn lift<C: 'static>(
        &'static self,
        get: fn(&C) -> &T,
        get_mut: fn(&mut C) -> &mut T,
    ) -> Property<C> {
        Property {
            field: self.field,
            name: self.name,
            kind: self.kind,
            read: Box::new(move |instance| self.read(get(instance))),
            write: Box::new(move |instance, value| self.write(get_mut(instance), value)),
        }
    }
}

fn materialize<N: Marshal + Default>(element: &Element) -> N {
    let mut item = N::default();
    marshal::unmarshal(element, &mut item);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Namespace;

    const NS: Namespace = Namespace::new("t", "urn:test");

    #[derive(Default)]
    struct Sample {
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn attribute_reads_and_writes_its_field_only() {
        let property =
            Property::<Sample>::attribute("title", NS.name("title"), |s| &s.title, |s| &mut s.title);
        let mut sample = Sample::default();

        property.write(&mut sample, Value::Text("hello".to_string()));
        assert_eq!(sample.title, "hello");
        assert!(sample.tags.is_empty());
        assert_eq!(property.read(&sample), Value::Text("hello".to_string()));
        assert_eq!(property.kind(), PropertyKind::Attribute);
        assert_eq!(property.field(), "title");
    }

    #[test]
    fn mismatched_value_shape_is_ignored() {
        let property = Property::<Sample>::text_list("tags", NS.name("tag"), |s| &s.tags, |s| &mut s.tags);
        let mut sample = Sample::default();

        property.write(&mut sample, Value::Text("not a list".to_string()));
        assert!(sample.tags.is_empty());

        property.write(&mut sample, Value::Texts(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(sample.tags, ["a", "b"]);
        assert_eq!(
            property.kind(),
            PropertyKind::TextElement { repeated: true }
        );
    }
}
