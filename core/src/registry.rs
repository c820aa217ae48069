//! Ordered member registry.
//!
//! # Design
//! Each marshalled type owns one `Registry`, built once through
//! `Registry::<Self>::builder()` and kept in a `OnceLock` behind
//! `Marshal::registry()`. Builder calls append in call order, so the
//! declaration order in source is the emission order on the wire; some ADT
//! endpoints reject documents whose members are out of order.
//!
//! Members of an embedded parent type are pulled in with `inherit`, which
//! appends the parent's members (in the parent's order) before any member
//! declared after it. Declaring the same field name twice is a programming
//! error and panics while the registry is being built.

use crate::marshal::Marshal;
use crate::property::Property;
use crate::xml::QName;

/// The ordered `(field name, descriptor)` table of a marshalled type.
#[derive(Debug)]
pub struct Registry<T> {
    members: Vec<Property<T>>,
}

impl<T: 'static> Registry<T> {
    pub fn builder() -> RegistryBuilder<T> {
        RegistryBuilder {
            members: Vec::new(),
        }
    }

    /// Members in declaration order.
    pub fn members(&self) -> std::slice::Iter<'_, Property<T>> {
        self.members.iter()
    }

    pub fn get(&self, field: &str) -> Option<&Property<T>> {
        self.members.iter().find(|member| member.field() == field)
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.members.iter().map(Property::field).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Declares the members of a `Registry` in order.
///
/// # Panics
///
/// Every declaring method panics when `field` is already registered.
pub struct RegistryBuilder<T> {
    members: Vec<Property<T>>,
}

impl<T: 'static> RegistryBuilder<T> {
    /// A field stored in an attribute of the owning element.
    pub fn attribute(
        self,
        field: &'static str,
        name: QName,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        self.push(Property::attribute(field, name, get, get_mut))
    }

    /// A field stored as the text of a single child element.
    pub fn text(
        self,
        field: &'static str,
        name: QName,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> Self {
        self.push(Property::text(field, name, get, get_mut))
    }

    /// A field collecting the texts of all child elements named `name`.
    pub fn text_list(
        self,
        field: &'static str,
        name: QName,
        get: fn(&T) -> &Vec<String>,
        get_mut: fn(&mut T) -> &mut Vec<String>,
    ) -> Self {
        self.push(Property::text_list(field, name, get, get_mut))
    }

    /// A field holding one nested object stored as the child `name`.
    pub fn node<N: Marshal + Default>(
        self,
        field: &'static str,
        name: QName,
        get: fn(&T) -> &N,
        get_mut: fn(&mut T) -> &mut N,
    ) -> Self {
        self.push(Property::node(field, name, get, get_mut))
    }

    /// A field holding one nested object per child element `name`.
    pub fn node_list<N: Marshal + Default>(
        self,
        field: &'static str,
        name: QName,
        get: fn(&T) -> &Vec<N>,
        get_mut: fn(&mut T) -> &mut Vec<N>,
    ) -> Self {
        self.push(Property::node_list(field, name, get, get_mut))
    }

    /// Append every member of the embedded parent type `P`, keeping the
    /// parent's order.
    pub fn inherit<P: Marshal>(mut self, get: fn(&T) -> &P, get_mut: fn(&mut T) -> &mut P) -> Self {
        for member in P::registry().members() {
            self = self.push(member.lift(get, get_mut));
        }
        self
    }

    pub fn build(self) -> Registry<T> {
        Registry {
            members: self.members,
        }
    }

    fn push(mut self, property: Property<T>) -> Self {
        assert!(
            self.members
                .iter()
                .all(|member| member.field() != property.field()),
            "property `{}` is declared twice",
            property.field()
        );
        self.members.push(property);
        self
    }
}
