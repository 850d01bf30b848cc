//! Declarative element descriptions.
//!
//! An [`Element`] is an immutable value describing one node of the desired tree:
//! its [`ElementKind`], its [`Properties`] and its ordered children. Elements are
//! cheap to clone as properties and children are shared behind `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use fiber_reconciler::{Callback, Element};
//!
//! let element = Element::host("div")
//!     .prop("id", "foo")?
//!     .child(Element::host("a").child("bar")?)?
//!     .child(Element::host("input").prop("onInput", Callback::new(|_| {}))?)?;
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ElementError;

/// Property name that holds the content of text nodes.
pub const NODE_VALUE: &str = "nodeValue";

/// Name reserved for children; never stored as a property.
pub const CHILDREN: &str = "children";

/// Prefix that marks a property name as an event binding (`onClick`, `onInput`).
pub const EVENT_PREFIX: &str = "on";

/// Node type of an element or fiber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A backend node identified by its tag (e.g. `"div"`).
    Host(String),
    /// A text node; its content is the [`NODE_VALUE`] attribute.
    Text,
    /// Groups children without a node of its own.
    Fragment,
    /// The container fiber of a render session. Never produced by element constructors.
    Root,
}

impl ElementKind {
    /// Returns true if fibers of this kind own a render-target handle.
    pub fn has_handle(&self) -> bool {
        !matches!(self, ElementKind::Fragment)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => f.write_str(tag),
            ElementKind::Text => f.write_str("#text"),
            ElementKind::Fragment => f.write_str("#fragment"),
            ElementKind::Root => f.write_str("#root"),
        }
    }
}

/// Scalar property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(i64),
    /// A finite floating point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => f.write_str(s),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

type CallbackFn = dyn Fn(&dyn Any) + Send + Sync;

/// Shared event callback.
///
/// Equality is identity: two callbacks are equal only if they are clones of the
/// same allocation, which is what the commit diff uses to decide on rebinding.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&dyn Any) + Send + Sync + 'static) -> Self {
        Callback(Arc::new(f))
    }

    /// Invoke the callback with an event payload supplied by the backend.
    pub fn call(&self, event: &dyn Any) {
        (self.0)(event)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// One property entry, tagged by how the backend applies it.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    /// Set and reset through `set_property` / `remove_property`.
    Attribute(PropValue),
    /// Bound through `add_event_binding` / `remove_event_binding`.
    Event {
        /// Backend event name (`onInput` binds `input`).
        event: String,
        /// The handler.
        callback: Callback,
    },
}

impl Prop {
    /// Returns true for event bindings.
    pub fn is_event(&self) -> bool {
        matches!(self, Prop::Event { .. })
    }
}

/// Input accepted by [`Element::prop`]; classified against the property name.
#[derive(Debug, Clone)]
pub enum PropInput {
    /// A scalar.
    Value(PropValue),
    /// A callback.
    Callback(Callback),
}

impl From<PropValue> for PropInput {
    fn from(value: PropValue) -> Self {
        PropInput::Value(value)
    }
}

macro_rules! prop_input_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropInput {
                fn from(value: $ty) -> Self {
                    PropInput::Value(value.into())
                }
            }
        )*
    };
}

prop_input_from!(&str, String, i64, i32, f64, bool);

impl From<Callback> for PropInput {
    fn from(callback: Callback) -> Self {
        PropInput::Callback(callback)
    }
}

/// Returns the bound event name if `name` follows the event naming convention.
///
/// A name is an event name when it starts with [`EVENT_PREFIX`] followed by an
/// uppercase ASCII letter; the event is the remainder lower-cased.
pub fn event_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix(EVENT_PREFIX)?;
    match rest.chars().next() {
        Some(c) if c.is_ascii_uppercase() => Some(rest.to_ascii_lowercase()),
        _ => None,
    }
}

/// Ordered property map of an element or fiber.
///
/// Clone is cheap as the map is wrapped by `Arc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties(Arc<BTreeMap<String, Prop>>);

impl Properties {
    /// Empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.0.get(name)
    }

    /// Look up an attribute value by name.
    pub fn attribute(&self, name: &str) -> Option<&PropValue> {
        match self.0.get(name)? {
            Prop::Attribute(value) => Some(value),
            Prop::Event { .. } => None,
        }
    }

    /// Returns true if an entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> + '_ {
        self.0.iter().map(|(name, prop)| (name.as_str(), prop))
    }

    fn insert(&mut self, name: String, prop: Prop) {
        Arc::make_mut(&mut self.0).insert(name, prop);
    }
}

/// Child accepted by [`Element::child`]; primitives are promoted to text elements.
#[derive(Debug, Clone)]
pub enum Child {
    /// A structural child.
    Element(Element),
    /// A primitive that becomes a text element.
    Value(PropValue),
}

impl Child {
    /// Convert into an element, applying primitive promotion.
    pub fn into_element(self) -> Result<Element, ElementError> {
        match self {
            Child::Element(element) => Ok(element),
            Child::Value(PropValue::Float(x)) if !x.is_finite() => {
                Err(ElementError::NonFiniteNumber {
                    name: NODE_VALUE.to_string(),
                })
            }
            Child::Value(value) => Ok(Element::text(value.to_string())),
        }
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Value(value.into())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Value(value.into())
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Value(value.into())
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Value(value.into())
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Value(value.into())
    }
}

/// Immutable description of one tree node and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    kind: ElementKind,
    properties: Properties,
    children: Arc<Vec<Element>>,
}

impl Element {
    fn with_kind(kind: ElementKind) -> Self {
        Self {
            kind,
            properties: Properties::new(),
            children: Arc::new(Vec::new()),
        }
    }

    /// A backend node with the given tag.
    ///
    /// An empty tag is rejected once the element is used: by [`Element::child`],
    /// [`create_element`] and `Reconciler::render`.
    pub fn host(tag: impl Into<String>) -> Self {
        Self::with_kind(ElementKind::Host(tag.into()))
    }

    /// A fragment grouping its children without a node of its own.
    pub fn fragment() -> Self {
        Self::with_kind(ElementKind::Fragment)
    }

    /// A text node holding `value` as its [`NODE_VALUE`].
    pub fn text(value: impl Into<String>) -> Self {
        let mut element = Self::with_kind(ElementKind::Text);
        element.properties.insert(
            NODE_VALUE.to_string(),
            Prop::Attribute(PropValue::Str(value.into())),
        );
        element
    }

    /// The node type.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// The properties, excluding children.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The ordered children.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub(crate) fn shared_children(&self) -> Arc<Vec<Element>> {
        self.children.clone()
    }

    /// Add a property, classifying it by the event naming convention.
    ///
    /// # Errors
    ///
    /// Fails on the reserved `children` name, an empty name, a callback under a
    /// plain name, a plain value under an event name, or a non-finite float.
    pub fn prop(mut self, name: &str, value: impl Into<PropInput>) -> Result<Self, ElementError> {
        validate_name(name)?;
        let prop = match (event_name(name), value.into()) {
            (Some(event), PropInput::Callback(callback)) => Prop::Event { event, callback },
            (None, PropInput::Value(value)) => {
                check_finite(name, &value)?;
                Prop::Attribute(value)
            }
            (Some(_), PropInput::Value(_)) => {
                return Err(ElementError::ValueOnEvent {
                    name: name.to_string(),
                })
            }
            (None, PropInput::Callback(_)) => {
                return Err(ElementError::CallbackOnAttribute {
                    name: name.to_string(),
                })
            }
        };
        self.properties.insert(name.to_string(), prop);
        Ok(self)
    }

    /// Add a plain attribute without consulting the event naming convention.
    pub fn attr(mut self, name: &str, value: impl Into<PropValue>) -> Result<Self, ElementError> {
        validate_name(name)?;
        let value = value.into();
        check_finite(name, &value)?;
        self.properties
            .insert(name.to_string(), Prop::Attribute(value));
        Ok(self)
    }

    /// Bind `callback` to the backend event `event`, stored as `on<Event>`.
    pub fn on(mut self, event: &str, callback: Callback) -> Result<Self, ElementError> {
        let mut chars = event.chars();
        let Some(first) = chars.next() else {
            return Err(ElementError::EmptyName);
        };
        let name = format!("{EVENT_PREFIX}{}{}", first.to_ascii_uppercase(), chars.as_str());
        self.properties.insert(
            name,
            Prop::Event {
                event: event.to_ascii_lowercase(),
                callback,
            },
        );
        Ok(self)
    }

    /// Append one child. Strings and numbers become text elements.
    ///
    /// # Errors
    ///
    /// Fails when `self` is a text element, the child is a non-finite float or
    /// the child is a host element with an empty tag.
    pub fn child(mut self, child: impl Into<Child>) -> Result<Self, ElementError> {
        if self.kind == ElementKind::Text {
            return Err(ElementError::TextChildren);
        }
        let element = child.into().into_element()?;
        validate_kind(element.kind())?;
        Arc::make_mut(&mut self.children).push(element);
        Ok(self)
    }

    /// Append every child from `children` in order.
    pub fn with_children<C: Into<Child>>(
        mut self,
        children: impl IntoIterator<Item = C>,
    ) -> Result<Self, ElementError> {
        for child in children {
            self = self.child(child)?;
        }
        Ok(self)
    }
}

/// Rejects host elements with an empty tag.
pub(crate) fn validate_kind(kind: &ElementKind) -> Result<(), ElementError> {
    match kind {
        ElementKind::Host(tag) if tag.is_empty() => Err(ElementError::EmptyKind),
        _ => Ok(()),
    }
}

fn validate_name(name: &str) -> Result<(), ElementError> {
    if name.is_empty() {
        return Err(ElementError::EmptyName);
    }
    if name == CHILDREN {
        return Err(ElementError::ReservedName);
    }
    Ok(())
}

fn check_finite(name: &str, value: &PropValue) -> Result<(), ElementError> {
    match value {
        PropValue::Float(x) if !x.is_finite() => Err(ElementError::NonFiniteNumber {
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Build a host element in one call, in the classic `createElement` shape.
///
/// ```ignore
/// let element = create_element(
///     "div",
///     [("id", PropInput::from("foo"))],
///     [Child::from(create_element("a", [], ["bar"])?), Child::from(42)],
/// )?;
/// ```
pub fn create_element<'a, C: Into<Child>>(
    tag: &str,
    props: impl IntoIterator<Item = (&'a str, PropInput)>,
    children: impl IntoIterator<Item = C>,
) -> Result<Element, ElementError> {
    let mut element = Element::host(tag);
    validate_kind(element.kind())?;
    for (name, value) in props {
        element = element.prop(name, value)?;
    }
    element.with_children(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_convention() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onInput").as_deref(), Some("input"));
        assert_eq!(event_name("online"), None);
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("id"), None);
    }

    #[test]
    fn test_primitive_promotion() {
        let element = Element::host("p")
            .with_children([Child::from("hello"), Child::from(42), Child::from(1.5)])
            .unwrap();
        let kinds: Vec<_> = element.children().iter().map(|c| c.kind().clone()).collect();
        assert_eq!(kinds, vec![ElementKind::Text; 3]);

        let values: Vec<_> = element
            .children()
            .iter()
            .map(|c| c.properties().attribute(NODE_VALUE).unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["hello", "42", "1.5"]);
        assert!(element.children().iter().all(|c| c.children().is_empty()));
        assert!(element
            .children()
            .iter()
            .all(|c| c.properties().len() == 1 && !c.properties().contains(CHILDREN)));
    }

    #[test]
    fn test_prop_classification() {
        let cb = Callback::new(|_| {});
        let element = Element::host("input")
            .prop("value", "x")
            .unwrap()
            .prop("onInput", cb.clone())
            .unwrap();
        assert_eq!(
            element.properties().get("value"),
            Some(&Prop::Attribute(PropValue::Str("x".into())))
        );
        assert_eq!(
            element.properties().get("onInput"),
            Some(&Prop::Event {
                event: "input".into(),
                callback: cb
            })
        );
    }

    #[test]
    fn test_malformed_props_fail_fast() {
        let cb = Callback::new(|_| {});
        assert_eq!(
            Element::host("div").prop("children", "x").unwrap_err(),
            ElementError::ReservedName
        );
        assert_eq!(
            Element::host("div").prop("", 1).unwrap_err(),
            ElementError::EmptyName
        );
        assert_eq!(
            Element::host("div").prop("title", cb).unwrap_err(),
            ElementError::CallbackOnAttribute {
                name: "title".into()
            }
        );
        assert_eq!(
            Element::host("div").prop("onClick", true).unwrap_err(),
            ElementError::ValueOnEvent {
                name: "onClick".into()
            }
        );
        assert_eq!(
            Element::host("div").prop("width", f64::NAN).unwrap_err(),
            ElementError::NonFiniteNumber {
                name: "width".into()
            }
        );
    }

    #[test]
    fn test_text_is_leaf() {
        assert_eq!(
            Element::text("a").child("b").unwrap_err(),
            ElementError::TextChildren
        );
        assert_eq!(
            Element::host("p").child(f64::INFINITY).unwrap_err(),
            ElementError::NonFiniteNumber {
                name: NODE_VALUE.into()
            }
        );
    }

    #[test]
    fn test_empty_host_tag_is_rejected_when_composed() {
        assert_eq!(
            Element::host("div").child(Element::host("")).unwrap_err(),
            ElementError::EmptyKind
        );
        assert_eq!(
            Element::host("ul")
                .with_children([Element::host("li"), Element::host("")])
                .unwrap_err(),
            ElementError::EmptyKind
        );
        assert!(Element::host("div").child(Element::fragment()).is_ok());
    }

    #[test]
    fn test_on_stores_convention_name() {
        let element = Element::host("button")
            .on("click", Callback::new(|_| {}))
            .unwrap();
        assert!(element.properties().get("onClick").unwrap().is_event());
    }

    #[test]
    fn test_create_element() {
        let element = create_element(
            "div",
            [("id", PropInput::from("foo"))],
            [
                Child::from(create_element("a", [], ["bar"]).unwrap()),
                Child::from(Element::host("b")),
            ],
        )
        .unwrap();
        assert_eq!(element.kind(), &ElementKind::Host("div".into()));
        assert_eq!(element.children().len(), 2);
        assert_eq!(
            create_element("", [], Vec::<Child>::new()).unwrap_err(),
            ElementError::EmptyKind
        );
    }

    #[test]
    fn test_callback_identity() {
        let a = Callback::new(|_| {});
        let b = Callback::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_shares_storage() {
        let element = Element::host("div").child("x").unwrap();
        let copy = element.clone();
        assert!(Arc::ptr_eq(&element.children, &copy.children));
        assert_eq!(element, copy);
    }
}
