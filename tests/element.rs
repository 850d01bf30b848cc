//! Element construction: primitive promotion and fail-fast validation.

use fiber_reconciler::{
    create_element, Callback, Child, Element, ElementError, ElementKind, Prop, PropInput,
    PropValue, ReconcileError, NODE_VALUE,
};

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_primitive_children_become_text_elements() {
    let element = create_element("p", [], [Child::from("hello"), Child::from(5)]).unwrap();

    for (child, expected) in element.children().iter().zip(["hello", "5"]) {
        assert_eq!(child.kind(), &ElementKind::Text);
        assert_eq!(child.properties().len(), 1);
        assert_eq!(
            child.properties().get(NODE_VALUE),
            Some(&Prop::Attribute(PropValue::Str(expected.to_string())))
        );
        assert!(child.children().is_empty());
    }
}

#[test]
fn test_didact_sample_tree() {
    let on_input = Callback::new(|_| {});
    let element = create_element(
        "div",
        [("id", PropInput::from("foo"))],
        [
            Child::from(create_element("a", [], ["bar"]).unwrap()),
            Child::from(Element::host("b")),
            Child::from(
                create_element(
                    "input",
                    [("onInput", PropInput::from(on_input))],
                    Vec::<Child>::new(),
                )
                .unwrap(),
            ),
        ],
    )
    .unwrap();

    let kinds: Vec<_> = element.children().iter().map(|c| c.kind().to_string()).collect();
    assert_eq!(kinds, vec!["a", "b", "input"]);
    assert!(element.children()[2]
        .properties()
        .get("onInput")
        .is_some_and(Prop::is_event));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_malformed_element_is_reported_synchronously() {
    let result = create_element("div", [("children", PropInput::from("x"))], Vec::<Child>::new());
    assert_eq!(result.unwrap_err(), ElementError::ReservedName);

    let result = create_element(
        "div",
        [("onClick", PropInput::from("not a callback"))],
        Vec::<Child>::new(),
    );
    assert_eq!(
        result.unwrap_err(),
        ElementError::ValueOnEvent {
            name: "onClick".into()
        }
    );

    let result = create_element("div", [], [Child::from(f64::NAN)]);
    assert!(matches!(
        result.unwrap_err(),
        ElementError::NonFiniteNumber { .. }
    ));
}

#[test]
fn test_element_error_propagates_as_reconcile_error() {
    fn build() -> Result<Element, ReconcileError> {
        Ok(Element::host("div").prop("", 1)?)
    }
    assert!(matches!(
        build().unwrap_err(),
        ReconcileError::Element(ElementError::EmptyName)
    ));
}
