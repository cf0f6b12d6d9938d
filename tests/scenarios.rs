use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use flyon_hydrate::entry::{self, READY_EVENT, READY_TEXT, STATUS_ELEMENT_ID};
use flyon_hydrate::mock::{MockBackend, MockDom, MockElement, MockLibrary};
use flyon_hydrate::{BridgeError, ComponentKind, Event, InitConfig};
use serde_json::json;

fn status(backend: &MockBackend) -> MockElement {
    let el = MockElement::new("span").with_id(STATUS_ELEMENT_ID).with_text("Loading…");
    backend.dom.add(&el);
    el
}

fn options(value: serde_json::Value) -> flyon_hydrate::Options {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_dom_late_init_publishes_ready() {
    let backend = MockBackend::with_dom(MockDom::loading());
    MockLibrary::install(&backend.js, &backend.dom);
    let status = status(&backend);

    // Record the status text at the moment wasmReady fires.
    let seen = Rc::new(RefCell::new(None));
    let (s, st) = (seen.clone(), status.clone());
    backend
        .dom
        .add_window_listener(READY_EVENT, Rc::new(move |_: &Event| *s.borrow_mut() = Some(st.text())));

    let pending = entry::hydrate(&backend.manager(), InitConfig::default());
    assert!(!pending.is_complete());

    backend.scheduler.advance(Duration::from_millis(50));
    backend.dom.set_ready();

    let outcome = pending.outcome().unwrap();
    assert!(outcome.success);
    assert!(outcome.dom_ready);
    assert!(outcome.library_loaded);
    assert!(outcome.components_initialised);
    assert_eq!(outcome.initialised_kinds, vec!["all"]);
    assert_eq!(status.text(), READY_TEXT);

    assert!(backend.dom.window_events().is_empty());
    backend.scheduler.advance(Duration::from_millis(10));
    assert_eq!(backend.dom.window_events(), vec![READY_EVENT]);
    assert_eq!(seen.borrow().as_deref(), Some(READY_TEXT));

    assert_eq!(backend.components.initialise_all_calls(), vec![ComponentKind::ALL.to_vec()]);
}

#[test]
fn test_library_never_loads() {
    let backend = MockBackend::new();
    let status = status(&backend);
    let config = InitConfig {
        library_timeout: Duration::from_millis(200),
        max_retries: 1,
        retry_delay: Duration::from_millis(100),
        ..InitConfig::default()
    };

    let pending = entry::hydrate(&backend.manager(), config);
    backend.scheduler.run_until_idle();

    let outcome = pending.outcome().unwrap();
    assert!(!outcome.success);
    assert!(outcome.dom_ready);
    assert!(!outcome.library_loaded);
    assert!(matches!(outcome.error, Some(BridgeError::LibraryTimeout(_))));
    assert!(outcome.duration <= Duration::from_millis(200));
    assert_eq!(status.text(), "Loading…");
    assert!(backend.dom.window_events().is_empty());
}

#[test]
fn test_selector_yields_nothing() {
    let backend = MockBackend::new();
    let el = MockElement::new("div").with_class("d");
    backend.dom.add(&el);
    let manager = backend.manager();

    let err = manager
        .initialise_kind("HSDropdown", ".nope", Some(&options(json!({}))))
        .unwrap_err();
    assert_eq!(err, BridgeError::NoMatchingElements(".nope".into()));
    assert!(el.slot("hsDropdown").is_none());

    assert!(matches!(
        manager.initialise(ComponentKind::Dropdown, "", None),
        Err(BridgeError::NoMatchingElements(_))
    ));
}

#[test]
fn test_multiple_matches() {
    let backend = MockBackend::new();
    let els: Vec<MockElement> = (0..3)
        .map(|i| {
            let el = MockElement::new("div").with_class("d").with_attr("data-i", &i.to_string());
            backend.dom.add(&el);
            el
        })
        .collect();
    let manager = backend.manager();

    let created = manager
        .initialise(ComponentKind::Dropdown, ".d", Some(&options(json!({"x": 1}))))
        .unwrap();
    assert_eq!(created, 3);
    assert!(els.iter().all(|el| el.slot("hsDropdown").is_some()));

    let instance = manager.get_instance(".d", ComponentKind::Dropdown).unwrap();
    let first = els[0].slot("hsDropdown").unwrap();
    assert!(instance.same_as(&first));
    assert_eq!(instance.get("x").as_int(), 1);

    assert_eq!(manager.destroy(".d", ComponentKind::Dropdown).unwrap(), 3);
    assert!(els.iter().all(|el| el.slot("hsDropdown").is_none()));
}

#[test]
fn test_destroy_then_reinitialise() {
    let backend = MockBackend::new();
    backend.dom.add(&MockElement::new("div").with_id("menu"));
    let manager = backend.manager();

    manager.initialise(ComponentKind::Modal, "#menu", None).unwrap();
    manager.destroy("#menu", ComponentKind::Modal).unwrap();
    assert!(matches!(
        manager.get_instance("#menu", ComponentKind::Modal),
        Err(BridgeError::NoInstance { .. })
    ));

    manager.initialise(ComponentKind::Modal, "#menu", None).unwrap();
    assert!(manager.get_instance("#menu", ComponentKind::Modal).is_ok());
}

#[test]
fn test_reinitialise_keeps_existing_instance() {
    let backend = MockBackend::new();
    backend.dom.add(&MockElement::new("div").with_id("t"));
    let manager = backend.manager();

    manager
        .initialise(ComponentKind::Tabs, "#t", Some(&options(json!({"v": 1}))))
        .unwrap();
    let first = manager.get_instance("#t", ComponentKind::Tabs).unwrap();
    assert_eq!(
        manager
            .initialise(ComponentKind::Tabs, "#t", Some(&options(json!({"v": 2}))))
            .unwrap(),
        0
    );
    let second = manager.get_instance("#t", ComponentKind::Tabs).unwrap();
    assert!(first.same_as(&second));
    assert_eq!(second.get("v").as_int(), 1);
}

fn bubbling_page() -> (MockBackend, MockElement, MockElement, Rc<RefCell<Vec<&'static str>>>) {
    let backend = MockBackend::new();
    let parent = MockElement::new("div").with_id("p");
    let child = MockElement::new("button").with_id("c");
    backend.dom.add(&parent);
    backend.dom.add_child(&parent, &child);
    (backend, parent, child, Rc::new(RefCell::new(Vec::new())))
}

#[test]
fn test_event_bubbling() {
    let (backend, _, child, log) = bubbling_page();
    let manager = backend.manager();
    let l = log.clone();
    manager.add_listener("#c", "click", move |_| l.borrow_mut().push("child")).unwrap();
    let l = log.clone();
    manager.add_listener("#p", "click", move |_| l.borrow_mut().push("parent")).unwrap();

    assert!(child.click());
    assert_eq!(*log.borrow(), vec!["child", "parent"]);
}

#[test]
fn test_stop_propagation_hides_event_from_parent() {
    let (backend, _, child, log) = bubbling_page();
    let manager = backend.manager();
    let l = log.clone();
    manager
        .add_listener("#c", "click", move |e| {
            e.stop_propagation();
            l.borrow_mut().push("child");
        })
        .unwrap();
    let l = log.clone();
    manager.add_listener("#p", "click", move |_| l.borrow_mut().push("parent")).unwrap();

    child.click();
    assert_eq!(*log.borrow(), vec!["child"]);
}

#[test]
fn test_prevent_default_still_bubbles() {
    let (backend, _, child, log) = bubbling_page();
    let manager = backend.manager();
    let l = log.clone();
    manager
        .add_listener("#c", "click", move |e| {
            e.prevent_default();
            l.borrow_mut().push("child");
        })
        .unwrap();
    let l = log.clone();
    manager
        .add_listener("#p", "click", move |e| {
            assert!(e.default_prevented());
            l.borrow_mut().push("parent");
        })
        .unwrap();

    assert!(!child.click());
    assert_eq!(*log.borrow(), vec!["child", "parent"]);
}

#[test]
fn test_listener_registered_twice_runs_twice_in_order() {
    let (backend, _, child, log) = bubbling_page();
    let manager = backend.manager();
    let l = log.clone();
    manager.add_listener("#c", "click", move |_| l.borrow_mut().push("first")).unwrap();
    let l = log.clone();
    manager.add_listener("#c", "click", move |_| l.borrow_mut().push("second")).unwrap();

    child.click();
    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn test_remove_listener_restores_dispatch() {
    let (backend, _, child, log) = bubbling_page();
    let manager = backend.manager();
    let l = log.clone();
    manager.add_listener("#c", "click", move |_| l.borrow_mut().push("child")).unwrap();
    assert_eq!(manager.remove_listener("#c", "click").unwrap(), 1);

    assert!(child.click());
    assert!(log.borrow().is_empty());
    assert_eq!(child.listener_count("click"), 0);
}

#[test]
fn test_await_ready_runs_before_returning_when_loaded() {
    let backend = MockBackend::new();
    let fired = Rc::new(RefCell::new(false));
    let f = fired.clone();
    backend.manager().await_ready(move || *f.borrow_mut() = true);
    assert!(*fired.borrow());
}

#[test]
fn test_failed_component_init_keeps_page_static() {
    let backend = MockBackend::new();
    MockLibrary::install(&backend.js, &backend.dom);
    let status = status(&backend);
    backend
        .components
        .fail_kind(ComponentKind::Carousel, BridgeError::LibraryUnavailable("HSCarousel".into()));

    let pending = entry::hydrate(&backend.manager(), InitConfig::default());
    backend.scheduler.run_until_idle();

    let outcome = pending.outcome().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_ref().map(BridgeError::kind), Some("ComponentInitError"));
    assert!(!outcome.components_initialised);
    assert_eq!(status.text(), "Loading…");
    assert!(backend.dom.window_events().is_empty());
}

#[test]
fn test_hydrate_wires_page_handlers() {
    let backend = MockBackend::new();
    MockLibrary::install(&backend.js, &backend.dom);
    let alert = MockElement::new("div").with_class("alert");
    let close = MockElement::new("button").with_class("alert-close");
    alert.append_child(&close);
    backend.dom.add(&alert);

    let pending = entry::hydrate(&backend.manager(), InitConfig::default());
    assert!(pending.outcome().is_some_and(|o| o.success));

    close.click();
    assert_eq!(alert.style("display").as_deref(), Some("none"));
}
