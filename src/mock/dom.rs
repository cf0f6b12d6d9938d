//! Synthetic DOM
//!
//! A tree of [`MockElement`]s registered with a [`MockDom`], supporting the
//! simple selectors the hydration code relies on (`#id`, `.class`, `[attr]`,
//! `[attr=value]`, `tag`, joined by descendant combinators) and synchronous
//! event dispatch with bubbling.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use super::value::MockValue;
use crate::dom::{Document, DomBridge, Element, Event, Handler, ReadyState, ReadyWait};
use crate::error::{BridgeError, BridgeResult};
use crate::js::Handle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attr(String, Option<String>),
    Tag(String),
}

impl Simple {
    fn parse(s: &str) -> Option<Simple> {
        if let Some(id) = s.strip_prefix('#') {
            return (!id.is_empty()).then(|| Simple::Id(id.to_string()));
        }
        if let Some(class) = s.strip_prefix('.') {
            return (!class.is_empty()).then(|| Simple::Class(class.to_string()));
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return match inner.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                    Some(Simple::Attr(name.trim().to_string(), Some(value.to_string())))
                }
                None if !inner.trim().is_empty() => Some(Simple::Attr(inner.trim().to_string(), None)),
                None => None,
            };
        }
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Some(Simple::Tag(s.to_ascii_lowercase()));
        }
        None
    }

    fn matches(&self, el: &MockElement) -> bool {
        match self {
            Simple::Id(id) => el.id() == *id,
            Simple::Class(class) => el.has_class(class),
            Simple::Attr(name, None) => el.attr(name).is_some(),
            Simple::Attr(name, Some(value)) => el.attr(name).as_deref() == Some(value.as_str()),
            Simple::Tag(tag) => el.tag() == *tag,
        }
    }
}

/// Simple selectors joined by descendant combinators, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector(Vec<Simple>);

impl Selector {
    /// `None` for anything outside the supported subset; such selectors
    /// match nothing.
    fn parse(selector: &str) -> Option<Selector> {
        let parts = split_compounds(selector.trim())
            .into_iter()
            .map(Simple::parse)
            .collect::<Option<Vec<_>>>()?;
        (!parts.is_empty()).then_some(Selector(parts))
    }

    fn matches(&self, el: &MockElement) -> bool {
        let Some((last, ancestors)) = self.0.split_last() else {
            return false;
        };
        if !last.matches(el) {
            return false;
        }
        let mut pending = ancestors.iter().rev();
        let mut want = pending.next();
        let mut current = el.parent();
        while let Some(simple) = want {
            let Some(node) = current else { return false };
            if simple.matches(&node) {
                want = pending.next();
            }
            current = node.parent();
        }
        true
    }
}

/// Splits on whitespace outside `[...]`.
fn split_compounds(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut start) = (0usize, None);
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(from) = start.take() {
                    parts.push(&s[from..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(from) = start {
        parts.push(&s[from..]);
    }
    parts
}

struct Listener {
    id: u64,
    kind: String,
    handler: Handler,
}

#[derive(Default)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Weak<RefCell<Node>>,
    children: Vec<MockElement>,
    listeners: Vec<Listener>,
    next_listener: u64,
    slots: BTreeMap<String, Handle>,
}

/// Element in the synthetic tree. Clones share the same node.
#[derive(Clone)]
pub struct MockElement(Rc<RefCell<Node>>);

impl MockElement {
    pub fn new(tag: &str) -> Self {
        MockElement(Rc::new(RefCell::new(Node {
            tag: tag.to_ascii_lowercase(),
            ..Node::default()
        })))
    }

    pub fn with_id(self, id: &str) -> Self {
        self.set_attr("id", id);
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> String {
        self.0.borrow().attrs.get("id").cloned().unwrap_or_default()
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        let node = self.0.borrow();
        if name == "class" {
            return (!node.classes.is_empty()).then(|| node.classes.join(" "));
        }
        node.attrs.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        let mut node = self.0.borrow_mut();
        if name == "class" {
            node.classes = value.split_whitespace().map(str::to_string).collect();
        } else {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&self, name: &str) {
        let mut node = self.0.borrow_mut();
        if name == "class" {
            node.classes.clear();
        } else {
            node.attrs.remove(name);
        }
    }

    pub fn add_class(&self, class: &str) {
        let mut node = self.0.borrow_mut();
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&self, class: &str) {
        self.0.borrow_mut().classes.retain(|c| c != class);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == class)
    }

    /// Returns whether the class is present afterwards.
    pub fn toggle_class(&self, class: &str) -> bool {
        if self.has_class(class) {
            self.remove_class(class);
            false
        } else {
            self.add_class(class);
            true
        }
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.borrow().classes.clone()
    }

    pub fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    pub fn set_text(&self, text: &str) {
        self.0.borrow_mut().text = text.to_string();
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0.borrow().style.get(property).cloned()
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.0
            .borrow_mut()
            .style
            .insert(property.to_string(), value.to_string());
    }

    pub fn parent(&self) -> Option<MockElement> {
        self.0.borrow().parent.upgrade().map(MockElement)
    }

    pub fn children(&self) -> Vec<MockElement> {
        self.0.borrow().children.clone()
    }

    /// Moves `child` under this element, detaching it from any previous parent.
    pub fn append_child(&self, child: &MockElement) {
        if let Some(old) = child.parent() {
            old.remove_child(child);
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
    }

    pub fn remove_child(&self, child: &MockElement) -> bool {
        let mut node = self.0.borrow_mut();
        let before = node.children.len();
        node.children.retain(|c| !c.ptr_eq(child));
        let removed = node.children.len() != before;
        drop(node);
        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    pub fn matches(&self, selector: &str) -> bool {
        Selector::parse(selector).is_some_and(|s| s.matches(self))
    }

    pub fn closest(&self, selector: &str) -> Option<MockElement> {
        let selector = Selector::parse(selector)?;
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if selector.matches(&el) {
                return Some(el);
            }
            current = el.parent();
        }
        None
    }

    /// First descendant in document order.
    pub fn query(&self, selector: &str) -> Option<MockElement> {
        self.query_all(selector).into_iter().next()
    }

    pub fn query_all(&self, selector: &str) -> Vec<MockElement> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for el in self.descendants() {
            if selector.matches(&el) {
                found.push(el);
            }
        }
        found
    }

    fn descendants(&self) -> Vec<MockElement> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }

    /// Property stored on the element object, e.g. a component instance.
    pub fn slot(&self, key: &str) -> Option<Handle> {
        self.0.borrow().slots.get(key).cloned()
    }

    pub fn set_slot(&self, key: &str, value: Handle) {
        self.0.borrow_mut().slots.insert(key.to_string(), value);
    }

    pub fn remove_slot(&self, key: &str) {
        self.0.borrow_mut().slots.remove(key);
    }

    pub fn add_listener(&self, kind: &str, handler: Handler) -> u64 {
        let mut node = self.0.borrow_mut();
        node.next_listener += 1;
        let id = node.next_listener;
        node.listeners.push(Listener {
            id,
            kind: kind.to_string(),
            handler,
        });
        id
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        let mut node = self.0.borrow_mut();
        let before = node.listeners.len();
        node.listeners.retain(|l| l.id != id);
        node.listeners.len() != before
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.0.borrow().listeners.iter().filter(|l| l.kind == kind).count()
    }

    /// Delivers `event` here and then to each ancestor while it bubbles.
    /// Returns `false` if a listener prevented the default action.
    pub fn dispatch(&self, event: &MockEvent) -> bool {
        event.set_target(self);
        let kind = event.kind();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            event.set_current_target(Some(&node));
            let handlers: Vec<Handler> = node
                .0
                .borrow()
                .listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| l.handler.clone())
                .collect();
            let wrapped = Event::Mock(event.clone());
            for handler in handlers {
                handler(&wrapped);
            }
            if event.propagation_stopped() || !event.bubbles() {
                break;
            }
            current = node.parent();
        }
        event.set_current_target(None);
        !event.default_prevented()
    }

    /// Dispatches a bubbling, cancelable event carrying `data`.
    pub fn dispatch_event(&self, kind: &str, data: BTreeMap<String, Value>) -> bool {
        self.dispatch(&MockEvent::new(kind, true, true).with_data(data))
    }

    pub fn click(&self) -> bool {
        self.dispatch(&MockEvent::new("click", true, true))
    }

    pub fn focus(&self) -> bool {
        self.dispatch(&MockEvent::new("focus", false, false))
    }

    pub fn blur(&self) -> bool {
        self.dispatch(&MockEvent::new("blur", false, false))
    }

    pub fn mouse_enter(&self) -> bool {
        self.dispatch(&MockEvent::new("mouseenter", false, false))
    }

    pub fn mouse_leave(&self) -> bool {
        self.dispatch(&MockEvent::new("mouseleave", false, false))
    }

    /// The element as a value whose properties are its slots.
    pub fn to_value(&self) -> MockValue {
        MockValue::element(self.clone())
    }

    pub fn ptr_eq(&self, other: &MockElement) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MockElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        write!(f, "<{}", node.tag)?;
        if let Some(id) = node.attrs.get("id") {
            write!(f, " id={id:?}")?;
        }
        if !node.classes.is_empty() {
            write!(f, " class={:?}", node.classes.join(" "))?;
        }
        write!(f, ">")
    }
}

#[derive(Default)]
struct EventState {
    kind: String,
    bubbles: bool,
    cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
    target: Option<MockElement>,
    current_target: Option<MockElement>,
    data: BTreeMap<String, Value>,
}

/// Synthetic event. Clones share state, so a listener's
/// `prevent_default` is visible to the dispatcher.
#[derive(Clone)]
pub struct MockEvent(Rc<RefCell<EventState>>);

impl MockEvent {
    pub fn new(kind: &str, bubbles: bool, cancelable: bool) -> Self {
        MockEvent(Rc::new(RefCell::new(EventState {
            kind: kind.to_string(),
            bubbles,
            cancelable,
            ..EventState::default()
        })))
    }

    pub fn with_data(self, data: BTreeMap<String, Value>) -> Self {
        self.0.borrow_mut().data = data;
        self
    }

    pub fn kind(&self) -> String {
        self.0.borrow().kind.clone()
    }

    pub fn target(&self) -> Option<MockElement> {
        self.0.borrow().target.clone()
    }

    pub fn current_target(&self) -> Option<MockElement> {
        self.0.borrow().current_target.clone()
    }

    fn set_target(&self, el: &MockElement) {
        self.0.borrow_mut().target = Some(el.clone());
    }

    fn set_current_target(&self, el: Option<&MockElement>) {
        self.0.borrow_mut().current_target = el.cloned();
    }

    /// No effect on non-cancelable events.
    pub fn prevent_default(&self) {
        let mut state = self.0.borrow_mut();
        if state.cancelable {
            state.default_prevented = true;
        }
    }

    pub fn stop_propagation(&self) {
        self.0.borrow_mut().propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.0.borrow().default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.0.borrow().propagation_stopped
    }

    pub fn bubbles(&self) -> bool {
        self.0.borrow().bubbles
    }

    pub fn data(&self, key: &str) -> Option<Value> {
        self.0.borrow().data.get(key).cloned()
    }
}

impl fmt::Debug for MockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("MockEvent")
            .field("kind", &state.kind)
            .field("default_prevented", &state.default_prevented)
            .field("propagation_stopped", &state.propagation_stopped)
            .finish()
    }
}

struct DomState {
    elements: Vec<MockElement>,
    ready_state: ReadyState,
    ready_callbacks: Vec<(u64, Box<dyn FnOnce()>)>,
    next_wait: u64,
    document_listeners: Vec<(String, Handler)>,
    window_listeners: Vec<(String, Handler)>,
    window_events: Vec<String>,
    registrations: HashMap<(String, String), Vec<(MockElement, u64)>>,
}

/// Synthetic document. Clones share the same page.
#[derive(Clone)]
pub struct MockDom(Rc<RefCell<DomState>>);

impl Default for MockDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDom {
    /// A document that has finished loading.
    pub fn new() -> Self {
        Self::with_state(ReadyState::Complete)
    }

    /// A document still in the `loading` state; see [`MockDom::set_ready`].
    pub fn loading() -> Self {
        Self::with_state(ReadyState::Loading)
    }

    fn with_state(ready_state: ReadyState) -> Self {
        MockDom(Rc::new(RefCell::new(DomState {
            elements: Vec::new(),
            ready_state,
            ready_callbacks: Vec::new(),
            next_wait: 0,
            document_listeners: Vec::new(),
            window_listeners: Vec::new(),
            window_events: Vec::new(),
            registrations: HashMap::new(),
        })))
    }

    /// Registers `el` and its subtree with the document.
    pub fn add(&self, el: &MockElement) {
        let mut state = self.0.borrow_mut();
        for node in std::iter::once(el.clone()).chain(el.descendants()) {
            if !state.elements.iter().any(|e| e.ptr_eq(&node)) {
                state.elements.push(node);
            }
        }
    }

    /// Appends `child` under `parent` and registers it.
    pub fn add_child(&self, parent: &MockElement, child: &MockElement) {
        parent.append_child(child);
        self.add(child);
    }

    /// Creates and registers a detached element.
    pub fn create_element(&self, tag: &str) -> MockElement {
        let el = MockElement::new(tag);
        self.add(&el);
        el
    }

    /// Unregisters `el` and its subtree and detaches it from its parent.
    pub fn remove(&self, el: &MockElement) {
        if let Some(parent) = el.parent() {
            parent.remove_child(el);
        }
        let doomed: Vec<MockElement> = std::iter::once(el.clone()).chain(el.descendants()).collect();
        self.0
            .borrow_mut()
            .elements
            .retain(|e| !doomed.iter().any(|d| d.ptr_eq(e)));
    }

    /// Registered elements in insertion order.
    pub fn elements(&self) -> Vec<MockElement> {
        self.0.borrow().elements.clone()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.0.borrow().ready_state
    }

    pub fn set_loading(&self) {
        self.0.borrow_mut().ready_state = ReadyState::Loading;
    }

    /// Leaves the `loading` state: queued ready callbacks run once, in
    /// registration order, followed by `DOMContentLoaded` listeners.
    pub fn set_ready(&self) {
        let callbacks = {
            let mut state = self.0.borrow_mut();
            if state.ready_state.is_ready() {
                return;
            }
            state.ready_state = ReadyState::Interactive;
            std::mem::take(&mut state.ready_callbacks)
        };
        for (_, callback) in callbacks {
            callback();
        }
        self.fire_document_event("DOMContentLoaded");
    }

    pub fn pending_ready_callbacks(&self) -> usize {
        self.0.borrow().ready_callbacks.len()
    }

    fn cancel_ready(&self, id: u64) {
        self.0.borrow_mut().ready_callbacks.retain(|(i, _)| *i != id);
    }

    pub fn add_document_listener(&self, kind: &str, handler: Handler) {
        self.0
            .borrow_mut()
            .document_listeners
            .push((kind.to_string(), handler));
    }

    pub fn fire_document_event(&self, kind: &str) {
        let handlers = matching(&self.0.borrow().document_listeners, kind);
        let event = Event::Mock(MockEvent::new(kind, false, false));
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn add_window_listener(&self, kind: &str, handler: Handler) {
        self.0
            .borrow_mut()
            .window_listeners
            .push((kind.to_string(), handler));
    }

    /// Names of every event dispatched on the window, in order.
    pub fn window_events(&self) -> Vec<String> {
        self.0.borrow().window_events.clone()
    }
}

fn matching(listeners: &[(String, Handler)], kind: &str) -> Vec<Handler> {
    listeners
        .iter()
        .filter(|(k, _)| k == kind)
        .map(|(_, h)| h.clone())
        .collect()
}

impl fmt::Debug for MockDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("MockDom")
            .field("elements", &state.elements.len())
            .field("ready_state", &state.ready_state)
            .finish()
    }
}

impl DomBridge for MockDom {
    fn query_all(&self, selector: &str) -> Vec<Element> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.elements()
            .into_iter()
            .filter(|el| selector.matches(el))
            .map(Element::Mock)
            .collect()
    }

    fn by_id(&self, id: &str) -> Option<Element> {
        self.elements()
            .into_iter()
            .find(|el| el.id() == id)
            .map(Element::Mock)
    }

    fn document(&self) -> Document {
        Document::Mock(self.clone())
    }

    fn add_listener(&self, selector: &str, kind: &str, handler: Handler) -> BridgeResult<usize> {
        let elements = self.query_all(selector);
        if elements.is_empty() {
            return Err(BridgeError::NoMatchingElements(selector.to_string()));
        }

        let mut added = Vec::with_capacity(elements.len());
        for element in elements {
            if let Element::Mock(el) = element {
                let id = el.add_listener(kind, handler.clone());
                added.push((el, id));
            }
        }
        let count = added.len();
        self.0
            .borrow_mut()
            .registrations
            .entry((selector.to_string(), kind.to_string()))
            .or_default()
            .extend(added);
        Ok(count)
    }

    fn remove_listener(&self, selector: &str, kind: &str) -> BridgeResult<usize> {
        let removed = self
            .0
            .borrow_mut()
            .registrations
            .remove(&(selector.to_string(), kind.to_string()))
            .unwrap_or_default();
        for (el, id) in &removed {
            el.remove_listener(*id);
        }
        Ok(removed.len())
    }

    fn await_ready(&self, callback: Box<dyn FnOnce()>) -> ReadyWait {
        let id = {
            let mut state = self.0.borrow_mut();
            if !state.ready_state.is_ready() {
                state.next_wait += 1;
                let id = state.next_wait;
                state.ready_callbacks.push((id, callback));
                Some(id)
            } else {
                drop(state);
                callback();
                None
            }
        };
        match id {
            Some(id) => {
                let dom = self.clone();
                ReadyWait::pending(move || dom.cancel_ready(id))
            }
            None => ReadyWait::fired(),
        }
    }

    fn dispatch_window_event(&self, name: &str) -> BridgeResult<()> {
        let handlers = {
            let mut state = self.0.borrow_mut();
            state.window_events.push(name.to_string());
            matching(&state.window_listeners, name)
        };
        let event = Event::Mock(MockEvent::new(name, false, false));
        for handler in handlers {
            handler(&event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn page() -> (MockDom, MockElement, MockElement) {
        let dom = MockDom::new();
        let outer = MockElement::new("div").with_id("outer").with_class("alert");
        let button = MockElement::new("button")
            .with_id("close")
            .with_class("alert-close")
            .with_attr("data-kind", "close");
        outer.append_child(&button);
        dom.add(&outer);
        (dom, outer, button)
    }

    #[test]
    fn test_selectors() {
        let (dom, _, _) = page();
        assert_eq!(dom.query_all("#close").len(), 1);
        assert_eq!(dom.query_all(".alert").len(), 1);
        assert_eq!(dom.query_all("[data-kind]").len(), 1);
        assert_eq!(dom.query_all("[data-kind=close]").len(), 1);
        assert_eq!(dom.query_all("[data-kind=\"close\"]").len(), 1);
        assert_eq!(dom.query_all("[data-kind=open]").len(), 0);
        assert_eq!(dom.query_all("BUTTON").len(), 1);
    }

    #[test]
    fn test_empty_selector_matches_nothing() {
        let (dom, _, _) = page();
        assert!(dom.query_all("").is_empty());
        assert!(dom.query_all("div > button").is_empty());
    }

    #[test]
    fn test_descendant_combinator() {
        let (dom, outer, button) = page();
        let icon = MockElement::new("span").with_attr("data-dismiss", "alert");
        dom.add_child(&button, &icon);
        dom.add(&MockElement::new("span").with_attr("data-dismiss", "alert"));

        assert_eq!(dom.query_all(".alert [data-dismiss='alert']").len(), 1);
        assert_eq!(dom.query_all("div button span").len(), 1);
        assert_eq!(dom.query_all("  .alert   button ").len(), 1);
        assert!(dom.query_all(".modal button").is_empty());
        assert!(dom.query_all("button .alert").is_empty());
        assert!(icon.matches("#outer span"));
        assert_eq!(outer.query_all(".alert-close span").len(), 1);
        assert!(icon.closest(".alert button").is_some_and(|el| el.ptr_eq(&button)));
    }

    #[test]
    fn test_closest_includes_self() {
        let (_, outer, button) = page();
        assert!(button.closest(".alert").is_some_and(|el| el.ptr_eq(&outer)));
        assert!(outer.closest(".alert").is_some_and(|el| el.ptr_eq(&outer)));
        assert!(button.closest(".modal").is_none());
    }

    #[test]
    fn test_class_attr_stays_in_sync() {
        let el = MockElement::new("div").with_attr("class", "a b");
        assert!(el.has_class("b"));
        el.add_class("c");
        assert_eq!(el.attr("class").as_deref(), Some("a b c"));
        assert!(!el.toggle_class("a"));
        assert_eq!(el.classes(), vec!["b", "c"]);
    }

    #[test]
    fn test_dispatch_bubbles_past_prevent_default() {
        let (_, outer, button) = page();
        let seen = Rc::new(Cell::new(0));

        button.add_listener("click", Rc::new(|e: &Event| e.prevent_default()));
        let s = seen.clone();
        outer.add_listener("click", Rc::new(move |_: &Event| s.set(s.get() + 1)));

        assert!(!button.click());
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_stop_propagation_halts_bubbling_only() {
        let (_, outer, button) = page();
        let seen = Rc::new(Cell::new(0));

        button.add_listener("click", Rc::new(|e: &Event| e.stop_propagation()));
        let s = seen.clone();
        button.add_listener("click", Rc::new(move |_: &Event| s.set(s.get() + 1)));
        let s = seen.clone();
        outer.add_listener("click", Rc::new(move |_: &Event| s.set(s.get() + 10)));

        assert!(button.click());
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_current_target_tracks_listener_node() {
        let (_, outer, button) = page();
        let hit = Rc::new(RefCell::new(None));
        let h = hit.clone();
        outer.add_listener(
            "click",
            Rc::new(move |e: &Event| {
                *h.borrow_mut() = e.current_target().map(|el| el.id());
            }),
        );
        button.click();
        assert_eq!(hit.borrow().as_deref(), Some("outer"));
    }

    #[test]
    fn test_focus_does_not_bubble() {
        let (_, outer, button) = page();
        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        outer.add_listener("focus", Rc::new(move |_: &Event| s.set(true)));
        button.focus();
        assert!(!seen.get());
    }

    #[test]
    fn test_ready_callbacks_run_once_in_order() {
        let dom = MockDom::loading();
        let order = Rc::new(RefCell::new(Vec::new()));
        let waits: Vec<ReadyWait> = (0..3)
            .map(|i| {
                let o = order.clone();
                dom.await_ready(Box::new(move || o.borrow_mut().push(i)))
            })
            .collect();
        assert!(order.borrow().is_empty());

        dom.set_ready();
        dom.set_ready();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(waits);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dropped_ready_wait_is_cancelled() {
        let dom = MockDom::loading();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        drop(dom.await_ready(Box::new(move || f.set(true))));
        assert_eq!(dom.pending_ready_callbacks(), 0);
        dom.set_ready();
        assert!(!fired.get());
    }

    #[test]
    fn test_cancelled_ready_wait_never_fires() {
        let dom = MockDom::loading();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let wait = dom.await_ready(Box::new(move || f.set(true)));
        wait.cancel();
        dom.set_ready();
        assert!(!fired.get());
        assert_eq!(dom.pending_ready_callbacks(), 0);
    }

    #[test]
    fn test_ready_document_runs_callback_synchronously() {
        let dom = MockDom::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        dom.await_ready(Box::new(move || f.set(true)));
        assert!(fired.get());
    }

    #[test]
    fn test_listener_removal() {
        let (dom, _, button) = page();
        assert_eq!(dom.add_listener(".alert-close", "click", Rc::new(|_: &Event| {})).unwrap(), 1);
        assert_eq!(button.listener_count("click"), 1);
        assert_eq!(dom.remove_listener(".alert-close", "click").unwrap(), 1);
        assert_eq!(button.listener_count("click"), 0);
        assert!(matches!(
            dom.add_listener(".missing", "click", Rc::new(|_: &Event| {})),
            Err(BridgeError::NoMatchingElements(_))
        ));
    }

    #[test]
    fn test_window_events_are_logged() {
        let dom = MockDom::new();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        dom.add_window_listener("wasmReady", Rc::new(move |_: &Event| s.set(s.get() + 1)));
        dom.dispatch_window_event("wasmReady").unwrap();
        assert_eq!(dom.window_events(), vec!["wasmReady"]);
        assert_eq!(seen.get(), 1);
    }
}
