//! DOM abstraction
//!
//! Query, traversal, mutation and event registration over the page
//! document. [`BrowserDom`] talks to `web_sys`; the mock backend lives in
//! [`crate::mock`]. Element, document and event handles are enums over the
//! two backends so page wiring code never needs to know which one it runs on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use crate::error::{BridgeError, BridgeResult};
use crate::js::Handle;
use crate::mock::{MockDom, MockElement, MockEvent};

/// Event callback. The element a listener was attached to is available as
/// [`Event::current_target`], so one handler can serve many elements.
pub type Handler = Rc<dyn Fn(&Event)>;

/// Query and event surface of the page.
pub trait DomBridge {
    fn query_all(&self, selector: &str) -> Vec<Element>;

    fn by_id(&self, id: &str) -> Option<Element>;

    fn document(&self) -> Document;

    /// Attaches `handler` to every element matching `selector`.
    /// Returns the number of elements wired.
    fn add_listener(&self, selector: &str, kind: &str, handler: Handler) -> BridgeResult<usize>;

    /// Detaches every handler previously attached for `(selector, kind)`.
    /// Returns the number of registrations removed.
    fn remove_listener(&self, selector: &str, kind: &str) -> BridgeResult<usize>;

    /// Runs `callback` once the document has left the `loading` state:
    /// synchronously when that already happened, otherwise on
    /// `DOMContentLoaded`. The callback never runs twice.
    fn await_ready(&self, callback: Box<dyn FnOnce()>) -> ReadyWait;

    /// Dispatches a plain event with the given name on the window.
    fn dispatch_window_event(&self, name: &str) -> BridgeResult<()>;
}

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(state: &str) -> Self {
        match state {
            "loading" => ReadyState::Loading,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Complete,
        }
    }

    pub fn is_ready(self) -> bool {
        self != ReadyState::Loading
    }
}

/// Token returned by [`DomBridge::await_ready`].
///
/// Cancelling detaches the pending content-loaded listener so an abandoned
/// wait never fires. Dropping the token cancels, so hold on to it until the
/// callback has run.
pub struct ReadyWait {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl ReadyWait {
    /// A wait that already completed; cancel is a no-op.
    pub fn fired() -> Self {
        ReadyWait { cancel: RefCell::new(None) }
    }

    pub fn pending(cancel: impl FnOnce() + 'static) -> Self {
        ReadyWait { cancel: RefCell::new(Some(Box::new(cancel))) }
    }

    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for ReadyWait {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ReadyWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyWait")
            .field("pending", &self.cancel.borrow().is_some())
            .finish()
    }
}

/// A DOM element by reference.
#[derive(Clone, Debug)]
pub enum Element {
    Browser(web_sys::Element),
    Mock(MockElement),
}

impl Element {
    pub fn id(&self) -> String {
        match self {
            Element::Browser(el) => el.id(),
            Element::Mock(el) => el.id(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        match self {
            Element::Browser(el) => el.get_attribute(name),
            Element::Mock(el) => el.attr(name),
        }
    }

    pub fn set_attr(&self, name: &str, value: &str) -> BridgeResult<()> {
        match self {
            Element::Browser(el) => el.set_attribute(name, value).map_err(BridgeError::from),
            Element::Mock(el) => {
                el.set_attr(name, value);
                Ok(())
            }
        }
    }

    pub fn add_class(&self, class: &str) {
        match self {
            Element::Browser(el) => {
                if let Err(e) = el.class_list().add_1(class) {
                    console_warn!("Failed to add class {}: {:?}", class, e);
                }
            }
            Element::Mock(el) => el.add_class(class),
        }
    }

    pub fn remove_class(&self, class: &str) {
        match self {
            Element::Browser(el) => {
                if let Err(e) = el.class_list().remove_1(class) {
                    console_warn!("Failed to remove class {}: {:?}", class, e);
                }
            }
            Element::Mock(el) => el.remove_class(class),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        match self {
            Element::Browser(el) => el.class_list().contains(class),
            Element::Mock(el) => el.has_class(class),
        }
    }

    /// Flips `class`; returns whether it is present afterwards.
    pub fn toggle_class(&self, class: &str) -> bool {
        if self.has_class(class) {
            self.remove_class(class);
            false
        } else {
            self.add_class(class);
            true
        }
    }

    pub fn parent(&self) -> Option<Element> {
        match self {
            Element::Browser(el) => el.parent_element().map(Element::Browser),
            Element::Mock(el) => el.parent().map(Element::Mock),
        }
    }

    /// Nearest element matching `selector`, starting with this element and
    /// walking up through its ancestors.
    pub fn closest(&self, selector: &str) -> Option<Element> {
        match self {
            Element::Browser(el) => el.closest(selector).ok().flatten().map(Element::Browser),
            Element::Mock(el) => el.closest(selector).map(Element::Mock),
        }
    }

    /// First descendant matching `selector`.
    pub fn query(&self, selector: &str) -> Option<Element> {
        match self {
            Element::Browser(el) => el.query_selector(selector).ok().flatten().map(Element::Browser),
            Element::Mock(el) => el.query(selector).map(Element::Mock),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Element::Browser(el) => el.text_content().unwrap_or_default(),
            Element::Mock(el) => el.text(),
        }
    }

    pub fn set_text(&self, text: &str) {
        match self {
            Element::Browser(el) => el.set_text_content(Some(text)),
            Element::Mock(el) => el.set_text(text),
        }
    }

    /// Sets an inline style property, e.g. `display: none`.
    pub fn set_style(&self, property: &str, value: &str) -> BridgeResult<()> {
        match self {
            Element::Browser(el) => {
                let html = el
                    .dyn_ref::<web_sys::HtmlElement>()
                    .ok_or_else(|| BridgeError::Invocation("element has no inline style".into()))?;
                html.style().set_property(property, value).map_err(BridgeError::from)
            }
            Element::Mock(el) => {
                el.set_style(property, value);
                Ok(())
            }
        }
    }

    /// The element as a JS value, for property-level access.
    pub fn underlying(&self) -> Handle {
        match self {
            Element::Browser(el) => Handle::Browser(JsValue::from(el.clone())),
            Element::Mock(el) => Handle::Mock(el.to_value()),
        }
    }

    pub fn same_as(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Browser(a), Element::Browser(b)) => a == b,
            (Element::Mock(a), Element::Mock(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// The root document.
#[derive(Clone, Debug)]
pub enum Document {
    Browser(web_sys::Document),
    Mock(MockDom),
}

impl Document {
    pub fn ready_state(&self) -> ReadyState {
        match self {
            Document::Browser(doc) => ReadyState::parse(&doc.ready_state()),
            Document::Mock(dom) => dom.ready_state(),
        }
    }

    /// Registers a document-level listener for the lifetime of the page.
    pub fn add_listener(&self, kind: &str, handler: Handler) -> BridgeResult<()> {
        match self {
            Document::Browser(doc) => {
                let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                    handler(&Event::Browser(event));
                });
                doc.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
                closure.forget();
                Ok(())
            }
            Document::Mock(dom) => {
                dom.add_document_listener(kind, handler);
                Ok(())
            }
        }
    }
}

/// A synchronously delivered DOM event.
#[derive(Clone, Debug)]
pub enum Event {
    Browser(web_sys::Event),
    Mock(MockEvent),
}

impl Event {
    pub fn kind(&self) -> String {
        match self {
            Event::Browser(e) => e.type_(),
            Event::Mock(e) => e.kind(),
        }
    }

    /// Element the event was originally dispatched on.
    pub fn target(&self) -> Option<Element> {
        match self {
            Event::Browser(e) => e
                .target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .map(Element::Browser),
            Event::Mock(e) => e.target().map(Element::Mock),
        }
    }

    /// Element whose listener is running.
    pub fn current_target(&self) -> Option<Element> {
        match self {
            Event::Browser(e) => e
                .current_target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .map(Element::Browser),
            Event::Mock(e) => e.current_target().map(Element::Mock),
        }
    }

    pub fn prevent_default(&self) {
        match self {
            Event::Browser(e) => e.prevent_default(),
            Event::Mock(e) => e.prevent_default(),
        }
    }

    pub fn stop_propagation(&self) {
        match self {
            Event::Browser(e) => e.stop_propagation(),
            Event::Mock(e) => e.stop_propagation(),
        }
    }

    pub fn default_prevented(&self) -> bool {
        match self {
            Event::Browser(e) => e.default_prevented(),
            Event::Mock(e) => e.default_prevented(),
        }
    }

    pub fn bubbles(&self) -> bool {
        match self {
            Event::Browser(e) => e.bubbles(),
            Event::Mock(e) => e.bubbles(),
        }
    }

    /// Payload entry attached by a synthetic dispatch. Browser events carry none.
    pub fn data(&self, key: &str) -> Option<serde_json::Value> {
        match self {
            Event::Browser(_) => None,
            Event::Mock(e) => e.data(key),
        }
    }
}

struct Registration {
    element: web_sys::Element,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

/// DOM abstraction over the live browser document.
pub struct BrowserDom {
    window: web_sys::Window,
    document: web_sys::Document,
    // (selector, kind) -> attached closures, kept so they can be removed again
    listeners: RefCell<HashMap<(String, String), Vec<Registration>>>,
}

impl BrowserDom {
    pub fn new() -> BridgeResult<Self> {
        let window = web_sys::window().ok_or(BridgeError::Unsupported)?;
        let document = window.document().ok_or(BridgeError::Unsupported)?;
        Ok(BrowserDom {
            window,
            document,
            listeners: RefCell::new(HashMap::new()),
        })
    }

    pub fn window(&self) -> &web_sys::Window {
        &self.window
    }
}

impl std::fmt::Debug for BrowserDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserDom")
            .field("listener_groups", &self.listeners.borrow().len())
            .finish()
    }
}

impl DomBridge for BrowserDom {
    fn query_all(&self, selector: &str) -> Vec<Element> {
        let nodes = match self.document.query_selector_all(selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                console_warn!("Invalid selector {:?}: {:?}", selector, e);
                return Vec::new();
            }
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
            .map(Element::Browser)
            .collect()
    }

    fn by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id).map(Element::Browser)
    }

    fn document(&self) -> Document {
        Document::Browser(self.document.clone())
    }

    fn add_listener(&self, selector: &str, kind: &str, handler: Handler) -> BridgeResult<usize> {
        let elements = self.query_all(selector);
        if elements.is_empty() {
            return Err(BridgeError::NoMatchingElements(selector.to_string()));
        }

        let mut registrations = Vec::with_capacity(elements.len());
        for element in elements {
            let Element::Browser(element) = element else { continue };
            let handler = handler.clone();
            let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                handler(&Event::Browser(event));
            });
            element.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
            registrations.push(Registration { element, closure });
        }

        let count = registrations.len();
        self.listeners
            .borrow_mut()
            .entry((selector.to_string(), kind.to_string()))
            .or_default()
            .extend(registrations);
        console_log!("Event listener added for {} on {} elements", kind, count);
        Ok(count)
    }

    fn remove_listener(&self, selector: &str, kind: &str) -> BridgeResult<usize> {
        let removed = self
            .listeners
            .borrow_mut()
            .remove(&(selector.to_string(), kind.to_string()))
            .unwrap_or_default();

        for reg in &removed {
            reg.element
                .remove_event_listener_with_callback(kind, reg.closure.as_ref().unchecked_ref())?;
        }
        console_log!("Removed {} {} listeners for {}", removed.len(), kind, selector);
        Ok(removed.len())
    }

    fn await_ready(&self, callback: Box<dyn FnOnce()>) -> ReadyWait {
        if ReadyState::parse(&self.document.ready_state()).is_ready() {
            callback();
            return ReadyWait::fired();
        }

        // `once` listener: the browser detaches it after the first delivery.
        // The token owns the closure and frees it when dropped.
        let closure: Closure<dyn FnMut(web_sys::Event)> = Closure::once(move |_event: web_sys::Event| callback());
        let options = web_sys::AddEventListenerOptions::new();
        options.set_once(true);
        if let Err(e) = self.document.add_event_listener_with_callback_and_add_event_listener_options(
            "DOMContentLoaded",
            closure.as_ref().unchecked_ref(),
            &options,
        ) {
            console_error!("Failed to register DOMContentLoaded listener: {:?}", e);
            return ReadyWait::fired();
        }

        let document = self.document.clone();
        ReadyWait::pending(move || {
            if let Err(e) =
                document.remove_event_listener_with_callback("DOMContentLoaded", closure.as_ref().unchecked_ref())
            {
                console_warn!("Failed to detach DOMContentLoaded listener: {:?}", e);
            }
        })
    }

    fn dispatch_window_event(&self, name: &str) -> BridgeResult<()> {
        let event = web_sys::Event::new(name)?;
        self.window.dispatch_event(&event)?;
        Ok(())
    }
}
