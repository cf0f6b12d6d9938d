//! Bridge manager
//!
//! [`Manager`] bundles the value, DOM, component and timer backends behind
//! one facade. A single manager per page is installed into a thread-local
//! slot; everything that runs after installation reaches it through
//! [`current`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::catalog::ComponentKind;
use crate::component::{ComponentBridge, Options};
use crate::dom::{DomBridge, Element, Event, ReadyWait};
use crate::error::{BridgeError, BridgeResult};
use crate::js::{Handle, JsBridge};
use crate::scheduler::Scheduler;

struct Inner {
    js: Rc<dyn JsBridge>,
    dom: Rc<dyn DomBridge>,
    components: Rc<dyn ComponentBridge>,
    scheduler: Rc<dyn Scheduler>,
    ready_published: Cell<bool>,
}

/// Cheap to clone; clones share backends.
#[derive(Clone)]
pub struct Manager {
    inner: Rc<Inner>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("ready_published", &self.inner.ready_published.get())
            .finish_non_exhaustive()
    }
}

impl Manager {
    pub fn new(
        js: Rc<dyn JsBridge>,
        dom: Rc<dyn DomBridge>,
        components: Rc<dyn ComponentBridge>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Manager {
            inner: Rc::new(Inner {
                js,
                dom,
                components,
                scheduler,
                ready_published: Cell::new(false),
            }),
        }
    }

    /// Manager over the live page. Fails with [`BridgeError::Unsupported`]
    /// outside a browser.
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> BridgeResult<Self> {
        use crate::component::FlyonBridge;
        use crate::dom::BrowserDom;
        use crate::js::BrowserJs;
        use crate::scheduler::BrowserScheduler;

        let js: Rc<dyn JsBridge> = Rc::new(BrowserJs::new());
        let dom: Rc<dyn DomBridge> = Rc::new(BrowserDom::new()?);
        let components = Rc::new(FlyonBridge::new(js.clone(), dom.clone()));
        let scheduler = Rc::new(BrowserScheduler::new()?);
        Ok(Self::new(js, dom, components, scheduler))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn browser() -> BridgeResult<Self> {
        Err(BridgeError::Unsupported)
    }

    pub fn js(&self) -> &Rc<dyn JsBridge> {
        &self.inner.js
    }

    pub fn dom(&self) -> &Rc<dyn DomBridge> {
        &self.inner.dom
    }

    pub fn components(&self) -> &Rc<dyn ComponentBridge> {
        &self.inner.components
    }

    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// Copies `items` into a new JS array.
    pub fn to_external_array<S: AsRef<str>>(&self, items: &[S]) -> BridgeResult<Handle> {
        let js = &self.inner.js;
        let array = js.new_array(items.len());
        for (i, item) in items.iter().enumerate() {
            array.set_index(i, &js.of(&Value::from(item.as_ref())))?;
        }
        Ok(array)
    }

    /// Copies `map` into a new plain JS object.
    pub fn to_external_object(&self, map: &Options) -> Handle {
        self.inner.js.of(&Value::Object(map.clone()))
    }

    /// Bulk-initialises `kinds`; an empty list means the whole catalog.
    pub fn initialise_all(&self, kinds: &[ComponentKind]) -> BridgeResult<()> {
        if kinds.is_empty() {
            return self.inner.components.initialise_all(&ComponentKind::ALL);
        }
        self.inner.components.initialise_all(kinds)
    }

    pub fn initialise(&self, kind: ComponentKind, selector: &str, options: Option<&Options>) -> BridgeResult<usize> {
        self.inner.components.initialise(kind, selector, options)
    }

    /// Like [`Manager::initialise`], with the kind given by its symbol.
    pub fn initialise_kind(&self, symbol: &str, selector: &str, options: Option<&Options>) -> BridgeResult<usize> {
        self.initialise(symbol.parse()?, selector, options)
    }

    pub fn destroy(&self, selector: &str, kind: ComponentKind) -> BridgeResult<usize> {
        self.inner.components.destroy(selector, kind)
    }

    pub fn get_instance(&self, selector: &str, kind: ComponentKind) -> BridgeResult<Handle> {
        self.inner.components.get_instance(selector, kind)
    }

    pub fn add_listener(&self, selector: &str, kind: &str, handler: impl Fn(&Event) + 'static) -> BridgeResult<usize> {
        self.inner.dom.add_listener(selector, kind, Rc::new(handler))
    }

    pub fn remove_listener(&self, selector: &str, kind: &str) -> BridgeResult<usize> {
        self.inner.dom.remove_listener(selector, kind)
    }

    pub fn await_ready(&self, callback: impl FnOnce() + 'static) -> ReadyWait {
        self.inner.dom.await_ready(Box::new(callback))
    }

    pub fn query_all(&self, selector: &str) -> Vec<Element> {
        self.inner.dom.query_all(selector)
    }

    pub fn by_id(&self, id: &str) -> Option<Element> {
        self.inner.dom.by_id(id)
    }

    /// Claims the one-shot ready signal. Only the first call returns `true`.
    pub(crate) fn claim_ready_signal(&self) -> bool {
        !self.inner.ready_published.replace(true)
    }

    pub fn ready_published(&self) -> bool {
        self.inner.ready_published.get()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Manager>> = const { RefCell::new(None) };
}

/// Makes `manager` the page-wide instance. A second install fails with
/// [`BridgeError::AlreadyInstalled`].
pub fn install(manager: Manager) -> BridgeResult<()> {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(BridgeError::AlreadyInstalled);
        }
        *slot = Some(manager);
        Ok(())
    })
}

/// The installed manager.
pub fn current() -> BridgeResult<Manager> {
    CURRENT.with(|slot| slot.borrow().clone().ok_or(BridgeError::NotInstalled))
}

pub fn is_installed() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// Clears the slot so a test can install a fresh manager.
#[cfg(any(test, feature = "testing"))]
pub fn reset() {
    CURRENT.with(|slot| slot.borrow_mut().take());
}
