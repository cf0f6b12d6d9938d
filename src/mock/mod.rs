//! In-memory backends for every bridge.
//!
//! Nothing here touches a browser, so hydration logic can be exercised with
//! plain `#[test]`s on the host.

mod components;
mod dom;
mod library;
mod scheduler;
mod value;

use std::rc::Rc;

pub use components::MockComponentBridge;
pub use dom::{MockDom, MockElement, MockEvent};
pub use library::MockLibrary;
pub use scheduler::MockScheduler;
pub use value::{CallKind, CallRecord, MockFn, MockJs, MockValue};

use crate::component::FlyonBridge;
use crate::manager::Manager;

/// Every mock backend wired to one page.
#[derive(Debug, Clone)]
pub struct MockBackend {
    pub js: Rc<MockJs>,
    pub dom: MockDom,
    pub components: Rc<MockComponentBridge>,
    pub scheduler: Rc<MockScheduler>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backends over an already loaded document.
    pub fn new() -> Self {
        Self::with_dom(MockDom::new())
    }

    pub fn with_dom(dom: MockDom) -> Self {
        MockBackend {
            js: Rc::new(MockJs::new()),
            components: Rc::new(MockComponentBridge::new(dom.clone())),
            dom,
            scheduler: Rc::new(MockScheduler::new()),
        }
    }

    /// Manager whose component calls go to [`MockComponentBridge`].
    pub fn manager(&self) -> Manager {
        Manager::new(
            self.js.clone(),
            Rc::new(self.dom.clone()),
            self.components.clone(),
            self.scheduler.clone(),
        )
    }

    /// Manager running the real [`FlyonBridge`] over the mock value and DOM
    /// backends; pair it with [`MockBackend::install_library`].
    pub fn flyon_manager(&self) -> Manager {
        let dom = Rc::new(self.dom.clone());
        let components = Rc::new(FlyonBridge::new(self.js.clone(), dom.clone()));
        Manager::new(self.js.clone(), dom, components, self.scheduler.clone())
    }

    pub fn install_library(&self) -> MockLibrary {
        MockLibrary::install(&self.js, &self.dom)
    }
}
