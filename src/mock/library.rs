//! Scripted stand-in for the FlyonUI script bundle.
//!
//! Installing it populates a [`MockJs`] with `HSStaticMethods.autoInit` and
//! one constructor per component class, so [`FlyonBridge`] can be exercised
//! end to end without a browser.
//!
//! [`FlyonBridge`]: crate::component::FlyonBridge

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::dom::MockDom;
use super::value::{MockJs, MockValue};
use crate::catalog::ComponentKind;
use crate::component::{AUTO_INIT, STATIC_METHODS};
use crate::dom::DomBridge;
use crate::error::BridgeResult;
use crate::js::Handle;

#[derive(Debug, Default)]
struct Counters {
    constructed: Cell<usize>,
    auto_init_calls: RefCell<Vec<Vec<String>>>,
}

/// Handle to an installed mock library.
#[derive(Debug, Clone)]
pub struct MockLibrary {
    counters: Rc<Counters>,
    classes: BTreeMap<ComponentKind, MockValue>,
}

impl MockLibrary {
    /// Installs every component class plus `HSStaticMethods`.
    pub fn install(js: &MockJs, dom: &MockDom) -> Self {
        Self::install_only(js, dom, &ComponentKind::ALL)
    }

    /// Installs only the given classes plus `HSStaticMethods`.
    pub fn install_only(js: &MockJs, dom: &MockDom, kinds: &[ComponentKind]) -> Self {
        let counters = Rc::new(Counters::default());
        let classes: BTreeMap<ComponentKind, MockValue> = kinds
            .iter()
            .map(|kind| (*kind, component_class(counters.clone())))
            .collect();

        for (kind, class) in &classes {
            js.set_global(kind.symbol(), class.clone());
        }

        let statics = MockValue::object();
        let auto_init = auto_init(counters.clone(), classes.clone(), dom.clone());
        if let Err(e) = statics.set(AUTO_INIT, Handle::Mock(auto_init)) {
            console_warn!("Could not install {}.{}: {}", STATIC_METHODS, AUTO_INIT, e);
        }
        js.set_global(STATIC_METHODS, statics);

        MockLibrary { counters, classes }
    }

    /// Removes everything `install` put into the global scope.
    pub fn uninstall(&self, js: &MockJs) {
        js.remove_global(STATIC_METHODS);
        for kind in self.classes.keys() {
            js.remove_global(kind.symbol());
        }
    }

    /// Constructor calls across all classes.
    pub fn constructed(&self) -> usize {
        self.counters.constructed.get()
    }

    /// Symbol lists passed to `autoInit`, in call order.
    pub fn auto_init_calls(&self) -> Vec<Vec<String>> {
        self.counters.auto_init_calls.borrow().clone()
    }

    pub fn class(&self, kind: ComponentKind) -> Option<&MockValue> {
        self.classes.get(&kind)
    }
}

/// `new HSX(element, options)`: keeps both arguments and exposes a
/// `destroy()` that flips a `destroyed` flag.
fn component_class(counters: Rc<Counters>) -> MockValue {
    MockValue::function(move |this, args| {
        let arg = |i: usize| {
            args.get(i)
                .cloned()
                .unwrap_or_else(|| Handle::Mock(MockValue::undefined()))
        };
        this.set("element", &arg(0))?;
        this.set("options", &arg(1))?;
        this.set("destroyed", &Handle::Mock(MockValue::bool(false)))?;
        this.set(
            "destroy",
            &Handle::Mock(MockValue::function(|this, _| {
                this.set("destroyed", &Handle::Mock(MockValue::bool(true)))?;
                Ok(Handle::Mock(MockValue::undefined()))
            })),
        )?;
        counters.constructed.set(counters.constructed.get() + 1);
        Ok(this.clone())
    })
}

/// `HSStaticMethods.autoInit(symbols)`: constructs each listed class on the
/// elements matching its default selector, reusing existing instances.
fn auto_init(counters: Rc<Counters>, classes: BTreeMap<ComponentKind, MockValue>, dom: MockDom) -> MockValue {
    MockValue::function(move |_, args| {
        let list = args
            .first()
            .cloned()
            .unwrap_or_else(|| Handle::Mock(MockValue::undefined()));
        let len = list.get("length").as_int().max(0) as usize;
        let symbols: Vec<String> = (0..len).map(|i| list.index(i).as_string()).collect();
        counters.auto_init_calls.borrow_mut().push(symbols.clone());

        for symbol in &symbols {
            let Ok(kind) = symbol.parse::<ComponentKind>() else { continue };
            let Some(class) = classes.get(&kind) else { continue };
            for element in dom.query_all(&kind.default_selector()) {
                construct_once(kind, class, &element.underlying())?;
            }
        }
        Ok(Handle::Mock(MockValue::undefined()))
    })
}

fn construct_once(kind: ComponentKind, class: &MockValue, target: &Handle) -> BridgeResult<()> {
    let key = kind.instance_key();
    if !target.get(&key).is_undefined() {
        return Ok(());
    }
    let instance = class.construct(&[target.clone(), Handle::Mock(MockValue::object())])?;
    target.set(&key, &instance)
}
