//! FlyonUI component bridge
//!
//! All access to the external component library funnels through here.
//! Leaf failures (raw invocation errors) are logged and surfaced as
//! `LibraryUnavailable` / `NoMatchingElements` so callers never see a bare
//! JS exception.

use std::rc::Rc;

use serde_json::Value;

use crate::catalog::ComponentKind;
use crate::dom::DomBridge;
use crate::error::{BridgeError, BridgeResult};
use crate::js::{Handle, JsBridge};

/// Options passed to a component constructor.
pub type Options = serde_json::Map<String, Value>;

/// Global holding the library's static helpers.
pub const STATIC_METHODS: &str = "HSStaticMethods";
/// Bulk initialisation entry point on [`STATIC_METHODS`].
pub const AUTO_INIT: &str = "autoInit";

pub trait ComponentBridge {
    /// Calls `HSStaticMethods.autoInit(kinds)` with exactly the given list.
    fn initialise_all(&self, kinds: &[ComponentKind]) -> BridgeResult<()>;

    /// Constructs `kind` on every element matching `selector`. Elements that
    /// already carry an instance of `kind` are left untouched.
    /// Returns the number of instances created. If any construction fails,
    /// the instances this call created are destroyed before the error is
    /// returned.
    fn initialise(&self, kind: ComponentKind, selector: &str, options: Option<&Options>) -> BridgeResult<usize>;

    /// Destroys and clears the `kind` instance on every matching element.
    /// Returns the number of instances destroyed.
    fn destroy(&self, selector: &str, kind: ComponentKind) -> BridgeResult<usize>;

    /// Instance stored on the first element matching `selector`.
    fn get_instance(&self, selector: &str, kind: ComponentKind) -> BridgeResult<Handle>;
}

/// Component bridge that drives the real library through the value and
/// DOM abstractions.
pub struct FlyonBridge {
    js: Rc<dyn JsBridge>,
    dom: Rc<dyn DomBridge>,
}

impl FlyonBridge {
    pub fn new(js: Rc<dyn JsBridge>, dom: Rc<dyn DomBridge>) -> Self {
        FlyonBridge { js, dom }
    }

    fn options_object(&self, options: Option<&Options>) -> Handle {
        match options {
            Some(options) => self.js.of(&Value::Object(options.clone())),
            None => self.js.new_object(),
        }
    }
}

fn construct_on(kind: ComponentKind, class: &Handle, target: &Handle, options: &Handle, key: &str) -> BridgeResult<()> {
    let instance = class.construct(&[target.clone(), options.clone()]).map_err(|e| {
        console_error!("{} constructor failed: {}", kind, e);
        BridgeError::LibraryUnavailable(format!("{kind} constructor failed: {e}"))
    })?;
    target
        .set(key, &instance)
        .map_err(|e| BridgeError::LibraryUnavailable(format!("cannot store {kind} instance: {e}")))
}

/// Calls `destroy()` on the stored instance, if any, and clears the slot.
/// Returns whether there was an instance.
fn release(kind: ComponentKind, target: &Handle, key: &str) -> BridgeResult<bool> {
    let instance = target.get(key);
    if instance.is_undefined() {
        return Ok(false);
    }
    if instance.get("destroy").is_callable() {
        if let Err(e) = instance.call("destroy", &[]) {
            console_warn!("{}.destroy() failed: {}", kind, e);
        }
    }
    target.remove(key)?;
    Ok(true)
}

impl std::fmt::Debug for FlyonBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlyonBridge").finish_non_exhaustive()
    }
}

impl ComponentBridge for FlyonBridge {
    fn initialise_all(&self, kinds: &[ComponentKind]) -> BridgeResult<()> {
        console_log!("Initializing FlyonUI components: {:?}", ComponentKind::symbols(kinds));

        let statics = self.js.global(STATIC_METHODS);
        if statics.is_undefined() {
            console_warn!("Warning: {} not available, FlyonUI JS may not be loaded", STATIC_METHODS);
            return Err(BridgeError::LibraryUnavailable(format!("{STATIC_METHODS} not available")));
        }
        if !statics.get(AUTO_INIT).is_callable() {
            console_warn!("Warning: {}.{} not available", STATIC_METHODS, AUTO_INIT);
            return Err(BridgeError::LibraryUnavailable(format!(
                "{STATIC_METHODS}.{AUTO_INIT} not available"
            )));
        }

        let array = self.js.new_array(kinds.len());
        for (i, kind) in kinds.iter().enumerate() {
            array.set_index(i, &self.js.of(&Value::from(kind.symbol())))?;
        }

        statics.call(AUTO_INIT, &[array]).map_err(|e| {
            console_error!("Error initializing components: {}", e);
            BridgeError::LibraryUnavailable(format!("{AUTO_INIT} failed: {e}"))
        })?;

        console_log!("FlyonUI components initialized successfully");
        Ok(())
    }

    fn initialise(&self, kind: ComponentKind, selector: &str, options: Option<&Options>) -> BridgeResult<usize> {
        console_log!("Initializing {} component with selector: {}", kind, selector);

        let class = self.js.global(kind.symbol());
        if !class.is_callable() {
            console_warn!("Warning: {} not available, component may not be interactive", kind);
            return Err(BridgeError::LibraryUnavailable(format!("{kind} not available")));
        }

        let elements = self.dom.query_all(selector);
        if elements.is_empty() {
            console_warn!("Warning: No elements found for selector: {}", selector);
            return Err(BridgeError::NoMatchingElements(selector.to_string()));
        }

        let options = self.options_object(options);
        let key = kind.instance_key();
        let mut created: Vec<Handle> = Vec::new();
        for element in &elements {
            let target = element.underlying();
            if !target.get(&key).is_undefined() {
                continue;
            }
            if let Err(e) = construct_on(kind, &class, &target, &options, &key) {
                for target in &created {
                    if let Err(e) = release(kind, target, &key) {
                        console_warn!("Could not roll back {} instance: {}", kind, e);
                    }
                }
                return Err(e);
            }
            created.push(target);
        }

        console_log!(
            "{} component initialized for {} of {} elements",
            kind,
            created.len(),
            elements.len()
        );
        Ok(created.len())
    }

    fn destroy(&self, selector: &str, kind: ComponentKind) -> BridgeResult<usize> {
        console_log!("Destroying {} component with selector: {}", kind, selector);

        let elements = self.dom.query_all(selector);
        if elements.is_empty() {
            return Err(BridgeError::NoMatchingElements(selector.to_string()));
        }

        let key = kind.instance_key();
        let mut destroyed = 0;
        for element in &elements {
            if release(kind, &element.underlying(), &key)? {
                destroyed += 1;
            }
        }

        console_log!("{} component destroyed on {} elements", kind, destroyed);
        Ok(destroyed)
    }

    fn get_instance(&self, selector: &str, kind: ComponentKind) -> BridgeResult<Handle> {
        let first = self
            .dom
            .query_all(selector)
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NoMatchingElements(selector.to_string()))?;

        let instance = first.underlying().get(&kind.instance_key());
        if instance.is_undefined() {
            return Err(BridgeError::NoInstance {
                kind: kind.symbol().to_string(),
                selector: selector.to_string(),
            });
        }
        Ok(instance)
    }
}
