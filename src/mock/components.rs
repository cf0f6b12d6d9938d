//! In-memory component bridge.
//!
//! Instances are the options object stored in an element slot. Calls are
//! recorded and failures can be injected per kind.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::dom::MockDom;
use super::value::MockValue;
use crate::catalog::ComponentKind;
use crate::component::{ComponentBridge, Options};
use crate::dom::{DomBridge, Element};
use crate::error::{BridgeError, BridgeResult};
use crate::js::Handle;

/// Component bridge that never touches a library.
///
/// `initialise` stores the options object itself as the instance, so tests
/// can read options back through `get_instance`. Every call is recorded.
#[derive(Debug)]
pub struct MockComponentBridge {
    dom: MockDom,
    initialise_all_calls: RefCell<Vec<Vec<ComponentKind>>>,
    initialised: RefCell<BTreeMap<ComponentKind, Vec<String>>>,
    destroyed: RefCell<BTreeMap<ComponentKind, Vec<String>>>,
    failures: RefCell<HashMap<ComponentKind, BridgeError>>,
}

impl MockComponentBridge {
    pub fn new(dom: MockDom) -> Self {
        MockComponentBridge {
            dom,
            initialise_all_calls: RefCell::new(Vec::new()),
            initialised: RefCell::new(BTreeMap::new()),
            destroyed: RefCell::new(BTreeMap::new()),
            failures: RefCell::new(HashMap::new()),
        }
    }

    /// Makes every later operation involving `kind` fail with `error`.
    pub fn fail_kind(&self, kind: ComponentKind, error: BridgeError) {
        self.failures.borrow_mut().insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    /// Kind lists passed to `initialise_all`, in call order.
    pub fn initialise_all_calls(&self) -> Vec<Vec<ComponentKind>> {
        self.initialise_all_calls.borrow().clone()
    }

    /// Selectors `kind` was initialised on, in call order.
    pub fn initialised(&self, kind: ComponentKind) -> Vec<String> {
        self.initialised.borrow().get(&kind).cloned().unwrap_or_default()
    }

    pub fn destroyed(&self, kind: ComponentKind) -> Vec<String> {
        self.destroyed.borrow().get(&kind).cloned().unwrap_or_default()
    }

    fn check(&self, kind: ComponentKind) -> BridgeResult<()> {
        match self.failures.borrow().get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn matching(&self, selector: &str) -> BridgeResult<Vec<Element>> {
        let elements = self.dom.query_all(selector);
        if elements.is_empty() {
            return Err(BridgeError::NoMatchingElements(selector.to_string()));
        }
        Ok(elements)
    }
}

impl ComponentBridge for MockComponentBridge {
    fn initialise_all(&self, kinds: &[ComponentKind]) -> BridgeResult<()> {
        self.initialise_all_calls.borrow_mut().push(kinds.to_vec());
        kinds.iter().try_for_each(|kind| self.check(*kind))
    }

    fn initialise(&self, kind: ComponentKind, selector: &str, options: Option<&Options>) -> BridgeResult<usize> {
        self.check(kind)?;
        let elements = self.matching(selector)?;
        let options = Value::Object(options.cloned().unwrap_or_default());

        let key = kind.instance_key();
        let mut created = 0;
        for element in &elements {
            let target = element.underlying();
            if target.get(&key).is_undefined() {
                target.set(&key, &Handle::Mock(MockValue::from_json(&options)))?;
                created += 1;
            }
        }
        self.initialised
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(selector.to_string());
        Ok(created)
    }

    fn destroy(&self, selector: &str, kind: ComponentKind) -> BridgeResult<usize> {
        self.check(kind)?;
        let elements = self.matching(selector)?;

        let key = kind.instance_key();
        let mut destroyed = 0;
        for element in &elements {
            let target = element.underlying();
            if !target.get(&key).is_undefined() {
                target.remove(&key)?;
                destroyed += 1;
            }
        }
        self.destroyed
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(selector.to_string());
        Ok(destroyed)
    }

    fn get_instance(&self, selector: &str, kind: ComponentKind) -> BridgeResult<Handle> {
        let elements = self.matching(selector)?;
        let instance = elements[0].underlying().get(&kind.instance_key());
        if instance.is_undefined() {
            return Err(BridgeError::NoInstance {
                kind: kind.symbol().to_string(),
                selector: selector.to_string(),
            });
        }
        Ok(instance)
    }
}
