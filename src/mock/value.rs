//! In-memory JS values and globals

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::dom::MockElement;
use crate::error::{BridgeError, BridgeResult};
use crate::js::{Handle, JsBridge};

/// Body of a mock callable: `(this, args) -> result`.
pub type MockFn = Rc<dyn Fn(&Handle, &[Handle]) -> BridgeResult<Handle>>;

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Invoke,
    Construct,
    Call(String),
}

/// One recorded `invoke`, `construct` or `call`.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub kind: CallKind,
    pub args: Vec<Handle>,
}

enum Repr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object,
    Array,
    Function(MockFn),
    Element(MockElement),
}

struct Inner {
    repr: Repr,
    props: RefCell<BTreeMap<String, Handle>>,
    items: RefCell<Vec<Handle>>,
    calls: RefCell<Vec<CallRecord>>,
}

/// Shared, mutable stand-in for a JS value.
#[derive(Clone)]
pub struct MockValue(Rc<Inner>);

impl MockValue {
    fn with_repr(repr: Repr) -> Self {
        MockValue(Rc::new(Inner {
            repr,
            props: RefCell::new(BTreeMap::new()),
            items: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }))
    }

    pub fn undefined() -> Self {
        Self::with_repr(Repr::Undefined)
    }

    pub fn null() -> Self {
        Self::with_repr(Repr::Null)
    }

    pub fn bool(b: bool) -> Self {
        Self::with_repr(Repr::Bool(b))
    }

    pub fn number(n: f64) -> Self {
        Self::with_repr(Repr::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::with_repr(Repr::Str(s.into()))
    }

    pub fn object() -> Self {
        Self::with_repr(Repr::Object)
    }

    /// Array with `len` undefined slots.
    pub fn array(len: usize) -> Self {
        let value = Self::with_repr(Repr::Array);
        value.0.items.borrow_mut().resize_with(len, || Handle::Mock(MockValue::undefined()));
        value
    }

    pub fn function(f: impl Fn(&Handle, &[Handle]) -> BridgeResult<Handle> + 'static) -> Self {
        Self::with_repr(Repr::Function(Rc::new(f)))
    }

    /// Property view over an element's instance slots.
    pub fn element(element: MockElement) -> Self {
        Self::with_repr(Repr::Element(element))
    }

    /// Deep conversion of a host value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::bool(*b),
            Value::Number(n) => Self::number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Self::string(s.as_str()),
            Value::Array(items) => {
                let arr = Self::with_repr(Repr::Array);
                arr.0
                    .items
                    .borrow_mut()
                    .extend(items.iter().map(|v| Handle::Mock(Self::from_json(v))));
                arr
            }
            Value::Object(map) => {
                let obj = Self::object();
                obj.0.props.borrow_mut().extend(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Handle::Mock(Self::from_json(v)))),
                );
                obj
            }
        }
    }

    /// Deep conversion back to a host value. Functions, elements and
    /// browser handles become `null`.
    pub fn to_json(&self) -> Value {
        match &self.0.repr {
            Repr::Undefined | Repr::Null | Repr::Function(_) | Repr::Element(_) => Value::Null,
            Repr::Bool(b) => Value::Bool(*b),
            Repr::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Repr::Str(s) => Value::String(s.clone()),
            Repr::Array => Value::Array(self.0.items.borrow().iter().map(handle_json).collect()),
            Repr::Object => Value::Object(
                self.0
                    .props
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), handle_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.0.repr, Repr::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.0.repr, Repr::Function(_))
    }

    pub fn as_string(&self) -> String {
        match &self.0.repr {
            Repr::Str(s) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self.0.repr {
            Repr::Number(n) => n as i64,
            _ => 0,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self.0.repr {
            Repr::Bool(b) => b,
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Handle {
        let found = match &self.0.repr {
            Repr::Array if key == "length" => {
                Some(Handle::Mock(MockValue::number(self.0.items.borrow().len() as f64)))
            }
            Repr::Object | Repr::Array | Repr::Function(_) => self.0.props.borrow().get(key).cloned(),
            Repr::Element(el) => el.slot(key),
            _ => None,
        };
        found.unwrap_or_else(|| Handle::Mock(MockValue::undefined()))
    }

    pub fn set(&self, key: &str, value: Handle) -> BridgeResult<()> {
        match &self.0.repr {
            Repr::Object | Repr::Array | Repr::Function(_) => {
                self.0.props.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Repr::Element(el) => {
                el.set_slot(key, value);
                Ok(())
            }
            _ => Err(BridgeError::Invocation(format!("cannot set `{key}` on a primitive"))),
        }
    }

    pub fn remove(&self, key: &str) {
        match &self.0.repr {
            Repr::Element(el) => el.remove_slot(key),
            _ => {
                self.0.props.borrow_mut().remove(key);
            }
        }
    }

    pub fn index(&self, i: usize) -> Handle {
        match self.0.repr {
            Repr::Array => self.0.items.borrow().get(i).cloned(),
            _ => None,
        }
        .unwrap_or_else(|| Handle::Mock(MockValue::undefined()))
    }

    /// Writes a slot, growing the array like JS does.
    pub fn set_index(&self, i: usize, value: Handle) -> BridgeResult<()> {
        if !matches!(self.0.repr, Repr::Array) {
            return Err(BridgeError::Invocation("set_index on a non-array value".into()));
        }
        let mut items = self.0.items.borrow_mut();
        if i >= items.len() {
            items.resize_with(i + 1, || Handle::Mock(MockValue::undefined()));
        }
        items[i] = value;
        Ok(())
    }

    fn body(&self) -> Option<MockFn> {
        match &self.0.repr {
            Repr::Function(f) => Some(f.clone()),
            _ => None,
        }
    }

    fn record(&self, kind: CallKind, args: &[Handle]) {
        self.0.calls.borrow_mut().push(CallRecord { kind, args: args.to_vec() });
    }

    pub fn invoke(&self, args: &[Handle]) -> BridgeResult<Handle> {
        self.record(CallKind::Invoke, args);
        let body = self
            .body()
            .ok_or_else(|| BridgeError::Invocation("value is not callable".into()))?;
        body(&Handle::Mock(MockValue::undefined()), args)
    }

    /// `new value(...args)`: the body runs with a fresh object as `this`;
    /// an object-like return value replaces it.
    pub fn construct(&self, args: &[Handle]) -> BridgeResult<Handle> {
        self.record(CallKind::Construct, args);
        let body = self
            .body()
            .ok_or_else(|| BridgeError::Invocation("value is not a constructor".into()))?;
        let this = Handle::Mock(MockValue::object());
        let result = body(&this, args)?;
        match &result {
            Handle::Mock(v) if v.is_object_like() => Ok(result),
            _ => Ok(this),
        }
    }

    pub fn call(&self, method: &str, args: &[Handle]) -> BridgeResult<Handle> {
        self.record(CallKind::Call(method.to_string()), args);
        let body = match self.get(method) {
            Handle::Mock(m) => m.body(),
            Handle::Browser(_) => None,
        }
        .ok_or_else(|| BridgeError::Invocation(format!("`{method}` is not callable")))?;
        body(&Handle::Mock(self.clone()), args)
    }

    fn is_object_like(&self) -> bool {
        matches!(
            self.0.repr,
            Repr::Object | Repr::Array | Repr::Function(_) | Repr::Element(_)
        )
    }

    /// Every `invoke`, `construct` and `call` made on this value, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.0.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.0.calls.borrow_mut().clear();
    }

    pub fn ptr_eq(&self, other: &MockValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

fn handle_json(handle: &Handle) -> Value {
    match handle {
        Handle::Mock(v) => v.to_json(),
        Handle::Browser(_) => Value::Null,
    }
}

impl fmt::Debug for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.repr {
            Repr::Undefined => write!(f, "undefined"),
            Repr::Null => write!(f, "null"),
            Repr::Bool(b) => write!(f, "{b}"),
            Repr::Number(n) => write!(f, "{n}"),
            Repr::Str(s) => write!(f, "{s:?}"),
            Repr::Object => write!(f, "Object({:?})", self.0.props.borrow().keys().collect::<Vec<_>>()),
            Repr::Array => write!(f, "Array({})", self.0.items.borrow().len()),
            Repr::Function(_) => write!(f, "Function"),
            Repr::Element(el) => write!(f, "Element({el:?})"),
        }
    }
}

/// Global scope for mock values.
#[derive(Debug, Default)]
pub struct MockJs {
    globals: RefCell<BTreeMap<String, Handle>>,
}

impl MockJs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&self, name: &str, value: impl Into<Handle>) {
        self.globals.borrow_mut().insert(name.to_string(), value.into());
    }

    pub fn remove_global(&self, name: &str) {
        self.globals.borrow_mut().remove(name);
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.borrow().contains_key(name)
    }
}

impl JsBridge for MockJs {
    fn global(&self, name: &str) -> Handle {
        self.globals
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Handle::Mock(MockValue::undefined()))
    }

    fn new_array(&self, len: usize) -> Handle {
        Handle::Mock(MockValue::array(len))
    }

    fn new_object(&self) -> Handle {
        Handle::Mock(MockValue::object())
    }

    fn of(&self, value: &Value) -> Handle {
        Handle::Mock(MockValue::from_json(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_property_is_undefined() {
        let obj = MockValue::object();
        assert!(obj.get("nope").is_undefined());
        assert!(MockValue::string("x").get("length").is_undefined());
    }

    #[test]
    fn test_index_out_of_range_is_undefined() {
        let arr = MockValue::array(2);
        assert!(arr.index(5).is_undefined());
        assert_eq!(arr.get("length").as_int(), 2);
    }

    #[test]
    fn test_coercions_yield_zero_values() {
        let s = MockValue::string("hello");
        assert_eq!(s.as_int(), 0);
        assert!(!s.as_bool());
        assert_eq!(MockValue::number(3.9).as_int(), 3);
        assert_eq!(MockValue::bool(true).as_string(), "");
    }

    #[test]
    fn test_invoke_on_non_callable_fails() {
        let obj = MockValue::object();
        assert!(matches!(obj.invoke(&[]), Err(BridgeError::Invocation(_))));
        assert!(matches!(obj.construct(&[]), Err(BridgeError::Invocation(_))));
        assert!(matches!(obj.call("missing", &[]), Err(BridgeError::Invocation(_))));
    }

    #[test]
    fn test_calls_are_recorded_in_order() {
        let f = MockValue::function(|_, args| Ok(args.first().cloned().unwrap_or_else(Handle::undefined)));
        f.invoke(&[Handle::Mock(MockValue::number(1.0))]).unwrap();
        f.construct(&[]).unwrap();

        let calls = f.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, CallKind::Invoke);
        assert_eq!(calls[0].args[0].as_int(), 1);
        assert_eq!(calls[1].kind, CallKind::Construct);
    }

    #[test]
    fn test_call_binds_this() {
        let obj = MockValue::object();
        obj.set(
            "mark",
            Handle::Mock(MockValue::function(|this, _| {
                this.set("marked", &Handle::Mock(MockValue::bool(true)))?;
                Ok(Handle::Mock(MockValue::undefined()))
            })),
        )
        .unwrap();

        obj.call("mark", &[]).unwrap();
        assert!(obj.get("marked").as_bool());
        assert_eq!(obj.calls()[0].kind, CallKind::Call("mark".into()));
    }

    #[test]
    fn test_construct_returns_fresh_object() {
        let class = MockValue::function(|this, args| {
            this.set("arg", &args[0])?;
            Ok(Handle::Mock(MockValue::undefined()))
        });
        let a = class.construct(&[Handle::Mock(MockValue::string("a"))]).unwrap();
        let b = class.construct(&[Handle::Mock(MockValue::string("b"))]).unwrap();
        assert_eq!(a.get("arg").as_string(), "a");
        assert_eq!(b.get("arg").as_string(), "b");
        assert!(!a.same_as(&b));
    }

    #[test]
    fn test_json_conversion_keeps_nested_values() {
        let value = json!({"x": 1, "tags": ["a", "b"], "open": true});
        assert_eq!(MockValue::from_json(&value).to_json(), json!({"x": 1.0, "tags": ["a", "b"], "open": true}));
    }

    #[test]
    fn test_globals() {
        let js = MockJs::new();
        assert!(js.global("HSStaticMethods").is_undefined());
        js.set_global("answer", MockValue::number(42.0));
        assert_eq!(js.global("answer").as_int(), 42);
        js.remove_global("answer");
        assert!(!js.has_global("answer"));
    }
}
