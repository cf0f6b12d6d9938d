//! JS value abstraction
//!
//! [`Handle`] is the single currency for values that live on the JS side.
//! Browser handles wrap a real [`JsValue`]; mock handles wrap an in-memory
//! [`MockValue`] so the same call chains can run in native tests.

use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::{JsCast, JsValue};

use crate::error::{BridgeError, BridgeResult};
use crate::mock::MockValue;

/// Constructor-side operations of the value abstraction.
pub trait JsBridge {
    /// Looks up a property of the global object; missing names yield undefined.
    fn global(&self, name: &str) -> Handle;

    /// Creates an array with `len` empty slots.
    fn new_array(&self, len: usize) -> Handle;

    /// Creates a plain `{}` object.
    fn new_object(&self) -> Handle;

    /// Wraps a host value. Maps become plain objects.
    fn of(&self, value: &serde_json::Value) -> Handle;
}

/// Opaque reference to a JS primitive, object, array, or callable.
#[derive(Clone, Debug)]
pub enum Handle {
    Browser(JsValue),
    Mock(MockValue),
}

impl Handle {
    /// An undefined browser value.
    pub fn undefined() -> Self {
        Handle::Browser(JsValue::UNDEFINED)
    }

    pub fn is_undefined(&self) -> bool {
        match self {
            Handle::Browser(v) => v.is_undefined(),
            Handle::Mock(v) => v.is_undefined(),
        }
    }

    /// String contents, or `""` when the value is not a string.
    pub fn as_string(&self) -> String {
        match self {
            Handle::Browser(v) => v.as_string().unwrap_or_default(),
            Handle::Mock(v) => v.as_string(),
        }
    }

    /// Integer value (truncated), or `0` when the value is not a number.
    pub fn as_int(&self) -> i64 {
        match self {
            Handle::Browser(v) => v.as_f64().map(|n| n as i64).unwrap_or(0),
            Handle::Mock(v) => v.as_int(),
        }
    }

    /// Boolean value, or `false` when the value is not a boolean.
    pub fn as_bool(&self) -> bool {
        match self {
            Handle::Browser(v) => v.as_bool().unwrap_or(false),
            Handle::Mock(v) => v.as_bool(),
        }
    }

    /// Whether the value can be invoked.
    pub fn is_callable(&self) -> bool {
        match self {
            Handle::Browser(v) => v.is_function(),
            Handle::Mock(v) => v.is_callable(),
        }
    }

    /// Reads a property. Non-objects and missing keys yield undefined.
    pub fn get(&self, key: &str) -> Handle {
        match self {
            Handle::Browser(v) => {
                if !v.is_object() && !v.is_function() {
                    return Handle::undefined();
                }
                Handle::Browser(Reflect::get(v, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED))
            }
            Handle::Mock(v) => v.get(key),
        }
    }

    pub fn set(&self, key: &str, value: &Handle) -> BridgeResult<()> {
        match self {
            Handle::Browser(v) => {
                if !v.is_object() && !v.is_function() {
                    return Err(BridgeError::Invocation(format!("cannot set `{key}` on a primitive")));
                }
                Reflect::set(v, &JsValue::from_str(key), &browser_value(value)?)?;
                Ok(())
            }
            Handle::Mock(v) => v.set(key, value.clone()),
        }
    }

    /// Deletes a property; later reads yield undefined.
    pub fn remove(&self, key: &str) -> BridgeResult<()> {
        match self {
            Handle::Browser(v) => {
                if let Some(obj) = v.dyn_ref::<Object>() {
                    Reflect::delete_property(obj, &JsValue::from_str(key))?;
                }
                Ok(())
            }
            Handle::Mock(v) => {
                v.remove(key);
                Ok(())
            }
        }
    }

    /// Reads an array slot. Out-of-range indices yield undefined.
    pub fn index(&self, i: usize) -> Handle {
        match self {
            Handle::Browser(v) => match v.dyn_ref::<Array>() {
                Some(arr) if (i as u32) < arr.length() => Handle::Browser(arr.get(i as u32)),
                _ => Handle::undefined(),
            },
            Handle::Mock(v) => v.index(i),
        }
    }

    pub fn set_index(&self, i: usize, value: &Handle) -> BridgeResult<()> {
        match self {
            Handle::Browser(v) => {
                let arr = v
                    .dyn_ref::<Array>()
                    .ok_or_else(|| BridgeError::Invocation("set_index on a non-array value".into()))?;
                arr.set(i as u32, browser_value(value)?);
                Ok(())
            }
            Handle::Mock(v) => v.set_index(i, value.clone()),
        }
    }

    /// Calls the value as a function with `this` undefined.
    pub fn invoke(&self, args: &[Handle]) -> BridgeResult<Handle> {
        match self {
            Handle::Browser(v) => {
                let func = as_function(v)?;
                Ok(Handle::Browser(func.apply(&JsValue::UNDEFINED, &browser_args(args)?)?))
            }
            Handle::Mock(v) => v.invoke(args),
        }
    }

    /// Calls the value as a constructor (`new value(...args)`).
    pub fn construct(&self, args: &[Handle]) -> BridgeResult<Handle> {
        match self {
            Handle::Browser(v) => {
                let func = as_function(v)?;
                Ok(Handle::Browser(Reflect::construct(func, &browser_args(args)?)?))
            }
            Handle::Mock(v) => v.construct(args),
        }
    }

    /// Calls `value[method](...args)` with `this` bound to the value.
    pub fn call(&self, method: &str, args: &[Handle]) -> BridgeResult<Handle> {
        match self {
            Handle::Browser(v) => {
                let target = match self.get(method) {
                    Handle::Browser(f) if f.is_function() => f,
                    _ => return Err(BridgeError::Invocation(format!("`{method}` is not callable"))),
                };
                let func: &Function = target.unchecked_ref();
                Ok(Handle::Browser(func.apply(v, &browser_args(args)?)?))
            }
            Handle::Mock(v) => v.call(method, args),
        }
    }

    /// The raw JS value behind a browser handle.
    pub fn underlying(&self) -> Option<&JsValue> {
        match self {
            Handle::Browser(v) => Some(v),
            Handle::Mock(_) => None,
        }
    }

    /// Identity comparison (`Object.is` for browser values).
    pub fn same_as(&self, other: &Handle) -> bool {
        match (self, other) {
            (Handle::Browser(a), Handle::Browser(b)) => Object::is(a, b),
            (Handle::Mock(a), Handle::Mock(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<JsValue> for Handle {
    fn from(value: JsValue) -> Self {
        Handle::Browser(value)
    }
}

impl From<MockValue> for Handle {
    fn from(value: MockValue) -> Self {
        Handle::Mock(value)
    }
}

fn as_function(value: &JsValue) -> BridgeResult<&Function> {
    value
        .dyn_ref::<Function>()
        .ok_or_else(|| BridgeError::Invocation("value is not callable".into()))
}

fn browser_value(handle: &Handle) -> BridgeResult<JsValue> {
    match handle {
        Handle::Browser(v) => Ok(v.clone()),
        Handle::Mock(_) => Err(BridgeError::Invocation(
            "mock values cannot cross into the browser".into(),
        )),
    }
}

fn browser_args(args: &[Handle]) -> BridgeResult<Array> {
    let arr = Array::new_with_length(args.len() as u32);
    for (i, arg) in args.iter().enumerate() {
        arr.set(i as u32, browser_value(arg)?);
    }
    Ok(arr)
}

/// Value abstraction backed by the real JS global scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserJs;

impl BrowserJs {
    pub fn new() -> Self {
        BrowserJs
    }
}

impl JsBridge for BrowserJs {
    fn global(&self, name: &str) -> Handle {
        let value = Reflect::get(&js_sys::global(), &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED);
        Handle::Browser(value)
    }

    fn new_array(&self, len: usize) -> Handle {
        Handle::Browser(Array::new_with_length(len as u32).into())
    }

    fn new_object(&self) -> Handle {
        Handle::Browser(Object::new().into())
    }

    fn of(&self, value: &serde_json::Value) -> Handle {
        let serializer = Serializer::json_compatible();
        match value.serialize(&serializer) {
            Ok(v) => Handle::Browser(v),
            Err(e) => {
                console_warn!("Failed to convert host value: {}", e);
                Handle::undefined()
            }
        }
    }
}
