//! JavaScript-facing API

use js_sys::Promise;
use wasm_bindgen::prelude::*;

use crate::catalog::ComponentKind;
use crate::component::Options;
use crate::error::BridgeError;
use crate::js::Handle;
use crate::manager::{self, Manager};
use crate::orchestrator::{InitConfig, Orchestrator};

/// Handle on the page's installed bridge manager.
#[wasm_bindgen]
pub struct Runtime {
    manager: Manager,
}

#[wasm_bindgen]
impl Runtime {
    /// Attaches to the manager installed at module start.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Runtime, JsValue> {
        Ok(Runtime { manager: manager::current()? })
    }

    /// Runs the orchestrator; resolves with the outcome object.
    /// `config` may be omitted or partial (`{ libraryTimeout: 200 }`).
    pub fn initialise(&self, config: JsValue) -> Result<Promise, JsValue> {
        let config: InitConfig = if config.is_undefined() || config.is_null() {
            InitConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let orchestrator = Orchestrator::new(self.manager.clone());
        let mut config = Some(config);
        Ok(Promise::new(&mut |resolve, _reject| {
            let Some(config) = config.take() else { return };
            orchestrator.on_complete(config, move |outcome| {
                let value = match serde_wasm_bindgen::to_value(&outcome) {
                    Ok(v) => v,
                    Err(e) => JsValue::from_str(&e.to_string()),
                };
                if let Err(e) = resolve.call1(&JsValue::NULL, &value) {
                    console_error!("Failed to resolve initialise(): {:?}", e);
                }
            });
        }))
    }

    /// Returns the number of instances created.
    #[wasm_bindgen(js_name = initialiseComponent)]
    pub fn initialise_component(&self, kind: &str, selector: &str, options: JsValue) -> Result<u32, JsValue> {
        let options: Option<Options> = if options.is_undefined() || options.is_null() {
            None
        } else {
            Some(serde_wasm_bindgen::from_value(options)?)
        };
        let created = self.manager.initialise_kind(kind, selector, options.as_ref())?;
        Ok(created as u32)
    }

    #[wasm_bindgen(js_name = destroyComponent)]
    pub fn destroy_component(&self, selector: &str, kind: &str) -> Result<u32, JsValue> {
        let kind: ComponentKind = kind.parse()?;
        Ok(self.manager.destroy(selector, kind)? as u32)
    }

    #[wasm_bindgen(js_name = hasComponentInstance)]
    pub fn has_component_instance(&self, selector: &str, kind: &str) -> Result<bool, JsValue> {
        let kind: ComponentKind = kind.parse()?;
        match self.manager.get_instance(selector, kind) {
            Ok(_) => Ok(true),
            Err(BridgeError::NoInstance { .. } | BridgeError::NoMatchingElements(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The library's instance object on the first matching element.
    #[wasm_bindgen(js_name = componentInstance)]
    pub fn component_instance(&self, selector: &str, kind: &str) -> Result<JsValue, JsValue> {
        let kind: ComponentKind = kind.parse()?;
        match self.manager.get_instance(selector, kind)? {
            Handle::Browser(v) => Ok(v),
            Handle::Mock(_) => Err(JsValue::from_str("instance is not a browser value")),
        }
    }

    /// Whether `wasmReady` has been scheduled for this page.
    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.manager.ready_published()
    }
}

/// Every supported component symbol, in catalog order.
#[wasm_bindgen(js_name = componentKinds)]
pub fn component_kinds() -> Box<[JsValue]> {
    ComponentKind::ALL
        .iter()
        .map(|k| JsValue::from_str(k.symbol()))
        .collect::<Vec<JsValue>>()
        .into_boxed_slice()
}
