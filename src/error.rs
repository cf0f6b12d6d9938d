//! Error type shared by every bridge layer
//!
//! Variants are ordered from the lowest layer (raw JS invocation) up to
//! the orchestrator's timeouts.

use std::time::Duration;

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors produced by the hydration runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// A call or construct on a value that is not callable, or a JS exception.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// A selector matched nothing for an operation that needs at least one element.
    #[error("no elements found for selector: {0:?}")]
    NoMatchingElements(String),

    /// No component instance is stored under the expected key.
    #[error("no {kind} instance found for selector {selector}")]
    NoInstance { kind: String, selector: String },

    /// The FlyonUI globals (or one of the required classes) are missing.
    #[error("FlyonUI library unavailable: {0}")]
    LibraryUnavailable(String),

    /// A component symbol outside of the known catalog.
    #[error("unsupported component: {0}")]
    UnknownComponent(String),

    #[error("DOM ready timeout exceeded after {0:?}")]
    DomReadyTimeout(Duration),

    #[error("FlyonUI library timeout: {0}")]
    LibraryTimeout(String),

    /// Wraps a component bridge failure raised during orchestrated init.
    #[error("component initialisation failed: {0}")]
    ComponentInit(Box<BridgeError>),

    #[error("initialisation exceeded overall timeout of {0:?}")]
    OverallTimeout(Duration),

    #[error("bridge manager already installed")]
    AlreadyInstalled,

    #[error("bridge manager not installed")]
    NotInstalled,

    /// Browser APIs are not reachable (native target, or no window).
    #[error("browser environment unavailable")]
    Unsupported,
}

impl BridgeError {
    /// Short machine-friendly name of the variant, used in JS-facing outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invocation(_) => "InvocationError",
            Self::NoMatchingElements(_) => "NoMatchingElements",
            Self::NoInstance { .. } => "NoInstance",
            Self::LibraryUnavailable(_) => "LibraryUnavailable",
            Self::UnknownComponent(_) => "UnknownComponent",
            Self::DomReadyTimeout(_) => "DomReadyTimeout",
            Self::LibraryTimeout(_) => "LibraryTimeout",
            Self::ComponentInit(_) => "ComponentInitError",
            Self::OverallTimeout(_) => "OverallTimeout",
            Self::AlreadyInstalled => "AlreadyInstalled",
            Self::NotInstalled => "NotInstalled",
            Self::Unsupported => "Unsupported",
        }
    }
}

impl From<JsValue> for BridgeError {
    fn from(value: JsValue) -> Self {
        value
            .as_string()
            .map_or_else(|| Self::Invocation(format!("{value:?}")), Self::Invocation)
    }
}

impl From<BridgeError> for JsValue {
    fn from(value: BridgeError) -> Self {
        Self::from(value.to_string())
    }
}

/// Result alias used throughout the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_init_wraps_message() {
        let inner = BridgeError::LibraryUnavailable("HSStaticMethods not available".into());
        let err = BridgeError::ComponentInit(Box::new(inner));
        assert_eq!(err.kind(), "ComponentInitError");
        assert!(err.to_string().contains("HSStaticMethods not available"));
    }

    #[test]
    fn test_no_instance_message_names_kind_and_selector() {
        let err = BridgeError::NoInstance { kind: "HSModal".into(), selector: "#m".into() };
        assert_eq!(err.to_string(), "no HSModal instance found for selector #m");
    }
}
