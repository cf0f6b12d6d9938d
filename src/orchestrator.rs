//! Initialisation orchestrator
//!
//! Sequences DOM ready, library availability and component initialisation
//! as an explicit state machine. Every wait is either a DOM callback or a
//! scheduler timer, so a run spans several event-loop turns without ever
//! blocking one. Each waiting state arms a guard timer for its budget.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::ComponentKind;
use crate::component::{AUTO_INIT, STATIC_METHODS};
use crate::dom::ReadyWait;
use crate::error::{BridgeError, BridgeResult};
use crate::manager::{self, Manager};

/// Millisecond (de)serialization for `Duration` fields.
mod millis {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(de::Error::custom(format!("invalid duration: {ms} ms")));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitConfig {
    /// Wall clock for the whole run.
    #[serde(with = "millis")]
    pub overall_timeout: Duration,
    #[serde(with = "millis")]
    pub dom_ready_timeout: Duration,
    #[serde(with = "millis")]
    pub library_timeout: Duration,
    pub auto_init_components: bool,
    /// Honoured only when `auto_init_components` is false.
    pub components: Vec<ComponentKind>,
    /// Additional availability polls after the first.
    pub max_retries: u32,
    #[serde(with = "millis")]
    pub retry_delay: Duration,
}

impl Default for InitConfig {
    fn default() -> Self {
        InitConfig {
            overall_timeout: Duration::from_secs(30),
            dom_ready_timeout: Duration::from_secs(10),
            library_timeout: Duration::from_secs(15),
            auto_init_components: true,
            components: Vec::new(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl InitConfig {
    /// Manual mode with an explicit component list.
    pub fn with_components(components: Vec<ComponentKind>, overall_timeout: Option<Duration>) -> Self {
        let defaults = InitConfig::default();
        InitConfig {
            auto_init_components: false,
            components,
            overall_timeout: overall_timeout.unwrap_or(defaults.overall_timeout),
            ..defaults
        }
    }
}

/// Report of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitOutcome {
    pub success: bool,
    pub dom_ready: bool,
    pub library_loaded: bool,
    pub components_initialised: bool,
    /// `["all"]` in auto mode, otherwise the symbols that were initialised.
    pub initialised_kinds: Vec<String>,
    pub error: Option<BridgeError>,
    pub duration: Duration,
}

// JS shape: camelCase keys, `error` as its message plus `errorKind`,
// `duration` in milliseconds.
impl Serialize for InitOutcome {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("InitOutcome", 8)?;
        st.serialize_field("success", &self.success)?;
        st.serialize_field("domReady", &self.dom_ready)?;
        st.serialize_field("libraryLoaded", &self.library_loaded)?;
        st.serialize_field("componentsInitialised", &self.components_initialised)?;
        st.serialize_field("initialisedKinds", &self.initialised_kinds)?;
        st.serialize_field("error", &self.error.as_ref().map(|e| e.to_string()))?;
        st.serialize_field("errorKind", &self.error.as_ref().map(|e| e.kind()))?;
        st.serialize_field("duration", &(self.duration.as_millis() as u64))?;
        st.end()
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Start,
    AwaitDomReady,
    AwaitLibrary,
    InitialiseComponents,
    Succeeded,
    Failed,
}

impl InitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InitState::Succeeded | InitState::Failed)
    }
}

/// Checks that `HSStaticMethods.autoInit` and every probe class are present.
pub fn library_available(manager: &Manager) -> BridgeResult<()> {
    let js = manager.js();
    let statics = js.global(STATIC_METHODS);
    if statics.is_undefined() {
        return Err(BridgeError::LibraryUnavailable(format!("{STATIC_METHODS} not found")));
    }
    if !statics.get(AUTO_INIT).is_callable() {
        return Err(BridgeError::LibraryUnavailable(format!(
            "{STATIC_METHODS}.{AUTO_INIT} not found"
        )));
    }
    for kind in ComponentKind::PROBES {
        if js.global(kind.symbol()).is_undefined() {
            return Err(BridgeError::LibraryUnavailable(format!("{kind} not found")));
        }
    }
    Ok(())
}

type Completion = Box<dyn FnOnce(InitOutcome)>;

struct Run {
    manager: Manager,
    config: InitConfig,
    started: Duration,
    state: Cell<InitState>,
    outcome: RefCell<InitOutcome>,
    attempts: Cell<u32>,
    library_deadline: Cell<Duration>,
    ready_wait: RefCell<Option<ReadyWait>>,
    on_complete: RefCell<Option<Completion>>,
}

impl Run {
    fn now(&self) -> Duration {
        self.manager.scheduler().now()
    }

    fn elapsed(&self) -> Duration {
        self.now().saturating_sub(self.started)
    }

    fn remaining(&self) -> Duration {
        self.config.overall_timeout.saturating_sub(self.elapsed())
    }

    fn after(self: &Rc<Self>, delay: Duration, step: impl FnOnce(&Rc<Run>) + 'static) {
        let run = self.clone();
        self.manager
            .scheduler()
            .set_timeout(delay, Box::new(move || step(&run)));
    }
}

fn start(run: &Rc<Run>) {
    console_log!("Starting WASM initialization");
    run.state.set(InitState::AwaitDomReady);

    let budget = run.config.dom_ready_timeout.min(run.config.overall_timeout);
    run.after(budget, move |run| {
        if run.state.get() != InitState::AwaitDomReady {
            return;
        }
        let wait = run.ready_wait.borrow_mut().take();
        if let Some(wait) = wait {
            wait.cancel();
        }
        finish(run, Some(BridgeError::DomReadyTimeout(budget)));
    });

    let r = run.clone();
    let wait = run.manager.await_ready(move || dom_ready(&r));
    if run.state.get() == InitState::AwaitDomReady {
        *run.ready_wait.borrow_mut() = Some(wait);
    }
}

fn dom_ready(run: &Rc<Run>) {
    if run.state.get() != InitState::AwaitDomReady {
        return;
    }
    run.ready_wait.borrow_mut().take();
    run.outcome.borrow_mut().dom_ready = true;
    console_log!("DOM is ready");

    run.state.set(InitState::AwaitLibrary);
    let budget = run.config.library_timeout.min(run.remaining());
    run.library_deadline.set(run.now() + budget);
    run.after(budget, move |run| {
        if run.state.get() == InitState::AwaitLibrary {
            finish(
                run,
                Some(BridgeError::LibraryTimeout(format!(
                    "FlyonUI library not available within {budget:?}"
                ))),
            );
        }
    });

    poll_library(run);
}

fn poll_library(run: &Rc<Run>) {
    if run.state.get() != InitState::AwaitLibrary {
        return;
    }
    if run.attempts.get() > 0 && run.now() >= run.library_deadline.get() {
        finish(run, Some(BridgeError::LibraryTimeout("timeout exceeded while polling".into())));
        return;
    }

    let attempt = run.attempts.get() + 1;
    run.attempts.set(attempt);
    let total = run.config.max_retries + 1;

    match library_available(&run.manager) {
        Ok(()) => {
            console_log!("FlyonUI library is loaded");
            run.outcome.borrow_mut().library_loaded = true;
            initialise_components(run);
        }
        Err(e) if attempt >= total => {
            console_warn!("{}", e);
            finish(
                run,
                Some(BridgeError::LibraryTimeout(format!(
                    "FlyonUI library not available after {total} attempts"
                ))),
            );
        }
        Err(e) => {
            console_log!(
                "FlyonUI library not ready ({}), retrying in {:?} (attempt {}/{})",
                e,
                run.config.retry_delay,
                attempt,
                total
            );
            run.after(run.config.retry_delay, poll_library);
        }
    }
}

fn initialise_components(run: &Rc<Run>) {
    run.state.set(InitState::InitialiseComponents);
    if run.elapsed() > run.config.overall_timeout {
        finish(run, Some(BridgeError::OverallTimeout(run.config.overall_timeout)));
        return;
    }

    let result = if run.config.auto_init_components {
        console_log!("Auto-initializing all FlyonUI components");
        run.manager.initialise_all(&[]).map(|()| vec!["all".to_string()])
    } else if !run.config.components.is_empty() {
        let kinds = &run.config.components;
        console_log!("Initializing components: {:?}", ComponentKind::symbols(kinds));
        run.manager
            .initialise_all(kinds)
            .map(|()| kinds.iter().map(|k| k.symbol().to_string()).collect())
    } else {
        Ok(Vec::new())
    };

    match result {
        Ok(kinds) => {
            {
                let mut outcome = run.outcome.borrow_mut();
                outcome.components_initialised = true;
                outcome.initialised_kinds = kinds;
            }
            finish(run, None);
        }
        Err(e) => finish(run, Some(BridgeError::ComponentInit(Box::new(e)))),
    }
}

fn finish(run: &Rc<Run>, error: Option<BridgeError>) {
    if run.state.get().is_terminal() {
        return;
    }
    run.state.set(if error.is_some() {
        InitState::Failed
    } else {
        InitState::Succeeded
    });

    let outcome = {
        let mut outcome = run.outcome.borrow_mut();
        outcome.success = error.is_none();
        outcome.error = error;
        outcome.duration = run.elapsed();
        outcome.clone()
    };
    match &outcome.error {
        None => console_log!("WASM initialization completed successfully in {:?}", outcome.duration),
        Some(e) => console_error!("WASM initialization failed after {:?}: {}", outcome.duration, e),
    }

    let callback = run.on_complete.borrow_mut().take();
    if let Some(callback) = callback {
        callback(outcome);
    }
}

/// Slot filled with the outcome once a run finishes.
#[derive(Debug, Clone, Default)]
pub struct PendingOutcome {
    slot: Rc<RefCell<Option<InitOutcome>>>,
}

impl PendingOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fulfil(&self, outcome: InitOutcome) {
        *self.slot.borrow_mut() = Some(outcome);
    }

    pub fn is_complete(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<InitOutcome> {
        self.slot.borrow().clone()
    }

    /// `None` while running; afterwards the run's error, if any.
    pub fn result(&self) -> Option<BridgeResult<()>> {
        self.slot.borrow().as_ref().map(|o| match &o.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        })
    }
}

pub struct Orchestrator {
    manager: Manager,
}

impl Orchestrator {
    pub fn new(manager: Manager) -> Self {
        Orchestrator { manager }
    }

    /// Orchestrator over the installed manager.
    pub fn current() -> BridgeResult<Self> {
        Ok(Self::new(manager::current()?))
    }

    /// Starts a run; `callback` receives the outcome exactly once.
    pub fn on_complete(&self, config: InitConfig, callback: impl FnOnce(InitOutcome) + 'static) {
        let run = Rc::new(Run {
            started: self.manager.scheduler().now(),
            manager: self.manager.clone(),
            config,
            state: Cell::new(InitState::Start),
            outcome: RefCell::new(InitOutcome::default()),
            attempts: Cell::new(0),
            library_deadline: Cell::new(Duration::ZERO),
            ready_wait: RefCell::new(None),
            on_complete: RefCell::new(Some(Box::new(callback))),
        });
        start(&run);
    }

    /// Starts a run and returns a slot that holds the outcome when done.
    /// With a ready document and a loaded library the slot is already
    /// filled on return.
    pub fn run(&self, config: InitConfig) -> PendingOutcome {
        let pending = PendingOutcome::new();
        let slot = pending.clone();
        self.on_complete(config, move |outcome| slot.fulfil(outcome));
        pending
    }

    /// [`Orchestrator::run`] with the default configuration.
    pub fn quick(&self) -> PendingOutcome {
        self.run(InitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = InitConfig::default();
        assert_eq!(config.overall_timeout, Duration::from_secs(30));
        assert_eq!(config.dom_ready_timeout, Duration::from_secs(10));
        assert_eq!(config.library_timeout, Duration::from_secs(15));
        assert!(config.auto_init_components);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: InitConfig = serde_json::from_value(json!({
            "libraryTimeout": 200,
            "maxRetries": 1,
            "retryDelay": 100,
            "autoInitComponents": false,
            "components": ["HSModal"]
        }))
        .unwrap();
        assert_eq!(config.library_timeout, Duration::from_millis(200));
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.components, vec![ComponentKind::Modal]);
        assert_eq!(config.overall_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_rejects_unknown_component_and_negative_duration() {
        assert!(serde_json::from_value::<InitConfig>(json!({"components": ["HSNope"]})).is_err());
        assert!(serde_json::from_value::<InitConfig>(json!({"retryDelay": -5})).is_err());
    }

    #[test]
    fn test_with_components() {
        let config = InitConfig::with_components(vec![ComponentKind::Tabs], Some(Duration::from_secs(5)));
        assert!(!config.auto_init_components);
        assert_eq!(config.components, vec![ComponentKind::Tabs]);
        assert_eq!(config.overall_timeout, Duration::from_secs(5));
        assert_eq!(config.library_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_outcome_serializes_error_as_message() {
        let outcome = InitOutcome {
            error: Some(BridgeError::LibraryTimeout("gone".into())),
            duration: Duration::from_millis(100),
            ..InitOutcome::default()
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["error"], "FlyonUI library timeout: gone");
        assert_eq!(value["errorKind"], "LibraryTimeout");
        assert_eq!(value["duration"], 100);
        assert_eq!(value["initialisedKinds"], json!([]));
    }
}
