//! Hydration entry point
//!
//! Runs the orchestrator and, on success, wires the page-local handlers
//! (dropdown toggles, modals, dismissible alerts) and publishes the ready
//! signal: `#wasm-status` reads "Ready" and `wasmReady` fires on the window.

use std::time::Duration;

use crate::catalog::ComponentKind;
use crate::dom::{DomBridge, Element, Event};
use crate::error::BridgeError;
use crate::manager::Manager;
use crate::orchestrator::{InitConfig, Orchestrator, PendingOutcome};

pub const STATUS_ELEMENT_ID: &str = "wasm-status";
pub const READY_TEXT: &str = "Ready";
pub const READY_EVENT: &str = "wasmReady";
/// Gives late subscribers a chance to attach before `wasmReady` fires.
pub const READY_EVENT_DELAY: Duration = Duration::from_millis(10);

/// Elements wired by [`wire_page`], per handler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub dropdown_triggers: usize,
    pub dropdown_items: usize,
    pub modal_triggers: usize,
    pub modal_toggles: usize,
    pub modal_closes: usize,
    pub alert_closes: usize,
    pub alert_dismissals: usize,
    pub tooltips: usize,
}

/// Hydrates the page behind `manager`. Page handlers are wired and the
/// ready signal published by the first successful run only.
pub fn hydrate(manager: &Manager, config: InitConfig) -> PendingOutcome {
    let pending = PendingOutcome::new();
    let slot = pending.clone();
    let page = manager.clone();
    Orchestrator::new(manager.clone()).on_complete(config, move |outcome| {
        if outcome.success {
            if page.claim_ready_signal() {
                discover_components(&page);
                wire_page(&page);
                publish_ready(&page);
            } else {
                console_warn!("Page already hydrated, handlers left as they are");
            }
        } else if let Some(e) = &outcome.error {
            console_error!("Hydration aborted, page stays static: {}", e);
        }
        slot.fulfil(outcome);
    });
    pending
}

/// Browser entry: installs the live manager and hydrates with defaults.
pub fn start() -> Result<PendingOutcome, BridgeError> {
    console_log!("WASM runtime initializing...");
    let manager = Manager::browser()?;
    crate::manager::install(manager.clone())?;
    Ok(hydrate(&manager, InitConfig::default()))
}

/// Counts hydratable elements per kind. Kinds with none are omitted.
pub fn discover_components(manager: &Manager) -> Vec<(ComponentKind, usize)> {
    let mut found = Vec::new();
    for kind in ComponentKind::ALL {
        let mut elements: Vec<Element> = Vec::new();
        for selector in kind.entry_selectors() {
            for el in manager.query_all(&selector) {
                if !elements.iter().any(|e| e.same_as(&el)) {
                    elements.push(el);
                }
            }
        }
        if !elements.is_empty() {
            console_log!("Found {} {} elements", elements.len(), kind);
            found.push((kind, elements.len()));
        }
    }
    found
}

fn attach(manager: &Manager, selector: &str, kind: &str, handler: impl Fn(&Event) + 'static) -> usize {
    match manager.add_listener(selector, kind, handler) {
        Ok(n) => n,
        Err(BridgeError::NoMatchingElements(_)) => 0,
        Err(e) => {
            console_warn!("Could not wire {} on {}: {}", kind, selector, e);
            0
        }
    }
}

/// Attaches the page-local click and hover handlers.
pub fn wire_page(manager: &Manager) -> Wiring {
    let dom = manager.dom().clone();
    let wiring = Wiring {
        dropdown_triggers: attach(manager, ".dropdown-trigger", "click", toggle_dropdown),
        dropdown_items: attach(manager, ".dropdown-menu a", "click", log_dropdown_item),
        modal_triggers: attach(manager, ".modal-trigger", "click", move |e| open_modal(&*dom, e)),
        modal_toggles: attach(manager, "[data-modal-toggle]", "click", |_| {
            console_log!("Modal trigger clicked")
        }),
        modal_closes: attach(manager, ".modal-close", "click", close_modal),
        alert_closes: attach(manager, ".alert-close", "click", dismiss_alert),
        alert_dismissals: attach(manager, ".alert [data-dismiss='alert']", "click", |_| {
            console_log!("Alert close button clicked")
        }),
        tooltips: attach(manager, "[data-tooltip]", "mouseenter", |e| log_tooltip(e, true)),
    };
    attach(manager, "[data-tooltip]", "mouseleave", |e| log_tooltip(e, false));
    console_log!("Page handlers wired: {:?}", wiring);
    wiring
}

fn toggle_dropdown(event: &Event) {
    event.prevent_default();
    let Some(trigger) = event.current_target() else { return };
    match trigger.parent().and_then(|p| p.query(".dropdown-content")) {
        Some(menu) => {
            let hidden = menu.toggle_class("hidden");
            console_log!("Dropdown {}", if hidden { "closed" } else { "opened" });
        }
        None => console_warn!("Dropdown trigger has no .dropdown-content sibling"),
    }
}

fn log_dropdown_item(event: &Event) {
    let text = event.current_target().map(|el| el.text()).unwrap_or_default();
    console_log!("Dropdown item clicked: {}", text.trim());
}

fn open_modal(dom: &dyn DomBridge, event: &Event) {
    event.prevent_default();
    let Some(trigger) = event.current_target() else { return };
    let Some(target) = trigger.attr("data-modal-target") else {
        console_warn!("Modal trigger without data-modal-target");
        return;
    };
    match dom.by_id(&target) {
        Some(modal) => {
            modal.remove_class("hidden");
            console_log!("Modal {} opened", target);
        }
        None => console_warn!("Modal #{} not found", target),
    }
}

fn close_modal(event: &Event) {
    event.prevent_default();
    if let Some(modal) = event.current_target().and_then(|el| el.closest(".modal")) {
        modal.add_class("hidden");
    }
}

fn dismiss_alert(event: &Event) {
    event.prevent_default();
    let Some(alert) = event.current_target().and_then(|el| el.closest(".alert")) else {
        return;
    };
    if let Err(e) = alert.set_style("display", "none") {
        console_warn!("Could not hide alert: {}", e);
    }
}

fn log_tooltip(event: &Event, shown: bool) {
    let text = event
        .current_target()
        .and_then(|el| el.attr("data-tooltip"))
        .unwrap_or_default();
    console_log!("Tooltip {}: {}", if shown { "shown" } else { "hidden" }, text);
}

/// Publishes the ready signal. Returns `false` (and does nothing) if it was
/// already published for this manager.
pub fn announce_ready(manager: &Manager) -> bool {
    if !manager.claim_ready_signal() {
        console_warn!("Ready signal already published");
        return false;
    }
    publish_ready(manager);
    true
}

fn publish_ready(manager: &Manager) {
    match manager.by_id(STATUS_ELEMENT_ID) {
        Some(status) => status.set_text(READY_TEXT),
        None => console_warn!("#{} not found, status not updated", STATUS_ELEMENT_ID),
    }

    let dom = manager.dom().clone();
    manager.scheduler().set_timeout(
        READY_EVENT_DELAY,
        Box::new(move || match dom.dispatch_window_event(READY_EVENT) {
            Ok(()) => console_log!("Dispatched {} event", READY_EVENT),
            Err(e) => console_error!("Failed to dispatch {}: {}", READY_EVENT, e),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockElement};

    fn dropdown_page() -> (MockBackend, MockElement, MockElement) {
        let backend = MockBackend::new();
        let wrapper = MockElement::new("div").with_class("dropdown");
        let trigger = MockElement::new("button").with_class("dropdown-trigger");
        let menu = MockElement::new("ul").with_class("dropdown-content").with_class("hidden");
        wrapper.append_child(&trigger);
        wrapper.append_child(&menu);
        backend.dom.add(&wrapper);
        (backend, trigger, menu)
    }

    #[test]
    fn test_dropdown_toggles_hidden() {
        let (backend, trigger, menu) = dropdown_page();
        let wiring = wire_page(&backend.manager());
        assert_eq!(wiring.dropdown_triggers, 1);

        assert!(!trigger.click());
        assert!(!menu.has_class("hidden"));
        trigger.click();
        assert!(menu.has_class("hidden"));
    }

    #[test]
    fn test_modal_open_and_close() {
        let backend = MockBackend::new();
        let open = MockElement::new("button")
            .with_class("modal-trigger")
            .with_attr("data-modal-target", "demo");
        let modal = MockElement::new("div").with_id("demo").with_class("modal").with_class("hidden");
        let close = MockElement::new("button").with_class("modal-close");
        modal.append_child(&close);
        backend.dom.add(&open);
        backend.dom.add(&modal);

        wire_page(&backend.manager());
        open.click();
        assert!(!modal.has_class("hidden"));
        close.click();
        assert!(modal.has_class("hidden"));
    }

    #[test]
    fn test_alert_close_hides_alert() {
        let backend = MockBackend::new();
        let alert = MockElement::new("div").with_class("alert");
        let close = MockElement::new("button").with_class("alert-close");
        alert.append_child(&close);
        backend.dom.add(&alert);

        wire_page(&backend.manager());
        close.click();
        assert_eq!(alert.style("display").as_deref(), Some("none"));
    }

    #[test]
    fn test_dropdown_items_only_log() {
        let backend = MockBackend::new();
        let menu = MockElement::new("ul").with_class("dropdown-menu");
        let item = MockElement::new("a").with_text(" Profile ");
        let stray = MockElement::new("a");
        menu.append_child(&MockElement::new("li"));
        menu.children()[0].append_child(&item);
        backend.dom.add(&menu);
        backend.dom.add(&stray);

        let wiring = wire_page(&backend.manager());
        assert_eq!(wiring.dropdown_items, 1);
        assert_eq!(item.listener_count("click"), 1);
        assert_eq!(stray.listener_count("click"), 0);
        assert!(item.click());
    }

    #[test]
    fn test_modal_toggle_leaves_behaviour_to_library() {
        let backend = MockBackend::new();
        let toggle = MockElement::new("button").with_attr("data-modal-toggle", "demo");
        let modal = MockElement::new("div").with_id("demo").with_class("hidden");
        backend.dom.add(&toggle);
        backend.dom.add(&modal);

        let wiring = wire_page(&backend.manager());
        assert_eq!(wiring.modal_toggles, 1);
        assert_eq!(wiring.modal_triggers, 0);
        assert!(toggle.click());
        assert!(modal.has_class("hidden"));
    }

    #[test]
    fn test_alert_dismiss_buttons_inside_alerts() {
        let backend = MockBackend::new();
        let alert = MockElement::new("div").with_class("alert");
        let dismiss = MockElement::new("button").with_attr("data-dismiss", "alert");
        let outside = MockElement::new("button").with_attr("data-dismiss", "alert");
        alert.append_child(&dismiss);
        backend.dom.add(&alert);
        backend.dom.add(&outside);

        let wiring = wire_page(&backend.manager());
        assert_eq!(wiring.alert_dismissals, 1);
        assert_eq!(wiring.alert_closes, 0);
        assert_eq!(outside.listener_count("click"), 0);
        assert!(dismiss.click());
        assert_eq!(alert.style("display"), None);
    }

    #[test]
    fn test_wiring_an_empty_page_is_harmless() {
        let backend = MockBackend::new();
        assert_eq!(wire_page(&backend.manager()), Wiring::default());
    }

    #[test]
    fn test_announce_ready_once() {
        let backend = MockBackend::new();
        let status = MockElement::new("span").with_id(STATUS_ELEMENT_ID).with_text("Loading…");
        backend.dom.add(&status);
        let manager = backend.manager();

        assert!(announce_ready(&manager));
        assert_eq!(status.text(), READY_TEXT);
        assert!(backend.dom.window_events().is_empty());

        backend.scheduler.advance(READY_EVENT_DELAY);
        assert_eq!(backend.dom.window_events(), vec![READY_EVENT]);

        assert!(!announce_ready(&manager));
        backend.scheduler.run_until_idle();
        assert_eq!(backend.dom.window_events().len(), 1);
    }

    #[test]
    fn test_second_hydrate_does_not_rewire() {
        let (backend, trigger, menu) = dropdown_page();
        crate::mock::MockLibrary::install(&backend.js, &backend.dom);
        let manager = backend.manager();

        let first = hydrate(&manager, InitConfig::default());
        let second = hydrate(&manager, InitConfig::default());
        assert!(first.outcome().is_some_and(|o| o.success));
        assert!(second.outcome().is_some_and(|o| o.success));
        assert_eq!(trigger.listener_count("click"), 1);

        trigger.click();
        assert!(!menu.has_class("hidden"));

        backend.scheduler.run_until_idle();
        assert_eq!(backend.dom.window_events(), vec![READY_EVENT]);
    }

    #[test]
    fn test_discovery_counts_overlay_as_modal() {
        let backend = MockBackend::new();
        backend.dom.add(&MockElement::new("div").with_attr("data-hs-modal", ""));
        backend.dom.add(&MockElement::new("div").with_attr("data-hs-overlay", "#x"));
        backend.dom.add(&MockElement::new("div").with_attr("data-hs-tabs", ""));

        let found = discover_components(&backend.manager());
        assert_eq!(found, vec![(ComponentKind::Modal, 2), (ComponentKind::Tabs, 1)]);
    }

    #[test]
    fn test_start_is_unsupported_off_wasm() {
        assert_eq!(start().unwrap_err(), BridgeError::Unsupported);
    }
}
