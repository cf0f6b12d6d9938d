//! FlyonUI component catalog
//!
//! The symbols are significant on the wire: they name globals in the
//! library's namespace and are passed verbatim to `HSStaticMethods.autoInit`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// A FlyonUI widget family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComponentKind {
    Dropdown,
    Modal,
    Tooltip,
    Accordion,
    Tabs,
    Carousel,
    Collapse,
    Offcanvas,
    Scrollspy,
    Select,
    TreeView,
    DataTable,
    AdvancedRangeSlider,
}

impl ComponentKind {
    /// Every kind, in catalog order.
    pub const ALL: [ComponentKind; 13] = [
        ComponentKind::Dropdown,
        ComponentKind::Modal,
        ComponentKind::Tooltip,
        ComponentKind::Accordion,
        ComponentKind::Tabs,
        ComponentKind::Carousel,
        ComponentKind::Collapse,
        ComponentKind::Offcanvas,
        ComponentKind::Scrollspy,
        ComponentKind::Select,
        ComponentKind::TreeView,
        ComponentKind::DataTable,
        ComponentKind::AdvancedRangeSlider,
    ];

    /// Classes whose presence signals that the library finished loading.
    pub const PROBES: [ComponentKind; 3] =
        [ComponentKind::Dropdown, ComponentKind::Modal, ComponentKind::Tooltip];

    /// Global class symbol, e.g. `HSDropdown`.
    pub fn symbol(self) -> &'static str {
        match self {
            ComponentKind::Dropdown => "HSDropdown",
            ComponentKind::Modal => "HSModal",
            ComponentKind::Tooltip => "HSTooltip",
            ComponentKind::Accordion => "HSAccordion",
            ComponentKind::Tabs => "HSTabs",
            ComponentKind::Carousel => "HSCarousel",
            ComponentKind::Collapse => "HSCollapse",
            ComponentKind::Offcanvas => "HSOffcanvas",
            ComponentKind::Scrollspy => "HSScrollspy",
            ComponentKind::Select => "HSSelect",
            ComponentKind::TreeView => "HSTreeView",
            ComponentKind::DataTable => "HSDataTable",
            ComponentKind::AdvancedRangeSlider => "HSAdvancedRangeSlider",
        }
    }

    /// Symbol with the `HS` prefix stripped, e.g. `Dropdown`.
    pub fn suffix(self) -> &'static str {
        &self.symbol()[2..]
    }

    /// Default element selector, e.g. `[data-hs-dropdown]`.
    pub fn default_selector(self) -> String {
        format!("[data-hs-{}]", self.suffix().to_lowercase())
    }

    /// Selectors the page entry scans for this kind. Modals also answer to
    /// the legacy overlay attribute.
    pub fn entry_selectors(self) -> Vec<String> {
        let mut selectors = vec![self.default_selector()];
        if self == ComponentKind::Modal {
            selectors.push("[data-hs-overlay]".to_string());
        }
        selectors
    }

    /// Property under which an element stores its instance, e.g. `hsDropdown`.
    pub fn instance_key(self) -> String {
        format!("hs{}", self.suffix())
    }

    /// Symbols for a list of kinds, ready for `autoInit`.
    pub fn symbols(kinds: &[ComponentKind]) -> Vec<&'static str> {
        kinds.iter().map(|k| k.symbol()).collect()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComponentKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .iter()
            .copied()
            .find(|k| k.symbol() == s)
            .ok_or_else(|| BridgeError::UnknownComponent(s.to_string()))
    }
}

impl TryFrom<String> for ComponentKind {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.symbol().to_string()
    }
}
