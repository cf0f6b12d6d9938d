//! Vite asset resolution
//!
//! Maps logical entry names to served URLs and renders the `<link>` /
//! `<script>` tags a page needs. Development builds serve straight from
//! `dist/assets`; production builds look names up in the Vite manifest.

use std::collections::BTreeMap;

use html_escape::encode_double_quoted_attribute;
use serde::{Deserialize, Serialize};

/// Entry of a Vite `manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default)]
    pub is_entry: bool,
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
}

pub type Manifest = BTreeMap<String, AssetEntry>;

pub const DEFAULT_ENTRY: &str = "assets/main.js";

#[derive(Debug, Clone)]
pub struct AssetResolver {
    manifest: Manifest,
    base_url: String,
    development: bool,
}

impl AssetResolver {
    pub fn new(base_url: &str, development: bool) -> Self {
        AssetResolver {
            manifest: Manifest::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            development,
        }
    }

    /// Replaces the manifest with the parsed contents of `json`.
    pub fn load_manifest(&mut self, json: &str) -> Result<(), serde_json::Error> {
        self.manifest = serde_json::from_str(json)?;
        Ok(())
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn asset_url(&self, entry: &str) -> String {
        if self.development {
            return format!("{}/dist/assets/{}", self.base_url, entry);
        }
        match self.manifest.get(entry) {
            Some(asset) => format!("{}/{}", self.base_url, asset.file),
            None => format!("{}/assets/{}", self.base_url, entry),
        }
    }

    pub fn css_links(&self, entry: &str) -> Vec<String> {
        if self.development {
            return vec![stylesheet(&self.asset_url("main.css"))];
        }
        self.manifest
            .get(entry)
            .map(|asset| {
                asset
                    .css
                    .iter()
                    .map(|css| stylesheet(&format!("{}/{}", self.base_url, css)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn js_script(&self, entry: &str) -> String {
        let src = if self.development {
            self.asset_url("main.js")
        } else {
            self.asset_url(entry)
        };
        format!(r#"<script type="module" src="{}"></script>"#, encode_double_quoted_attribute(&src))
    }

    /// Stylesheet links followed by the module script.
    pub fn asset_tags(&self, entry: &str) -> Vec<String> {
        let mut tags = self.css_links(entry);
        tags.push(self.js_script(entry));
        tags
    }

    pub fn default_asset_tags(&self) -> Vec<String> {
        self.asset_tags(DEFAULT_ENTRY)
    }
}

fn stylesheet(href: &str) -> String {
    format!(r#"<link rel="stylesheet" href="{}">"#, encode_double_quoted_attribute(href))
}
