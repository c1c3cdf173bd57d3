//! Per-category export preferences.
//!
//! The last-used taxonomy selection (space, type, template, tags) is
//! remembered per content category so repeat exports land where the
//! previous one did. Updates merge into the stored map, so one category's
//! selection never clobbers another's.
//!
//! Stored ids are advisory: at export time they are checked against
//! freshly fetched listings and fall back to the first available option
//! when stale. Tag ids are the exception; they pass through unvalidated
//! and simply fail to match during pre-selection when gone.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::model::{ObjectType, Space, Template};
use crate::selectors::Category;
use crate::storage::{KEY_EXPORT_ENABLED, KEY_PREFERENCES, Storage};

/// A remembered export target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Tag ids, deduplicated by construction.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tag_ids: BTreeSet<String>,
}

/// Durable store for per-category selections and the export flag.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    storage: Storage,
}

impl PreferenceStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Returns the stored selection for a category, if any.
    pub fn get(&self, category: Category) -> Result<Option<Selection>> {
        let map = self.load_map()?;
        Ok(map.get(category.key()).cloned())
    }

    /// Stores a category's selection, preserving every other category.
    pub fn set(&self, category: Category, selection: &Selection) -> Result<()> {
        let mut map = self.load_map()?;
        map.insert(category.key().to_string(), selection.clone());
        debug!(category = category.key(), "saving export preference");
        self.storage.set(KEY_PREFERENCES, &map)
    }

    /// Whether the export feature is switched on. Off until enabled.
    pub fn export_enabled(&self) -> Result<bool> {
        Ok(self.storage.get(KEY_EXPORT_ENABLED)?.unwrap_or(false))
    }

    /// Toggles the export feature flag.
    pub fn set_export_enabled(&self, enabled: bool) -> Result<()> {
        self.storage.set(KEY_EXPORT_ENABLED, &enabled)
    }

    fn load_map(&self) -> Result<BTreeMap<String, Selection>> {
        Ok(self.storage.get(KEY_PREFERENCES)?.unwrap_or_default())
    }
}

/// Picks the stored space from a fresh listing, falling back to the first
/// available one.
pub fn pick_space<'a>(spaces: &'a [Space], stored: Option<&str>) -> Option<&'a Space> {
    pick(spaces, stored, |s| &s.id)
}

/// Picks the stored type from a fresh listing, falling back to the first
/// available one.
pub fn pick_type<'a>(types: &'a [ObjectType], stored: Option<&str>) -> Option<&'a ObjectType> {
    pick(types, stored, |t| &t.id)
}

/// Keeps the stored template only while it still belongs to the fresh
/// listing; there is no first-template fallback because "no template" is a
/// valid choice.
pub fn pick_template<'a>(templates: &'a [Template], stored: Option<&str>) -> Option<&'a Template> {
    stored.and_then(|wanted| templates.iter().find(|t| t.id == wanted))
}

fn pick<'a, T>(items: &'a [T], stored: Option<&str>, id: impl Fn(&T) -> &str) -> Option<&'a T> {
    match stored {
        Some(wanted) => items.iter().find(|item| id(item) == wanted).or_else(|| items.first()),
        None => items.first(),
    }
}
