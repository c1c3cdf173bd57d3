//! Export orchestration.
//!
//! The controller ties the client and the preference store together and
//! owns the glue the popup-style UIs usually hide in event handlers:
//! explicit single-flight guards per operation class, the pairing session
//! lifecycle, taxonomy resolution against fresh listings, default titles,
//! and the sequential batch loop with its fixed inter-request delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{AnytypeClient, validate_pairing_code};
use crate::extract::{ExtractConfig, extract};
use crate::model::{ContentBlock, CreateObjectRequest, ObjectProperty, PairingSession};
use crate::preferences::{PreferenceStore, Selection, pick_space, pick_template, pick_type};
use crate::selectors::Category;
use crate::{ExcerpoError, Result};

/// Property key tags are assigned under at object creation.
pub const TAG_PROPERTY_KEY: &str = "tag";

/// Pause between object creations in a batch, so a burst of exports does
/// not overwhelm the local service.
pub const BATCH_DELAY: Duration = Duration::from_millis(500);

/// Maximum characters of a generated default title.
const TITLE_LIMIT: usize = 100;

/// In-flight flag for one operation class.
///
/// Replaces the disable-the-button convention: a concurrent trigger is
/// rejected deterministically with [`ExcerpoError::Busy`] instead of being
/// silently possible.
struct FlightGuard {
    operation: &'static str,
    in_flight: AtomicBool,
}

impl FlightGuard {
    fn new(operation: &'static str) -> Self {
        Self { operation, in_flight: AtomicBool::new(false) }
    }

    fn begin(&self) -> Result<FlightPermit<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ExcerpoError::Busy(self.operation));
        }
        Ok(FlightPermit { guard: self })
    }
}

struct FlightPermit<'a> {
    guard: &'a FlightGuard,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

/// The resolved destination of an export: where objects go once stored
/// preferences have been validated against fresh listings.
#[derive(Debug, Clone)]
pub struct ExportDestination {
    pub space_id: String,
    pub type_id: String,
    pub type_key: String,
    pub template_id: Option<String>,
    pub tag_ids: Vec<String>,
}

/// The payload assembled immediately before object creation.
///
/// Ephemeral: built per block, consumed by the request, never persisted.
#[derive(Debug, Clone)]
pub struct ExportTarget {
    pub object_name: String,
    pub type_key: String,
    pub body_markdown: String,
    pub template_id: Option<String>,
    pub tag_property_key: Option<String>,
    pub tag_ids: Vec<String>,
}

impl ExportTarget {
    fn into_request(self) -> CreateObjectRequest {
        let properties = match self.tag_property_key {
            Some(key) if !self.tag_ids.is_empty() => {
                Some(vec![ObjectProperty { key, multi_select: self.tag_ids }])
            }
            _ => None,
        };

        CreateObjectRequest {
            name: self.object_name,
            type_key: self.type_key,
            body: self.body_markdown,
            template_id: self.template_id,
            properties,
        }
    }
}

/// Outcome of a batch export.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    /// Failed items as `(block index, error message)`.
    pub failures: Vec<(usize, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} exported", self.succeeded, self.total)
    }
}

/// Top-level controller for clipping and export.
///
/// All collaborators are injected; nothing here is ambient state.
pub struct ExportController {
    client: AnytypeClient,
    preferences: PreferenceStore,
    pairing_session: Option<PairingSession>,
    extraction_guard: FlightGuard,
    pairing_guard: FlightGuard,
    export_guard: FlightGuard,
}

impl ExportController {
    pub fn new(client: AnytypeClient, preferences: PreferenceStore) -> Self {
        Self {
            client,
            preferences,
            pairing_session: None,
            extraction_guard: FlightGuard::new("extraction"),
            pairing_guard: FlightGuard::new("pairing"),
            export_guard: FlightGuard::new("export"),
        }
    }

    pub fn client(&self) -> &AnytypeClient {
        &self.client
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Extracts content blocks from a page, guarded as one operation.
    pub fn clip(&self, html: &str, category: Category, config: &ExtractConfig) -> Result<Vec<ContentBlock>> {
        let _permit = self.extraction_guard.begin()?;
        extract(html, category, config)
    }

    /// Starts the pairing flow by requesting a challenge.
    ///
    /// The session is held until [`finish_pairing`](Self::finish_pairing)
    /// or [`cancel_pairing`](Self::cancel_pairing); a second start while
    /// one is open is rejected.
    pub async fn begin_pairing(&mut self) -> Result<()> {
        let _permit = self.pairing_guard.begin()?;
        if self.pairing_session.is_some() {
            return Err(ExcerpoError::Busy("pairing"));
        }

        let session = self.client.start_pairing().await?;
        self.pairing_session = Some(session);
        info!("pairing started, waiting for display code");
        Ok(())
    }

    /// Completes the pairing flow with the code shown by the application.
    ///
    /// The session survives a failed attempt so the user can retry the
    /// code; it is consumed on success.
    pub async fn finish_pairing(&mut self, code: &str) -> Result<()> {
        let _permit = self.pairing_guard.begin()?;
        let session = self
            .pairing_session
            .take()
            .ok_or_else(|| ExcerpoError::Validation("no pairing in progress".into()))?;

        if let Err(err) = validate_pairing_code(code) {
            self.pairing_session = Some(session);
            return Err(err);
        }

        match self.client.complete_pairing(&session, code.trim()).await {
            Ok(()) => {
                info!("pairing completed");
                Ok(())
            }
            Err(err) => {
                self.pairing_session = Some(session);
                Err(err)
            }
        }
    }

    /// Discards the in-memory pairing session, if any.
    ///
    /// Requests already sent are not retracted.
    pub fn cancel_pairing(&mut self) {
        if self.pairing_session.take().is_some() {
            debug!("pairing cancelled");
        }
    }

    pub fn pairing_in_progress(&self) -> bool {
        self.pairing_session.is_some()
    }

    /// Resolves a category's export destination.
    ///
    /// The stored selection is validated against fresh listings: a stale
    /// space or type falls back to the first available one, a stale
    /// template is dropped (no-template is a valid choice), tag ids pass
    /// through. The resolved selection is persisted back so the next
    /// export starts from it.
    pub async fn resolve_destination(&self, category: Category) -> Result<ExportDestination> {
        let stored = self.preferences.get(category)?.unwrap_or_default();

        let spaces = self.client.list_spaces().await?;
        let space = pick_space(&spaces, stored.space_id.as_deref())
            .ok_or_else(|| ExcerpoError::Validation("no spaces available".into()))?;

        let types = self.client.list_types(&space.id).await?;
        let object_type = pick_type(&types, stored.type_id.as_deref())
            .ok_or_else(|| ExcerpoError::Validation("no object types available".into()))?;

        let templates = self.client.list_templates(&space.id, &object_type.id).await?;
        let template = pick_template(&templates, stored.template_id.as_deref());

        let destination = ExportDestination {
            space_id: space.id.clone(),
            type_id: object_type.id.clone(),
            type_key: object_type.key.clone().unwrap_or_else(|| object_type.id.clone()),
            template_id: template.map(|t| t.id.clone()),
            tag_ids: stored.tag_ids.iter().cloned().collect(),
        };

        self.preferences.set(
            category,
            &Selection {
                space_id: Some(destination.space_id.clone()),
                type_id: Some(destination.type_id.clone()),
                template_id: destination.template_id.clone(),
                tag_ids: destination.tag_ids.iter().cloned().collect(),
            },
        )?;

        debug!(space = %destination.space_id, type_id = %destination.type_id, "destination resolved");
        Ok(destination)
    }

    /// Exports one block to the resolved destination.
    pub async fn export_block(
        &self,
        block: &ContentBlock,
        destination: &ExportDestination,
        title_override: Option<&str>,
    ) -> Result<Value> {
        let target = build_target(block, destination, title_override)?;
        self.client.create_object(&destination.space_id, &target.into_request()).await
    }

    /// Exports blocks sequentially, pausing [`BATCH_DELAY`] between items.
    ///
    /// A failing item is recorded and the loop continues; the report gives
    /// the success count out of the total. `Unauthorized` is the exception:
    /// the credential is gone, every remaining item would fail identically,
    /// so it aborts the batch and propagates for a guided re-pairing.
    pub async fn export_batch(
        &self,
        blocks: &[ContentBlock],
        destination: &ExportDestination,
        title_override: Option<&str>,
    ) -> Result<BatchReport> {
        let _permit = self.export_guard.begin()?;

        let mut report = BatchReport { total: blocks.len(), succeeded: 0, failures: Vec::new() };
        for (index, block) in blocks.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            match self.export_block(block, destination, title_override).await {
                Ok(_) => report.succeeded += 1,
                Err(ExcerpoError::Unauthorized) => return Err(ExcerpoError::Unauthorized),
                Err(err) => {
                    warn!(index, error = %err, "batch item failed");
                    report.failures.push((index, err.to_string()));
                }
            }
        }

        info!(%report, "batch export finished");
        Ok(report)
    }
}

fn build_target(
    block: &ContentBlock,
    destination: &ExportDestination,
    title_override: Option<&str>,
) -> Result<ExportTarget> {
    let name = match title_override {
        Some(title) => title.trim().to_string(),
        None if !block.title.trim().is_empty() => block.title.trim().to_string(),
        None => default_title(&block.content),
    };

    if name.is_empty() {
        return Err(ExcerpoError::Validation("a title is required".into()));
    }

    let tag_property_key = if destination.tag_ids.is_empty() { None } else { Some(TAG_PROPERTY_KEY.to_string()) };

    Ok(ExportTarget {
        object_name: name,
        type_key: destination.type_key.clone(),
        body_markdown: block.content.clone(),
        template_id: destination.template_id.clone(),
        tag_property_key,
        tag_ids: destination.tag_ids.clone(),
    })
}

/// Derives an object title from Markdown content.
///
/// The first `# ` heading wins; otherwise the first non-empty line that is
/// not a heading, capped at 100 characters; otherwise `"Untitled"`.
pub fn default_title(markdown: &str) -> String {
    for line in markdown.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            return heading.trim().to_string();
        }
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            return trimmed.chars().take(TITLE_LIMIT).collect();
        }
    }
    "Untitled".to_string()
}
