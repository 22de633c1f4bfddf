// crates/sync-engine/src/engine.rs
//! Sync orchestration
//!
//! One engine instance drives every registered source. `sync_all` walks
//! the sources sequentially; each source's cycle runs
//! fetch → diff → resolve → apply → persist → notify, with every external
//! call routed through the per-source rate limiter and the retry executor.

use crate::conflict::ConflictResolver;
use crate::diff::compute_diff;
use crate::error::{SyncError, SyncResult};
use crate::traits::{
    BookmarkStore, CheckpointStore, ItemProvider, Notification, NotificationKind,
    NotificationSink, SettingsStore,
};
use crate::types::{
    BookmarkUpdate, ItemCheckpoint, ResolutionStrategy, SourceConfig, SyncPhase, SyncReport,
    SyncSummary,
};
use chrono::Utc;
use log::{debug, info, warn};
use marksync_core::{SortOrder, WorkItem};
use marksync_resilience::{with_retry, with_timeout, RateLimitConfig, RateLimiter, RetryPolicy};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry policy applied to every external call
    pub retry_policy: RetryPolicy,
    /// Rate limit applied to sources without an explicit configuration
    pub rate_limit: RateLimitConfig,
    /// Per-attempt deadline for provider fetches
    pub fetch_timeout: Duration,
    /// Global default conflict strategy
    pub conflict_strategy: ResolutionStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::new(3),
            rate_limit: RateLimitConfig::default(),
            fetch_timeout: Duration::from_secs(30),
            conflict_strategy: ResolutionStrategy::RemoteWins,
        }
    }
}

/// External service objects threaded into the engine.
///
/// Exactly one engine (and one set of collaborators) exists per running
/// process; passing them explicitly keeps that property without ambient
/// globals.
#[derive(Clone)]
pub struct Collaborators {
    /// Translates raw API responses into normalized items
    pub provider: Arc<dyn ItemProvider>,
    /// Bookmark store primitives
    pub store: Arc<dyn BookmarkStore>,
    /// User settings
    pub settings: Arc<dyn SettingsStore>,
    /// Notification delivery
    pub notifier: Arc<dyn NotificationSink>,
    /// Persisted sync checkpoints
    pub checkpoints: Arc<dyn CheckpointStore>,
}

struct CycleOutcome {
    added: usize,
    updated: usize,
    deleted: usize,
}

/// The reconciliation control loop
pub struct SyncEngine {
    config: SyncConfig,
    collaborators: Collaborators,
    limiter: RateLimiter,
    resolver: ConflictResolver,
    sources: Mutex<Vec<SourceConfig>>,
    phases: Mutex<HashMap<String, SyncPhase>>,
}

impl SyncEngine {
    /// Creates an engine over the given collaborators
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Self {
        let limiter = RateLimiter::with_default_config(config.rate_limit.clone());
        let resolver = ConflictResolver::with_default_strategy(config.conflict_strategy);
        Self {
            config,
            collaborators,
            limiter,
            resolver,
            sources: Mutex::new(Vec::new()),
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a source, replacing any earlier registration with the
    /// same provider id
    pub fn register_source(&self, source: SourceConfig) {
        if let Ok(mut sources) = self.sources.lock() {
            if let Some(existing) = sources
                .iter_mut()
                .find(|s| s.provider_id == source.provider_id)
            {
                *existing = source;
            } else {
                sources.push(source);
            }
        }
    }

    /// Gets the conflict resolver for strategy overrides, manual
    /// resolution and statistics
    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Gets the per-source rate limiter for header reconciliation and the
    /// cleanup sweep
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Gets a source's current cycle phase
    pub fn phase(&self, provider_id: &str) -> SyncPhase {
        self.phases
            .lock()
            .map(|p| p.get(provider_id).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn set_phase(&self, provider_id: &str, phase: SyncPhase) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.insert(provider_id.to_string(), phase);
        }
    }

    /// Syncs every enabled, authenticated source, one at a time.
    ///
    /// A failure in one source's cycle is recorded in its report and does
    /// not stop the iteration.
    pub async fn sync_all(&self) -> SyncSummary {
        let sources = self
            .sources
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let mut summary = SyncSummary::default();
        for source in sources {
            if !source.enabled {
                debug!("skipping disabled source {}", source.provider_id);
                continue;
            }
            if !source.authenticated {
                debug!("skipping unauthenticated source {}", source.provider_id);
                continue;
            }
            let report = self.sync_provider(&source.provider_id).await;
            if report.success {
                summary.succeeded += 1;
            }
            summary.reports.push(report);
        }
        summary
    }

    /// Runs one source's sync cycle and reports the outcome.
    ///
    /// Errors never escape: any failure inside the cycle lands in
    /// `SyncReport::error`.
    pub async fn sync_provider(&self, provider_id: &str) -> SyncReport {
        let started = Instant::now();
        let result = self.run_cycle(provider_id).await;
        self.set_phase(provider_id, SyncPhase::Idle);
        let duration = started.elapsed();

        let report = match result {
            Ok(outcome) => {
                info!(
                    "synced {}: +{} ~{} -{} in {:?}",
                    provider_id, outcome.added, outcome.updated, outcome.deleted, duration
                );
                SyncReport {
                    provider_id: provider_id.to_string(),
                    success: true,
                    items_added: outcome.added,
                    items_updated: outcome.updated,
                    items_deleted: outcome.deleted,
                    error: None,
                    duration,
                }
            }
            Err(err) => {
                warn!("sync failed for {}: {}", provider_id, err);
                SyncReport::failure(provider_id, err.to_string(), duration)
            }
        };

        self.notify_outcome(&report).await;
        report
    }

    async fn notify_outcome(&self, report: &SyncReport) {
        let settings = self.collaborators.settings.notification_settings().await;
        if !settings.enabled {
            return;
        }

        let notification = if report.success {
            if !settings.notify_on_success {
                return;
            }
            Notification {
                kind: NotificationKind::Success,
                title: format!("Sync complete: {}", report.provider_id),
                message: format!(
                    "{} added, {} updated, {} removed",
                    report.items_added, report.items_updated, report.items_deleted
                ),
                provider_id: report.provider_id.clone(),
            }
        } else {
            if !settings.notify_on_error {
                return;
            }
            Notification {
                kind: NotificationKind::Failure,
                title: format!("Sync failed: {}", report.provider_id),
                message: report.error.clone().unwrap_or_default(),
                provider_id: report.provider_id.clone(),
            }
        };

        if let Err(err) = self.collaborators.notifier.notify(notification).await {
            debug!("notification delivery failed: {err}");
        }
    }

    async fn run_cycle(&self, provider_id: &str) -> SyncResult<CycleOutcome> {
        let source = self
            .source(provider_id)
            .ok_or_else(|| SyncError::Validation(format!("unknown source: {provider_id}")))?;
        let folder_id = source.folder_id.clone().ok_or_else(|| {
            SyncError::Validation(format!("no folder configured for {provider_id}"))
        })?;

        let folder = self
            .collaborators
            .store
            .get_folder(&folder_id)
            .await?
            .ok_or_else(|| {
                SyncError::Validation(format!("folder {folder_id} no longer exists"))
            })?;

        self.set_phase(provider_id, SyncPhase::Fetching);
        let mut items = {
            let provider = Arc::clone(&self.collaborators.provider);
            let timeout = self.config.fetch_timeout;
            let pid = provider_id.to_string();
            self.guarded(provider_id, move || {
                let provider = Arc::clone(&provider);
                let pid = pid.clone();
                async move {
                    match with_timeout(timeout, provider.fetch_items(&pid)).await {
                        Ok(result) => result,
                        Err(err) => Err(err.into()),
                    }
                }
            })
            .await?
        };

        let source_settings = self
            .collaborators
            .settings
            .source_settings(provider_id)
            .await;
        if !source_settings.filters.is_empty() {
            items.retain(|item| source_settings.filters.matches(item));
        }

        self.set_phase(provider_id, SyncPhase::Diffing);
        let local = self
            .collaborators
            .store
            .get_folder_contents(&folder_id)
            .await?;
        let diff = compute_diff(&local, &items);
        debug!(
            "diff for {}: {} add, {} update, {} delete",
            provider_id,
            diff.to_add.len(),
            diff.to_update.len(),
            diff.to_delete.len()
        );

        let diff_is_empty = diff.is_empty();
        let updates = self.resolve_updates(provider_id, diff.to_update).await?;

        self.set_phase(provider_id, SyncPhase::Applying);
        // Delete before update before add: frees space first and avoids
        // transient duplicate-looking states.
        if !diff.to_delete.is_empty() {
            let store = Arc::clone(&self.collaborators.store);
            let ids = diff.to_delete.clone();
            self.guarded(provider_id, move || {
                let store = Arc::clone(&store);
                let ids = ids.clone();
                async move { store.batch_delete(&ids).await }
            })
            .await?;
        }

        if !updates.is_empty() {
            let store = Arc::clone(&self.collaborators.store);
            let batch = updates.clone();
            self.guarded(provider_id, move || {
                let store = Arc::clone(&store);
                let batch = batch.clone();
                async move { store.batch_update(&batch).await }
            })
            .await?;
        }

        let created_ids = if !diff.to_add.is_empty() {
            let store = Arc::clone(&self.collaborators.store);
            let folder = folder_id.clone();
            let additions = diff.to_add.clone();
            let sort_order = source_settings.sort_order;
            self.guarded(provider_id, move || {
                let store = Arc::clone(&store);
                let folder = folder.clone();
                let additions = additions.clone();
                async move { store.batch_create(&folder, &additions, sort_order).await }
            })
            .await?
        } else {
            Vec::new()
        };

        if !diff_is_empty {
            let ordered = sort_items(&items, source_settings.sort_order);
            let store = Arc::clone(&self.collaborators.store);
            let folder_for_reorder = folder_id.clone();
            let sort_order = source_settings.sort_order;
            self.guarded(provider_id, move || {
                let store = Arc::clone(&store);
                let folder = folder_for_reorder.clone();
                let ordered = ordered.clone();
                async move { store.reorder_folder(&folder, &ordered, sort_order).await }
            })
            .await?;

            let expected_title = folder_title(&folder.title, items.len());
            if expected_title != folder.title {
                let store = Arc::clone(&self.collaborators.store);
                let folder_node = folder_id.clone();
                let title = expected_title.clone();
                self.guarded(provider_id, move || {
                    let store = Arc::clone(&store);
                    let folder_node = folder_node.clone();
                    let title = title.clone();
                    async move { store.update_bookmark(&folder_node, &title).await }
                })
                .await?;
            }
        }

        self.set_phase(provider_id, SyncPhase::Persisting);
        let now = Utc::now();
        for (item, bookmark_id) in diff.to_add.iter().zip(created_ids.iter()) {
            self.collaborators
                .checkpoints
                .set_item_checkpoint(
                    provider_id,
                    &item.id,
                    ItemCheckpoint {
                        bookmark_id: bookmark_id.clone(),
                        created_at: now,
                        updated_at: now,
                        last_modified: item.last_modified,
                    },
                )
                .await?;
        }
        for update in &updates {
            let created_at = self
                .collaborators
                .checkpoints
                .item_checkpoint(provider_id, &update.new.id)
                .await?
                .map(|cp| cp.created_at)
                .unwrap_or(now);
            self.collaborators
                .checkpoints
                .set_item_checkpoint(
                    provider_id,
                    &update.new.id,
                    ItemCheckpoint {
                        bookmark_id: update.bookmark_id.clone(),
                        created_at,
                        updated_at: now,
                        last_modified: update.new.last_modified,
                    },
                )
                .await?;
        }
        self.collaborators
            .checkpoints
            .set_last_sync(provider_id, now)
            .await?;

        Ok(CycleOutcome {
            added: diff.to_add.len(),
            updated: updates.len(),
            deleted: diff.to_delete.len(),
        })
    }

    /// Runs the diff-time conflict pass over the pending updates.
    ///
    /// Each pair is checked against the locally-known snapshot; resolved
    /// winners replace the incoming item, and manual-strategy conflicts
    /// withhold only their own update while the rest of the diff proceeds.
    async fn resolve_updates(
        &self,
        provider_id: &str,
        pending: Vec<BookmarkUpdate>,
    ) -> SyncResult<Vec<BookmarkUpdate>> {
        let mut updates = Vec::with_capacity(pending.len());
        let mut withheld = 0usize;

        for update in pending {
            let local_snapshot = self.local_snapshot(provider_id, &update).await?;
            let conflict = self.resolver.detect_conflict(
                Some(&local_snapshot),
                Some(&update.new),
                provider_id,
            );

            match conflict {
                None => updates.push(update),
                Some(conflict) => {
                    let resolution = self.resolver.resolve_conflict(&conflict)?;
                    if resolution.requires_user_confirmation {
                        withheld += 1;
                        debug!(
                            "withholding update for {} pending manual resolution",
                            conflict.id
                        );
                        continue;
                    }
                    if let Some(resolved) = resolution.resolved {
                        if resolved.title != update.old.title {
                            updates.push(BookmarkUpdate {
                                bookmark_id: update.bookmark_id,
                                old: update.old,
                                new: resolved,
                            });
                        }
                    }
                }
            }
        }

        if withheld > 0 {
            info!(
                "{withheld} update(s) for {provider_id} withheld pending manual resolution"
            );
        }
        Ok(updates)
    }

    /// Builds the locally-known snapshot for a pending update: the
    /// bookmark's title and URL plus the checkpointed `last_modified`.
    async fn local_snapshot(
        &self,
        provider_id: &str,
        update: &BookmarkUpdate,
    ) -> SyncResult<WorkItem> {
        let mut snapshot = WorkItem::new(
            provider_id,
            update.new.id.clone(),
            update.old.title.clone(),
            update.old.url.clone(),
        );
        if let Some(checkpoint) = self
            .collaborators
            .checkpoints
            .item_checkpoint(provider_id, &update.new.id)
            .await?
        {
            snapshot.last_modified = checkpoint.last_modified;
        }
        Ok(snapshot)
    }

    /// Routes an operation through the source's rate limiter and the
    /// engine's retry policy. Every attempt re-clears the limiter.
    async fn guarded<T, F, Fut>(&self, provider_id: &str, mut operation: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let limiter = self.limiter.clone();
        let pid = provider_id.to_string();
        with_retry(&self.config.retry_policy, move || {
            let limiter = limiter.clone();
            let pid = pid.clone();
            let attempt = operation();
            async move { limiter.execute(&pid, || attempt).await }
        })
        .await
    }

    fn source(&self, provider_id: &str) -> Option<SourceConfig> {
        self.sources
            .lock()
            .ok()?
            .iter()
            .find(|s| s.provider_id == provider_id)
            .cloned()
    }
}

/// Orders items for folder presentation: alphabetical ascending, or most
/// recently created/updated first.
fn sort_items(items: &[WorkItem], order: SortOrder) -> Vec<WorkItem> {
    let mut sorted = items.to_vec();
    match order {
        SortOrder::Alphabetical => {
            sorted.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        }
        SortOrder::CreatedAt => {
            sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        SortOrder::UpdatedAt => {
            sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
    }
    sorted
}

/// Computes the dynamic folder title: the base name with the current item
/// count appended.
fn folder_title(current_title: &str, count: usize) -> String {
    format!("{} ({count})", strip_count_suffix(current_title))
}

fn strip_count_suffix(title: &str) -> &str {
    if let Some(idx) = title.rfind(" (") {
        let rest = &title[idx + 2..];
        if let Some(digits) = rest.strip_suffix(')') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return &title[..idx];
            }
        }
    }
    title
}
