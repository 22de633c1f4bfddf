// crates/sync-engine/src/conflict.rs
//! Conflict detection and resolution
//!
//! When both a local and a remote snapshot of the same logical item exist
//! and disagree, the detector classifies the disagreement and the resolver
//! applies a configurable strategy, or defers to manual resolution.

use crate::error::{SyncError, SyncResult};
use crate::types::{
    Conflict, ConflictKind, ConflictResolution, ConflictStats, ManualChoice, ResolutionStrategy,
};
use chrono::Utc;
use marksync_core::WorkItem;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Registry {
    conflicts: HashMap<String, Conflict>,
    provider_strategies: HashMap<String, ResolutionStrategy>,
    default_strategy: ResolutionStrategy,
    stats: ConflictStats,
}

/// Manages conflict detection and resolution
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    registry: Arc<Mutex<Registry>>,
}

impl ConflictResolver {
    /// Creates a resolver with the `RemoteWins` default strategy
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with a custom default strategy
    pub fn with_default_strategy(strategy: ResolutionStrategy) -> Self {
        let resolver = Self::new();
        resolver.set_default_strategy(strategy);
        resolver
    }

    /// Replaces the global default strategy
    pub fn set_default_strategy(&self, strategy: ResolutionStrategy) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.default_strategy = strategy;
        }
    }

    /// Overrides the strategy for one source
    pub fn set_provider_strategy(&self, provider_id: &str, strategy: ResolutionStrategy) {
        if let Ok(mut registry) = self.registry.lock() {
            registry
                .provider_strategies
                .insert(provider_id.to_string(), strategy);
        }
    }

    /// Compares two snapshots of the same logical item and records a
    /// conflict when they disagree.
    ///
    /// No conflict is produced when either side is absent, when the sides
    /// agree on every compared field, or when only `last_modified` differs
    /// (timestamp drift alone is not a conflict). Detection is
    /// deterministic: the same pair always classifies the same way, and
    /// re-detection overwrites the registry entry instead of duplicating it.
    pub fn detect_conflict(
        &self,
        local: Option<&WorkItem>,
        remote: Option<&WorkItem>,
        provider_id: &str,
    ) -> Option<Conflict> {
        let (local, remote) = match (local, remote) {
            (Some(l), Some(r)) => (l, r),
            _ => return None,
        };

        let kind = Self::classify(local, remote)?;
        let conflict = Conflict {
            id: Conflict::make_id(provider_id, &remote.id),
            kind,
            local: local.clone(),
            remote: remote.clone(),
            provider_id: provider_id.to_string(),
            detected_at: Utc::now(),
        };

        let mut registry = self.registry.lock().ok()?;
        registry.stats.total += 1;
        *registry
            .stats
            .by_provider
            .entry(provider_id.to_string())
            .or_insert(0) += 1;
        *registry.stats.by_kind.entry(kind).or_insert(0) += 1;
        registry
            .conflicts
            .insert(conflict.id.clone(), conflict.clone());

        Some(conflict)
    }

    fn classify(local: &WorkItem, remote: &WorkItem) -> Option<ConflictKind> {
        if local.title != remote.title {
            return Some(ConflictKind::Metadata);
        }
        if local.url != remote.url {
            return Some(ConflictKind::UrlMismatch);
        }
        if local.description != remote.description || local.metadata != remote.metadata {
            return Some(ConflictKind::Metadata);
        }
        None
    }

    /// Resolves a conflict using the source's strategy (or the global
    /// default).
    ///
    /// Non-manual strategies remove the conflict from the unresolved
    /// registry; the manual strategy leaves it there until
    /// [`resolve_manually`](Self::resolve_manually) is called.
    pub fn resolve_conflict(&self, conflict: &Conflict) -> SyncResult<ConflictResolution> {
        let strategy = {
            let registry = self
                .registry
                .lock()
                .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))?;
            registry
                .provider_strategies
                .get(&conflict.provider_id)
                .copied()
                .unwrap_or(registry.default_strategy)
        };

        let resolution = match strategy {
            ResolutionStrategy::RemoteWins => ConflictResolution {
                strategy,
                resolved: Some(conflict.remote.clone()),
                requires_user_confirmation: false,
            },
            ResolutionStrategy::LocalWins => ConflictResolution {
                strategy,
                resolved: Some(conflict.local.clone()),
                requires_user_confirmation: false,
            },
            ResolutionStrategy::NewestWins => {
                // Remote wins ties and missing timestamps.
                let winner = if conflict.local.is_newer_than(&conflict.remote) {
                    conflict.local.clone()
                } else {
                    conflict.remote.clone()
                };
                ConflictResolution {
                    strategy,
                    resolved: Some(winner),
                    requires_user_confirmation: false,
                }
            }
            ResolutionStrategy::Merge => ConflictResolution {
                strategy,
                resolved: Some(Self::merge(&conflict.local, &conflict.remote)),
                requires_user_confirmation: false,
            },
            ResolutionStrategy::Manual => {
                return Ok(ConflictResolution {
                    strategy,
                    resolved: None,
                    requires_user_confirmation: true,
                });
            }
        };

        let mut registry = self
            .registry
            .lock()
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))?;
        registry.conflicts.remove(&conflict.id);

        Ok(resolution)
    }

    /// Takes the newer snapshot's scalar fields and fills anything absent
    /// on the winner from the loser.
    fn merge(local: &WorkItem, remote: &WorkItem) -> WorkItem {
        let (winner, loser) = if local.is_newer_than(remote) {
            (local, remote)
        } else {
            (remote, local)
        };

        let mut merged = winner.clone();
        if merged.description.is_none() {
            merged.description = loser.description.clone();
        }
        if merged.created_at.is_none() {
            merged.created_at = loser.created_at;
        }
        if merged.updated_at.is_none() {
            merged.updated_at = loser.updated_at;
        }
        if merged.last_modified.is_none() {
            merged.last_modified = loser.last_modified;
        }
        for (key, value) in &loser.metadata {
            merged
                .metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        merged
    }

    /// Applies a user decision to a manually-deferred conflict, removing it
    /// from the unresolved registry.
    pub fn resolve_manually(
        &self,
        conflict_id: &str,
        choice: ManualChoice,
    ) -> SyncResult<ConflictResolution> {
        let mut registry = self
            .registry
            .lock()
            .map_err(|_| SyncError::Custom("Lock poisoned".to_string()))?;

        let conflict = registry
            .conflicts
            .remove(conflict_id)
            .ok_or_else(|| SyncError::Custom(format!("Conflict not found: {conflict_id}")))?;

        let resolved = match choice {
            ManualChoice::KeepLocal => conflict.local,
            ManualChoice::KeepRemote => conflict.remote,
            ManualChoice::Custom(item) => item,
        };

        Ok(ConflictResolution {
            strategy: ResolutionStrategy::Manual,
            resolved: Some(resolved),
            requires_user_confirmation: false,
        })
    }

    /// Gets all conflicts still awaiting resolution
    pub fn unresolved_conflicts(&self) -> Vec<Conflict> {
        self.registry
            .lock()
            .map(|r| r.conflicts.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Gets the number of unresolved conflicts
    pub fn unresolved_count(&self) -> usize {
        self.registry.lock().map(|r| r.conflicts.len()).unwrap_or(0)
    }

    /// Gets the unresolved conflicts belonging to one source
    pub fn provider_conflicts(&self, provider_id: &str) -> Vec<Conflict> {
        self.registry
            .lock()
            .map(|r| {
                r.conflicts
                    .values()
                    .filter(|c| c.provider_id == provider_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Gets the detection counters
    pub fn stats(&self) -> ConflictStats {
        self.registry
            .lock()
            .map(|r| r.stats.clone())
            .unwrap_or_default()
    }

    /// Empties the registry and counters. Used at session boundaries.
    pub fn clear(&self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.conflicts.clear();
            registry.stats = ConflictStats::default();
        }
    }
}
