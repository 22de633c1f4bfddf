// crates/sync-engine/tests/sync_tests.rs
//! Integration tests for the sync engine, driven through in-memory
//! collaborator mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marksync_core::{BookmarkFolder, LocalBookmark, SortOrder, WorkItem};
use marksync_resilience::RetryPolicy;
use marksync_sync_engine::{
    Collaborators, ItemCheckpoint, ManualChoice, ResolutionStrategy, SourceConfig, SyncConfig,
    SyncEngine, SyncError, SyncPhase, SyncResult,
};
use marksync_sync_engine::{
    BookmarkStore, CheckpointStore, ItemProvider, Notification, NotificationKind,
    NotificationSettings, NotificationSink, SettingsStore, SourceSettings,
};
use marksync_sync_engine::BookmarkUpdate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockProvider {
    items: Mutex<HashMap<String, Vec<WorkItem>>>,
    transient_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockProvider {
    fn set_items(&self, provider_id: &str, items: Vec<WorkItem>) {
        self.items
            .lock()
            .unwrap()
            .insert(provider_id.to_string(), items);
    }

    fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemProvider for MockProvider {
    async fn fetch_items(&self, provider_id: &str) -> SyncResult<Vec<WorkItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.transient_failures.load(Ordering::SeqCst) > 0 {
            self.transient_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::Http {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        self.items
            .lock()
            .unwrap()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| SyncError::Network(format!("no upstream for {provider_id}")))
    }
}

#[derive(Default)]
struct MockStore {
    folders: Mutex<HashMap<String, BookmarkFolder>>,
    contents: Mutex<HashMap<String, Vec<LocalBookmark>>>,
    next_id: AtomicUsize,
    mutations: AtomicUsize,
}

impl MockStore {
    fn add_folder(&self, id: &str, title: &str) {
        self.folders
            .lock()
            .unwrap()
            .insert(id.to_string(), BookmarkFolder::new(id, title));
        self.contents
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default();
    }

    fn seed_bookmark(&self, folder_id: &str, url: &str, title: &str) -> String {
        let id = format!("bm-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.contents
            .lock()
            .unwrap()
            .entry(folder_id.to_string())
            .or_default()
            .push(LocalBookmark::new(id.clone(), url, title));
        id
    }

    fn folder_contents(&self, folder_id: &str) -> Vec<LocalBookmark> {
        self.contents
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .unwrap_or_default()
    }

    fn folder_title(&self, folder_id: &str) -> String {
        self.folders.lock().unwrap()[folder_id].title.clone()
    }

    fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookmarkStore for MockStore {
    async fn get_folder(&self, folder_id: &str) -> SyncResult<Option<BookmarkFolder>> {
        Ok(self.folders.lock().unwrap().get(folder_id).cloned())
    }

    async fn get_folder_contents(&self, folder_id: &str) -> SyncResult<Vec<LocalBookmark>> {
        Ok(self.folder_contents(folder_id))
    }

    async fn batch_create(
        &self,
        folder_id: &str,
        items: &[WorkItem],
        _sort_order: SortOrder,
    ) -> SyncResult<Vec<String>> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut contents = self.contents.lock().unwrap();
        let folder = contents.entry(folder_id.to_string()).or_default();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = format!("bm-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            folder.push(LocalBookmark::new(id.clone(), &item.url, &item.title));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn batch_update(&self, updates: &[BookmarkUpdate]) -> SyncResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut contents = self.contents.lock().unwrap();
        for update in updates {
            for folder in contents.values_mut() {
                if let Some(bookmark) = folder
                    .iter_mut()
                    .find(|b| b.bookmark_id == update.bookmark_id)
                {
                    bookmark.title = update.new.title.clone();
                    bookmark.url = update.new.url.clone();
                }
            }
        }
        Ok(())
    }

    async fn batch_delete(&self, bookmark_ids: &[String]) -> SyncResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut contents = self.contents.lock().unwrap();
        for folder in contents.values_mut() {
            folder.retain(|b| !bookmark_ids.contains(&b.bookmark_id));
        }
        Ok(())
    }

    async fn reorder_folder(
        &self,
        folder_id: &str,
        items: &[WorkItem],
        _sort_order: SortOrder,
    ) -> SyncResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut contents = self.contents.lock().unwrap();
        if let Some(folder) = contents.get_mut(folder_id) {
            let rank: HashMap<&str, usize> = items
                .iter()
                .enumerate()
                .map(|(i, item)| (item.url.as_str(), i))
                .collect();
            folder.sort_by_key(|b| rank.get(b.url.as_str()).copied().unwrap_or(usize::MAX));
        }
        Ok(())
    }

    async fn update_bookmark(&self, bookmark_id: &str, title: &str) -> SyncResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if let Some(folder) = self.folders.lock().unwrap().get_mut(bookmark_id) {
            folder.title = title.to_string();
            return Ok(());
        }
        let mut contents = self.contents.lock().unwrap();
        for folder in contents.values_mut() {
            if let Some(bookmark) = folder.iter_mut().find(|b| b.bookmark_id == bookmark_id) {
                bookmark.title = title.to_string();
            }
        }
        Ok(())
    }
}

struct MockSettings {
    notifications: Mutex<NotificationSettings>,
    sources: Mutex<HashMap<String, SourceSettings>>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            notifications: Mutex::new(NotificationSettings::default()),
            sources: Mutex::new(HashMap::new()),
        }
    }
}

impl MockSettings {
    fn set_notifications(&self, settings: NotificationSettings) {
        *self.notifications.lock().unwrap() = settings;
    }
}

#[async_trait]
impl SettingsStore for MockSettings {
    async fn notification_settings(&self) -> NotificationSettings {
        *self.notifications.lock().unwrap()
    }

    async fn source_settings(&self, provider_id: &str) -> SourceSettings {
        self.sources
            .lock()
            .unwrap()
            .get(provider_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct MockNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn notify(&self, notification: Notification) -> SyncResult<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
struct MockCheckpoints {
    last_sync: Mutex<HashMap<String, DateTime<Utc>>>,
    items: Mutex<HashMap<(String, String), ItemCheckpoint>>,
}

#[async_trait]
impl CheckpointStore for MockCheckpoints {
    async fn last_sync(&self, provider_id: &str) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self.last_sync.lock().unwrap().get(provider_id).copied())
    }

    async fn set_last_sync(&self, provider_id: &str, at: DateTime<Utc>) -> SyncResult<()> {
        self.last_sync
            .lock()
            .unwrap()
            .insert(provider_id.to_string(), at);
        Ok(())
    }

    async fn item_checkpoint(
        &self,
        provider_id: &str,
        item_id: &str,
    ) -> SyncResult<Option<ItemCheckpoint>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&(provider_id.to_string(), item_id.to_string()))
            .cloned())
    }

    async fn set_item_checkpoint(
        &self,
        provider_id: &str,
        item_id: &str,
        checkpoint: ItemCheckpoint,
    ) -> SyncResult<()> {
        self.items
            .lock()
            .unwrap()
            .insert((provider_id.to_string(), item_id.to_string()), checkpoint);
        Ok(())
    }
}

struct Fixture {
    engine: SyncEngine,
    provider: Arc<MockProvider>,
    store: Arc<MockStore>,
    notifier: Arc<MockNotifier>,
    checkpoints: Arc<MockCheckpoints>,
    settings: Arc<MockSettings>,
}

fn fixture_with_strategy(strategy: ResolutionStrategy) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let provider = Arc::new(MockProvider::default());
    let store = Arc::new(MockStore::default());
    let settings = Arc::new(MockSettings::default());
    let notifier = Arc::new(MockNotifier::default());
    let checkpoints = Arc::new(MockCheckpoints::default());

    let config = SyncConfig {
        retry_policy: RetryPolicy::new(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false),
        fetch_timeout: Duration::from_secs(5),
        conflict_strategy: strategy,
        ..Default::default()
    };

    let engine = SyncEngine::new(
        config,
        Collaborators {
            provider: provider.clone(),
            store: store.clone(),
            settings: settings.clone(),
            notifier: notifier.clone(),
            checkpoints: checkpoints.clone(),
        },
    );

    Fixture {
        engine,
        provider,
        store,
        notifier,
        checkpoints,
        settings,
    }
}

fn fixture() -> Fixture {
    fixture_with_strategy(ResolutionStrategy::RemoteWins)
}

#[tokio::test]
async fn test_end_to_end_title_update_and_add() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.store
        .seed_bookmark("folder-1", "https://x/1", "#1 open");
    f.provider.set_items(
        "github",
        vec![
            WorkItem::new("github", "1", "#1 closed", "https://x/1"),
            WorkItem::new("github", "2", "#2 open", "https://x/2"),
        ],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(report.success, "error: {:?}", report.error);
    assert_eq!(report.items_added, 1);
    assert_eq!(report.items_updated, 1);
    assert_eq!(report.items_deleted, 0);

    let mut titles: Vec<String> = f
        .store
        .folder_contents("folder-1")
        .into_iter()
        .map(|b| b.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["#1 closed".to_string(), "#2 open".to_string()]);

    // The cycle left the source idle and consumed rate-limit slots.
    assert_eq!(f.engine.phase("github"), SyncPhase::Idle);
    let status = f.engine.rate_limiter().status("github");
    assert!(status.remaining < status.limit);
}

#[tokio::test]
async fn test_empty_diff_performs_no_store_mutations() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.store
        .seed_bookmark("folder-1", "https://x/1", "#1 open");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "1", "#1 open", "https://x/1")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(report.success);
    assert_eq!(report.items_added + report.items_updated + report.items_deleted, 0);
    assert_eq!(f.store.mutation_count(), 0);
}

#[tokio::test]
async fn test_removed_items_are_deleted() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.store.seed_bookmark("folder-1", "https://x/1", "#1 open");
    f.store.seed_bookmark("folder-1", "https://x/2", "#2 open");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "2", "#2 open", "https://x/2")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(report.success);
    assert_eq!(report.items_deleted, 1);
    let contents = f.store.folder_contents("folder-1");
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0].url, "https://x/2");
}

#[tokio::test]
async fn test_missing_folder_config_fails_fast() {
    let f = fixture();
    f.engine
        .register_source(SourceConfig::without_folder("github"));

    let report = f.engine.sync_provider("github").await;

    assert!(!report.success);
    assert!(report.error.unwrap().contains("no folder configured"));
    // Fail-fast: the provider is never consulted.
    assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deleted_folder_fails_fast() {
    let f = fixture();
    f.engine
        .register_source(SourceConfig::new("github", "folder-gone"));

    let report = f.engine.sync_provider("github").await;

    assert!(!report.success);
    assert!(report.error.unwrap().contains("no longer exists"));
    assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_fetch_failures_are_retried() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "1", "#1 open", "https://x/1")],
    );
    f.provider.fail_next(2);
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(report.success, "error: {:?}", report.error);
    assert_eq!(f.provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_exhaustion_surfaces_as_failed_report() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.provider.set_items("github", vec![]);
    f.provider.fail_next(10);
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(!report.success);
    assert!(report.error.unwrap().contains("503"));
    // Initial attempt plus the two configured retries.
    assert_eq!(f.provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failure_in_one_source_does_not_abort_sync_all() {
    let f = fixture();
    f.store.add_folder("folder-1", "GitHub PRs");
    f.store.add_folder("folder-2", "GitLab MRs");
    // "github" has no upstream fixture and fails; "gitlab" is healthy.
    f.provider.set_items(
        "gitlab",
        vec![WorkItem::new("gitlab", "7", "!7 open", "https://y/7")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));
    f.engine.register_source(SourceConfig::new("gitlab", "folder-2"));

    let summary = f.engine.sync_all().await;

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.succeeded, 1);
    assert!(!summary.reports[0].success);
    assert!(summary.reports[1].success);
    assert_eq!(f.store.folder_contents("folder-2").len(), 1);
}

#[tokio::test]
async fn test_disabled_and_unauthenticated_sources_are_skipped() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.engine
        .register_source(SourceConfig::new("github", "folder-1").disabled());
    f.engine
        .register_source(SourceConfig::new("gitlab", "folder-1").unauthenticated());

    let summary = f.engine.sync_all().await;

    assert!(summary.reports.is_empty());
    assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_manual_conflict_withholds_only_its_update() {
    let f = fixture_with_strategy(ResolutionStrategy::Manual);
    f.store.add_folder("folder-1", "Pull Requests");
    f.store
        .seed_bookmark("folder-1", "https://x/1", "#1 open");
    f.provider.set_items(
        "github",
        vec![
            WorkItem::new("github", "1", "#1 closed", "https://x/1"),
            WorkItem::new("github", "2", "#2 open", "https://x/2"),
        ],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    // The add proceeds; the conflicting update is withheld.
    assert!(report.success);
    assert_eq!(report.items_added, 1);
    assert_eq!(report.items_updated, 0);

    let unresolved = f.engine.resolver().unresolved_conflicts();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].id, "github-1");

    // The withheld bookmark keeps its local title until the user decides.
    let contents = f.store.folder_contents("folder-1");
    assert!(contents.iter().any(|b| b.title == "#1 open"));

    let resolution = f
        .engine
        .resolver()
        .resolve_manually("github-1", ManualChoice::KeepRemote)
        .unwrap();
    assert_eq!(resolution.resolved.unwrap().title, "#1 closed");
    assert_eq!(f.engine.resolver().unresolved_count(), 0);
}

#[tokio::test]
async fn test_local_wins_keeps_local_title() {
    let f = fixture_with_strategy(ResolutionStrategy::LocalWins);
    f.store.add_folder("folder-1", "Pull Requests");
    f.store
        .seed_bookmark("folder-1", "https://x/1", "#1 my name");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "1", "#1 upstream", "https://x/1")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    // The local snapshot wins, so there is nothing to rewrite.
    assert!(report.success);
    assert_eq!(report.items_updated, 0);
    let contents = f.store.folder_contents("folder-1");
    assert_eq!(contents[0].title, "#1 my name");
}

#[tokio::test]
async fn test_folder_title_tracks_item_count() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.provider.set_items(
        "github",
        vec![
            WorkItem::new("github", "1", "#1 open", "https://x/1"),
            WorkItem::new("github", "2", "#2 open", "https://x/2"),
        ],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    let report = f.engine.sync_provider("github").await;

    assert!(report.success);
    assert_eq!(f.store.folder_title("folder-1"), "Pull Requests (2)");
}

#[tokio::test]
async fn test_checkpoints_persisted_after_cycle() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "1", "#1 open", "https://x/1")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    assert!(f
        .checkpoints
        .last_sync("github")
        .await
        .unwrap()
        .is_none());

    let report = f.engine.sync_provider("github").await;
    assert!(report.success);

    assert!(f
        .checkpoints
        .last_sync("github")
        .await
        .unwrap()
        .is_some());
    let linkage = f
        .checkpoints
        .item_checkpoint("github", "1")
        .await
        .unwrap()
        .expect("created item should be checkpointed");
    assert!(linkage.bookmark_id.starts_with("bm-"));
}

#[tokio::test]
async fn test_notifications_follow_settings() {
    let f = fixture();
    f.store.add_folder("folder-1", "Pull Requests");
    f.provider.set_items(
        "github",
        vec![WorkItem::new("github", "1", "#1 open", "https://x/1")],
    );
    f.engine.register_source(SourceConfig::new("github", "folder-1"));

    // Disabled: nothing is delivered.
    f.settings.set_notifications(NotificationSettings {
        enabled: false,
        notify_on_success: true,
        notify_on_error: true,
    });
    f.engine.sync_provider("github").await;
    assert!(f.notifier.sent().is_empty());

    // Enabled: a success notification summarizes the counts.
    f.settings.set_notifications(NotificationSettings::default());
    f.provider.set_items(
        "github",
        vec![
            WorkItem::new("github", "1", "#1 open", "https://x/1"),
            WorkItem::new("github", "2", "#2 open", "https://x/2"),
        ],
    );
    f.engine.sync_provider("github").await;

    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Success);
    assert!(sent[0].message.contains("1 added"));

    // Failure notifications carry the error message.
    f.provider.fail_next(10);
    f.engine.sync_provider("github").await;
    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].kind, NotificationKind::Failure);
    assert!(sent[1].message.contains("503"));
}
