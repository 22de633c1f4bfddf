// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of diffing and conflict resolution

use marksync_core::{LocalBookmark, WorkItem};
use marksync_sync_engine::{compute_diff, ConflictResolver, ManualChoice, ResolutionStrategy};

fn main() {
    println!("marksync Sync Engine Demo");
    println!("=========================\n");

    demo_diff();
    println!();
    demo_conflict_resolution();
}

fn demo_diff() {
    println!("1. Reconciliation Diff");
    println!("----------------------");

    let local = vec![
        LocalBookmark::new("bm-1", "https://github.com/acme/app/pull/1", "#1 open"),
        LocalBookmark::new("bm-2", "https://github.com/acme/app/pull/2", "#2 open"),
    ];
    let remote = vec![
        WorkItem::new("github", "1", "#1 merged", "https://github.com/acme/app/pull/1"),
        WorkItem::new("github", "3", "#3 open", "https://github.com/acme/app/pull/3"),
    ];

    println!("Local bookmarks: #1 open, #2 open");
    println!("Remote items:    #1 merged, #3 open");

    let diff = compute_diff(&local, &remote);
    println!("\nComputed diff:");
    for item in &diff.to_add {
        println!("  + add    {}", item.title);
    }
    for update in &diff.to_update {
        println!("  ~ update {} -> {}", update.old.title, update.new.title);
    }
    for id in &diff.to_delete {
        println!("  - delete {id}");
    }
}

fn demo_conflict_resolution() {
    println!("2. Conflict Resolution");
    println!("----------------------");

    let resolver = ConflictResolver::with_default_strategy(ResolutionStrategy::Manual);

    let local = WorkItem::new("github", "42", "#42 my notes", "https://github.com/acme/app/pull/42");
    let remote = WorkItem::new("github", "42", "#42 ready for review", "https://github.com/acme/app/pull/42");

    println!("Local title:  {}", local.title);
    println!("Remote title: {}", remote.title);

    let conflict = resolver
        .detect_conflict(Some(&local), Some(&remote), "github")
        .expect("titles differ, so this is a conflict");
    println!("\nDetected {:?} conflict: {}", conflict.kind, conflict.id);

    let resolution = resolver.resolve_conflict(&conflict).unwrap();
    println!(
        "Manual strategy defers to the user (confirmation required: {})",
        resolution.requires_user_confirmation
    );
    println!("Unresolved conflicts: {}", resolver.unresolved_count());

    let resolution = resolver
        .resolve_manually(&conflict.id, ManualChoice::KeepRemote)
        .unwrap();
    println!(
        "\n✓ User kept the remote title: {}",
        resolution.resolved.unwrap().title
    );
    println!("Unresolved conflicts: {}", resolver.unresolved_count());
}
