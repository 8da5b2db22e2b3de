mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use gantry_client_core::config::Config;
use gantry_client_core::console::Console;
use gantry_client_core::mutate::{Mutation, MutationError};

async fn developer_console() -> (Console, std::sync::Arc<common::MockState>) {
    let (base, state) = common::spawn_mock().await;
    let console = Console::new(&Config::default().with_base_url(base)).unwrap();
    console
        .session()
        .login("developer", "dev123")
        .await
        .unwrap();
    (console, state)
}

#[tokio::test]
async fn pd_toggle_refreshes_only_the_pd_resource() {
    let (console, state) = developer_console().await;
    console.start_polling().unwrap();
    let dataset_view = console.watch_dataset(7).unwrap();

    // Let the initial fetch wave land.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(dataset_view.snapshot().is_some());
    let pd_before = state.pd_gets.load(Ordering::SeqCst);
    let dataset_before = state.dataset_gets.load(Ordering::SeqCst);

    console
        .perform(Mutation::TogglePd {
            com_id: 42,
            enabled: true,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(state.enable_posts.load(Ordering::SeqCst), 1);
    assert!(state.pd_enabled());
    // Exactly one targeted re-read of the PD list, nothing else re-fetched.
    assert_eq!(state.pd_gets.load(Ordering::SeqCst), pd_before + 1);
    assert_eq!(state.dataset_gets.load(Ordering::SeqCst), dataset_before);

    console.stop_polling();
}

#[tokio::test]
async fn successful_edit_reconciles_to_server_truth() {
    let (console, _state) = developer_console().await;
    let view = console.watch_dataset(7).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(view.snapshot().is_some());

    view.apply_optimistic_edit(0, vec![9, 9]);
    assert_eq!(view.pending_edit(&0), Some(vec![9, 9]));

    console
        .perform(Mutation::SetDatasetElement {
            data_set_id: 7,
            element: 0,
            raw: vec![9, 9],
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // The overlay is gone; the displayed bytes are the server's answer.
    assert_eq!(view.pending_edit(&0), None);
    let snapshot = view.snapshot().unwrap();
    assert_eq!(snapshot.value.values[0].raw, vec![9, 9]);

    console.unwatch_dataset(7);
}

#[tokio::test]
async fn failed_mutation_sets_error_and_keeps_snapshot() {
    let (console, state) = developer_console().await;
    let view = console.watch_dataset(7).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = view.snapshot().unwrap();

    state.fail_dataset_writes.store(true, Ordering::SeqCst);
    view.apply_optimistic_edit(0, vec![1]);

    let err = console
        .perform(Mutation::SetDatasetElement {
            data_set_id: 7,
            element: 0,
            raw: vec![1],
        })
        .await
        .unwrap_err();

    // The server's message comes through verbatim ...
    match &err {
        MutationError::Failed(transport) => {
            assert_eq!(transport.to_string(), "raw payload length mismatch");
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(
        view.error().as_deref(),
        Some("raw payload length mismatch")
    );

    // ... no optimistic state was committed, and the pre-mutation snapshot
    // is still what the view shows.
    assert_eq!(view.pending_edit(&0), None);
    let after = view.snapshot().unwrap();
    assert_eq!(after.value.values[0].raw, before.value.values[0].raw);

    console.unwatch_dataset(7);
}

#[tokio::test]
async fn clear_element_round_trip() {
    let (console, state) = developer_console().await;
    let view = console.watch_dataset(7).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    console
        .perform(Mutation::ClearDatasetElement {
            data_set_id: 7,
            element: 1,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(state.dataset_element(1), vec![0, 0, 0]);
    let snapshot = view.snapshot().unwrap();
    assert_eq!(snapshot.value.values[1].raw, vec![0, 0, 0]);

    console.unwatch_dataset(7);
}
