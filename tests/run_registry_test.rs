use std::time::Duration;

use parley::application::services::RunRegistry;
use parley::domain::{ChatId, GenerationRun, MessageId, RunStatus};

fn run_for(chat_id: ChatId, epoch: u64) -> GenerationRun {
    GenerationRun::new(chat_id, MessageId::new(), epoch)
}

#[test]
fn given_registered_run_when_queried_then_it_is_queued_and_active() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let run = run_for(chat_id, 1);
    let run_id = run.id;

    let token = registry.register(run);

    assert!(!token.is_cancelled());
    assert_eq!(registry.active_run(chat_id), Some(run_id));
    assert_eq!(registry.get(run_id).unwrap().status, RunStatus::Queued);
}

#[test]
fn given_active_run_when_newer_run_registered_then_older_is_cancelled() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let first = run_for(chat_id, 1);
    let second = run_for(chat_id, 2);
    let second_id = second.id;

    let first_token = registry.register(first);
    let second_token = registry.register(second);

    assert!(first_token.is_cancelled());
    assert!(!second_token.is_cancelled());
    assert_eq!(registry.active_run(chat_id), Some(second_id));
}

#[test]
fn given_active_run_when_older_epoch_registered_then_late_run_is_born_cancelled() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let newer = run_for(chat_id, 5);
    let newer_id = newer.id;

    let newer_token = registry.register(newer);
    let stale_token = registry.register(run_for(chat_id, 4));

    assert!(stale_token.is_cancelled());
    assert!(!newer_token.is_cancelled());
    assert_eq!(registry.active_run(chat_id), Some(newer_id));
}

#[test]
fn given_run_scheduled_after_supersede_epoch_when_cancelling_older_then_newer_run_survives() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let first = run_for(chat_id, 1);
    let newer = run_for(chat_id, 3);
    let newer_id = newer.id;

    let first_token = registry.register(first);
    let newer_token = registry.register(newer);
    // The supersede took epoch 2; the run scheduled in between holds epoch 3.
    let cancelled = registry.cancel_older_than(chat_id, 2);

    assert_eq!(cancelled, None);
    assert!(first_token.is_cancelled());
    assert!(!newer_token.is_cancelled());
    assert_eq!(registry.active_run(chat_id), Some(newer_id));
}

#[test]
fn given_run_from_older_epoch_when_cancelling_older_then_it_is_cancelled() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let run = run_for(chat_id, 1);
    let run_id = run.id;

    let token = registry.register(run);
    let cancelled = registry.cancel_older_than(chat_id, 2);

    assert_eq!(cancelled, Some(run_id));
    assert!(token.is_cancelled());
}

#[test]
fn given_runs_in_different_chats_when_registered_then_they_do_not_interfere() {
    let registry = RunRegistry::new(8);

    let a = registry.register(run_for(ChatId::new(), 1));
    let b = registry.register(run_for(ChatId::new(), 1));

    assert!(!a.is_cancelled());
    assert!(!b.is_cancelled());
}

#[test]
fn given_active_run_when_cancelling_chat_then_token_fires_and_run_id_is_returned() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let run = run_for(chat_id, 1);
    let run_id = run.id;
    let token = registry.register(run);

    assert_eq!(registry.cancel_chat(chat_id), Some(run_id));
    assert!(token.is_cancelled());
    assert_eq!(registry.cancel_chat(ChatId::new()), None);
}

#[test]
fn given_terminal_status_when_set_then_chat_has_no_active_run() {
    let registry = RunRegistry::new(8);
    let chat_id = ChatId::new();
    let run = run_for(chat_id, 1);
    let run_id = run.id;
    registry.register(run);

    registry.set_status(run_id, RunStatus::Failed, Some("boom".to_string()));

    assert_eq!(registry.active_run(chat_id), None);
    let run = registry.get(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("boom"));
}

#[test]
fn given_commits_when_recorded_then_run_tracks_message_and_count() {
    let registry = RunRegistry::new(8);
    let run = run_for(ChatId::new(), 1);
    let run_id = run.id;
    registry.register(run);
    let message_id = MessageId::new();

    registry.record_commit(run_id, message_id);
    registry.record_commit(run_id, message_id);

    let run = registry.get(run_id).unwrap();
    assert_eq!(run.assistant_message_id, Some(message_id));
    assert_eq!(run.fragments_committed, 2);
}

#[test]
fn given_full_history_when_registering_then_oldest_finished_run_is_evicted() {
    let registry = RunRegistry::new(2);
    let finished = run_for(ChatId::new(), 1);
    let finished_id = finished.id;
    registry.register(finished);
    registry.set_status(finished_id, RunStatus::Completed, None);

    let active = run_for(ChatId::new(), 1);
    let active_id = active.id;
    registry.register(active);
    registry.register(run_for(ChatId::new(), 1));

    assert!(registry.get(finished_id).is_none());
    assert!(registry.get(active_id).is_some());
}

#[tokio::test]
async fn given_pending_run_when_waiting_then_resolves_on_terminal_status() {
    let registry = std::sync::Arc::new(RunRegistry::new(8));
    let run = run_for(ChatId::new(), 1);
    let run_id = run.id;
    registry.register(run);

    let waiter = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.wait_for(run_id).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.set_status(run_id, RunStatus::Streaming, None);
    registry.set_status(run_id, RunStatus::Completed, None);

    let status = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should resolve")
        .unwrap();
    assert_eq!(status, Some(RunStatus::Completed));
}

#[tokio::test]
async fn given_unknown_run_when_waiting_then_returns_none() {
    let registry = RunRegistry::new(8);

    assert_eq!(registry.wait_for(parley::domain::RunId::new()).await, None);
}
