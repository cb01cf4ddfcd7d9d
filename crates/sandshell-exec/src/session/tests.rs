//! Tests for the session registry

use super::*;
use crate::config::ExecConfig;
use crate::error::Error;
use crate::types::{SessionId, SessionOpenRequest};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

fn manager() -> SessionManager {
    manager_with(ExecConfig::default())
}

fn manager_with(config: ExecConfig) -> SessionManager {
    SessionManager::new(ExecConfig {
        workspace_root: Some(std::env::temp_dir()),
        ..config
    })
}

/// Read until `needle` shows up or the session reports eof.
async fn read_until(manager: &SessionManager, id: &str, needle: &str) -> String {
    let mut seen = String::new();
    for _ in 0..100 {
        let chunk = manager
            .read_from_session(id, 4096, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        seen.push_str(&chunk.stdout);
        if seen.contains(needle) || chunk.eof {
            break;
        }
    }
    seen
}

fn snapshot(id: &str, secs: i64) -> crate::types::SessionSnapshot {
    crate::types::SessionSnapshot {
        id: SessionId::from(id),
        command: String::new(),
        cwd: "/".to_string(),
        started_at: Utc.timestamp_opt(secs, 0).unwrap(),
        alive: true,
        exit_code: None,
    }
}

#[test]
fn test_sort_snapshots_newest_first_then_id() {
    let mut snapshots = vec![
        snapshot("b", 10),
        snapshot("c", 20),
        snapshot("a", 10),
        snapshot("d", 5),
    ];
    sort_snapshots(&mut snapshots);
    let order: Vec<&str> = snapshots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(order, vec!["c", "a", "b", "d"]);
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new(""))
        .await
        .unwrap();

    manager
        .write_to_session(id.as_str(), b"echo marker_$((20+22))\n")
        .await
        .unwrap();
    let output = read_until(&manager, id.as_str(), "marker_42").await;
    assert!(output.contains("marker_42"), "got: {output:?}");

    manager.close_session(id.as_str()).await;
}

#[tokio::test]
async fn test_read_reports_eof_after_exit() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new("echo done_here"))
        .await
        .unwrap();

    let mut output = String::new();
    let mut eof = false;
    for _ in 0..100 {
        let chunk = manager
            .read_from_session(id.as_str(), 4096, Some(Duration::from_millis(100)))
            .await
            .unwrap();
        output.push_str(&chunk.stdout);
        assert!(chunk.stderr.is_empty());
        if chunk.eof {
            eof = true;
            break;
        }
    }
    assert!(eof);
    assert!(output.contains("done_here"));

    // eof is stable once reached
    let again = manager
        .read_from_session(id.as_str(), 4096, Some(Duration::from_millis(10)))
        .await
        .unwrap();
    assert!(again.eof);
    assert!(again.stdout.is_empty());
}

#[tokio::test]
async fn test_read_without_output_times_out_empty() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new("sleep 5"))
        .await
        .unwrap();

    let start = std::time::Instant::now();
    let result = manager
        .read_from_session(id.as_str(), 1024, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(result, crate::types::SessionReadResult::default());
    assert!(start.elapsed() < Duration::from_secs(2));

    manager.close_session(id.as_str()).await;
}

#[tokio::test]
async fn test_read_respects_max_bytes() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new("printf abcdefghij; sleep 5"))
        .await
        .unwrap();

    let mut collected = String::new();
    for _ in 0..100 {
        let chunk = manager
            .read_from_session(id.as_str(), 4, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(chunk.stdout.len() <= 4);
        collected.push_str(&chunk.stdout);
        if collected.contains("abcdefghij") {
            break;
        }
    }
    assert!(collected.contains("abcdefghij"));

    manager.close_session(id.as_str()).await;
}

#[tokio::test]
async fn test_eof_waits_for_backlog_after_exit() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new("printf abcdefghij"))
        .await
        .unwrap();

    let mut exited = false;
    for _ in 0..200 {
        if manager.list_sessions().await.iter().all(|s| !s.alive) {
            exited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(exited);
    // past the settle window, so every byte is already buffered
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut chunks = Vec::new();
    for _ in 0..10 {
        let chunk = manager
            .read_from_session(id.as_str(), 4, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        let eof = chunk.eof;
        chunks.push((chunk.stdout, eof));
        if eof {
            break;
        }
    }
    assert_eq!(
        chunks,
        vec![
            ("abcd".to_string(), false),
            ("efgh".to_string(), false),
            ("ij".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_truncated_flag_resets_after_drain() {
    let manager = manager_with(ExecConfig {
        max_output_bytes: 16,
        ..ExecConfig::default()
    });
    let id = manager
        .open_session(SessionOpenRequest::new(
            "i=0; while [ $i -lt 50 ]; do echo overflow-line; i=$((i+1)); done; sleep 5",
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let first = manager
        .read_from_session(id.as_str(), 4096, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(first.truncated);
    assert!(first.stdout.len() <= 16);

    let second = manager
        .read_from_session(id.as_str(), 4096, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(!second.truncated);

    manager.close_session(id.as_str()).await;
}

#[tokio::test]
async fn test_close_then_read_is_not_found() {
    let manager = manager();
    let id = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();

    manager.close_session(id.as_str()).await;
    // closing twice is fine
    manager.close_session(id.as_str()).await;

    let result = manager
        .read_from_session(id.as_str(), 16, Some(Duration::from_millis(10)))
        .await;
    assert!(matches!(result, Err(Error::SessionNotFound(_))));
    assert!(matches!(
        manager.write_to_session(id.as_str(), b"x").await,
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let manager = manager();
    let result = manager.read_from_session("sh-missing", 16, None).await;
    assert!(matches!(result, Err(Error::SessionNotFound(id)) if id == "sh-missing"));
    manager.close_session("sh-missing").await;
}

#[tokio::test]
async fn test_idle_session_is_pruned() {
    let manager = manager();
    let id = manager
        .open_session(
            SessionOpenRequest::new("sleep 30").with_idle_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert_eq!(manager.list_sessions().await.len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.list_sessions().await.is_empty());
    assert!(matches!(
        manager.read_from_session(id.as_str(), 16, None).await,
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_activity_defers_eviction() {
    let manager = manager();
    let id = manager
        .open_session(
            SessionOpenRequest::new("").with_idle_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(150)).await;
        manager
            .write_to_session(id.as_str(), b"true\n")
            .await
            .unwrap();
    }
    assert_eq!(manager.list_sessions().await.len(), 1);
    manager.close_session(id.as_str()).await;
}

#[tokio::test]
async fn test_reaper_evicts_without_calls() {
    let manager = Arc::new(manager());
    manager
        .open_session(
            SessionOpenRequest::new("sleep 30").with_idle_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap();
    let reaper = manager.spawn_reaper(Duration::from_millis(25));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(manager.registered().await, 0);
    reaper.abort();
}

#[tokio::test]
async fn test_reaper_exits_when_manager_dropped() {
    let manager = Arc::new(manager());
    let reaper = manager.spawn_reaper(Duration::from_millis(10));
    drop(manager);
    tokio::time::timeout(Duration::from_secs(2), reaper)
        .await
        .expect("reaper kept running")
        .unwrap();
}

#[tokio::test]
async fn test_list_is_sorted_and_tracks_liveness() {
    let manager = manager();
    let first = manager
        .open_session(SessionOpenRequest::new("exit 4"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();

    let mut listed = Vec::new();
    for _ in 0..100 {
        listed = manager.list_sessions().await;
        if listed.iter().any(|s| s.id == first && !s.alive) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second);
    assert_eq!(listed[1].id, first);
    assert!(listed[0].alive);
    assert!(!listed[1].alive);
    assert_eq!(listed[1].exit_code, Some(4));
    assert_eq!(listed[1].command, "exit 4");

    manager.close_all().await;
    assert!(manager.list_sessions().await.is_empty());
}

#[tokio::test]
async fn test_cap_evicts_oldest() {
    let manager = manager_with(ExecConfig {
        max_sessions: 2,
        ..ExecConfig::default()
    });
    let a = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();
    let b = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();
    let c = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();

    let ids: Vec<SessionId> = manager
        .list_sessions()
        .await
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&a));
    assert!(ids.contains(&b));
    assert!(ids.contains(&c));

    manager.close_all().await;
}

#[tokio::test]
async fn test_failed_launch_keeps_sessions_at_cap() {
    let manager = manager_with(ExecConfig {
        max_sessions: 1,
        ..ExecConfig::default()
    });
    let kept = manager
        .open_session(SessionOpenRequest::new("sleep 30"))
        .await
        .unwrap();

    // A NUL byte in the environment makes the spawn itself fail.
    let mut bad = SessionOpenRequest::new("sleep 30");
    bad.env.insert("BROKEN".to_string(), "a\0b".to_string());
    let result = manager.open_session(bad).await;
    assert!(matches!(result, Err(Error::LaunchFailed(_))));

    let listed = manager.list_sessions().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept);
    assert!(listed[0].alive);

    manager.close_all().await;
}

#[tokio::test]
async fn test_open_rejects_missing_directory() {
    let manager = manager();
    let result = manager
        .open_session(SessionOpenRequest::new("").with_cwd("no-such-dir-7c21"))
        .await;
    assert!(matches!(result, Err(Error::InvalidWorkingDirectory(_))));
    assert!(manager.list_sessions().await.is_empty());
}

#[tokio::test]
async fn test_session_ids_are_unique() {
    let manager = manager();
    let a = manager
        .open_session(SessionOpenRequest::new("true"))
        .await
        .unwrap();
    let b = manager
        .open_session(SessionOpenRequest::new("true"))
        .await
        .unwrap();
    assert_ne!(a, b);
    manager.close_all().await;
}
