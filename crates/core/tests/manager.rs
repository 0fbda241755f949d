mod common;

use std::sync::Arc;
use std::time::Duration;

use ab_runtime::{CloseCode, CloseInfo};
use autobahn_client::{Client, ClientConfig, ConnectionManager, ConnectionState, Error};
use common::{
	GatedConnector, MockConnector, MockSession, RecordingReporter, connected, harness, silent_session, wait_for_state,
};
use serde_json::json;
use tokio::sync::Notify;

#[tokio::test]
async fn start_registers_prefixes_once() {
	let session = silent_session();
	let h = connected(session.clone()).await;

	assert_eq!(h.manager.state(), ConnectionState::Connected);
	assert_eq!(h.connector.endpoints(), vec!["ws://127.0.0.1:8090/ws".to_string()]);
	assert_eq!(
		session.prefixes(),
		vec![
			("testdb".to_string(), "http://api.testsuite.autobahn.ws/testdb/".to_string()),
			("testrunner".to_string(), "http://api.testsuite.autobahn.ws/testrunner/".to_string()),
		]
	);
	assert!(session.calls().is_empty());
}

#[tokio::test]
async fn failed_connect_leaves_disconnected() {
	let h = harness(MockConnector::failing(
		CloseInfo::new(CloseCode::Unreachable, "could not reach router").with_detail("connection refused"),
	));

	let err = h.manager.start().await.unwrap_err();
	match err {
		Error::ConnectionLost { code, reason, detail } => {
			assert_eq!(code, CloseCode::Unreachable);
			assert_eq!(reason, "could not reach router");
			assert_eq!(detail.as_deref(), Some("connection refused"));
		}
		other => panic!("Expected ConnectionLost, got {other:?}"),
	}

	assert_eq!(h.manager.state(), ConnectionState::Disconnected);
	assert!(h.manager.current().is_none());
}

#[tokio::test]
async fn loss_clears_session_and_calls_fail_fast() {
	let session = MockSession::replying(|_, _| Ok(json!([])));
	let h = connected(session.clone()).await;

	h.client.list_test_runs(None).await.unwrap();

	session.lose(CloseInfo::new(CloseCode::Lost, "router went away"));
	wait_for_state(&h.manager, ConnectionState::Disconnected).await;

	assert!(h.manager.current().is_none());
	let err = h.client.list_test_runs(None).await.unwrap_err();
	assert!(err.is_not_connected());
	assert_eq!(session.calls().len(), 1);
}

#[tokio::test]
async fn restart_after_loss() {
	let first = silent_session();
	let second = MockSession::replying(|_, _| Ok(json!(["run-1", []])));
	let h = harness(MockConnector::with_sessions([first.clone(), second.clone()]));

	h.manager.start().await.unwrap();
	first.lose(CloseInfo::new(CloseCode::Lost, "dropped"));
	wait_for_state(&h.manager, ConnectionState::Disconnected).await;

	h.manager.start().await.unwrap();
	assert_eq!(h.manager.state(), ConnectionState::Connected);

	h.client.start_test_run(None).await.unwrap();
	assert_eq!(second.calls().len(), 1);
	assert_eq!(second.prefixes().len(), 2);
}

#[tokio::test]
async fn superseded_session_loss_keeps_newer_session() {
	let first = silent_session();
	let second = MockSession::replying(|_, _| Ok(json!([])));
	let h = harness(MockConnector::with_sessions([first.clone(), second.clone()]));

	h.manager.start().await.unwrap();
	h.manager.start().await.unwrap();

	// Starting again closed the first session; its end must not clear the second.
	tokio::task::yield_now().await;
	tokio::time::sleep(std::time::Duration::from_millis(20)).await;

	assert_eq!(h.manager.state(), ConnectionState::Connected);
	h.client.list_test_runs(None).await.unwrap();
	assert_eq!(second.calls().len(), 1);
}

#[tokio::test]
async fn disconnect_closes_and_clears() {
	let h = connected(silent_session()).await;
	let mut state = h.manager.subscribe_state();

	h.manager.disconnect();

	assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
	assert!(h.manager.current().is_none());
	assert!(h.client.get_spec(0, "A").await.unwrap_err().is_not_connected());
}

#[tokio::test]
async fn late_older_start_keeps_newer_session() {
	let older = silent_session();
	let newer = MockSession::replying(|_, _| Ok(json!([])));
	let gate = Arc::new(Notify::new());
	let connector = GatedConnector::new([(older.clone(), Some(Arc::clone(&gate))), (newer.clone(), None)]);
	let manager = Arc::new(ConnectionManager::new(ClientConfig::default(), connector.clone()));

	let first = {
		let manager = Arc::clone(&manager);
		tokio::spawn(async move { manager.start().await })
	};
	tokio::time::timeout(Duration::from_secs(1), async {
		while connector.attempts() == 0 {
			tokio::task::yield_now().await;
		}
	})
	.await
	.unwrap();

	manager.start().await.unwrap();
	gate.notify_one();
	first.await.unwrap().unwrap();

	// The older attempt finished last and must not displace the newer session.
	assert!(older.is_closed());
	assert!(!newer.is_closed());
	assert_eq!(manager.state(), ConnectionState::Connected);

	let client = Client::new(Arc::clone(&manager), Arc::new(RecordingReporter::default()));
	client.list_test_runs(None).await.unwrap();
	assert_eq!(newer.calls().len(), 1);
}
