//! End-to-end tests of the bridge over the loopback transport.
//!
//! A `TelemetryFeed` plays the simulation process on the telemetry side
//! and a `CommandTap` plays it on the command side, so the full path from
//! request to wire and from wire to viewer runs without a broker.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use marketsim_bridge::loopback::{self, CommandTap, TelemetryFeed};
use marketsim_bridge::{Bridge, BridgeConfig, BridgeError, ProcessState};
use marketsim_protocol::ClientEvent;

fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.supervisor.settle_interval_ms = 0;
    config.supervisor.stop_grace_ms = 0;
    config.listener.backoff_ms = 1;
    config.fanout.capacity = 32;
    config
}

fn start_bridge(config: &BridgeConfig) -> (Bridge, TelemetryFeed, CommandTap) {
    let (feed, source) = loopback::telemetry();
    let (publisher, tap) = loopback::commands();
    (Bridge::start(config, publisher, source), feed, tap)
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn telemetry_reaches_every_viewer_in_order() {
    let (bridge, feed, _tap) = start_bridge(&test_config());
    let mut a = bridge.fanout().subscribe();
    let mut b = bridge.fanout().subscribe();

    feed.send_line("DATA 101.25 500");
    feed.send_line("TRADE momentum buy 12 101.30");
    feed.send_line("SCENARIO_METRICS 0.8 1.15 4000 0.05");
    feed.send_line("METRICS 0.02 15000");

    for rx in [&mut a, &mut b] {
        assert_eq!(
            next_event(rx).await,
            ClientEvent::MarketData {
                price: 101.25,
                volume: 500
            }
        );
        assert_eq!(
            next_event(rx).await,
            ClientEvent::TradeLog {
                agent: "momentum".to_owned(),
                side: "buy".to_owned(),
                qty: 12,
                price: 101.30,
            }
        );
        assert_eq!(
            next_event(rx).await,
            ClientEvent::ScenarioMetrics {
                hype: 0.8,
                bubble: 1.15,
                short_interest: 4000,
                panic: 0.05,
            }
        );
        assert_eq!(
            next_event(rx).await,
            ClientEvent::MarketMetrics {
                spread: 0.02,
                liquidity: 15000
            }
        );
    }

    let stats = bridge.shutdown().await;
    assert_eq!(stats.delivered, 4);
}

#[tokio::test]
async fn malformed_telemetry_is_dropped_silently() {
    let (bridge, feed, _tap) = start_bridge(&test_config());
    let mut rx = bridge.fanout().subscribe();

    feed.send_line("");
    feed.send_line("DATA");
    feed.send_line("TRADE a b notanumber 1.0");
    feed.send_line("SENTIMENT 1 two 3");
    feed.send_line("SENTIMENT 3 -2 7");

    assert_eq!(
        next_event(&mut rx).await,
        ClientEvent::ServerSentiment(vec![3, -2, 7])
    );
    let stats = bridge.shutdown().await;
    assert_eq!(stats.dropped, 4);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn viewer_requests_are_forwarded_in_order() {
    let (bridge, _feed, mut tap) = start_bridge(&test_config());
    let dispatcher = bridge.dispatcher();

    let requests = [
        r#"{"event":"pause_simulation"}"#,
        r#"{"event":"place_order","data":{"side":"buy","quantity":10,"price":101.5}}"#,
        r#"{"event":"place_order","data":{"side":"SELL","quantity":"3","price":"99.25"}}"#,
        r#"{"event":"set_scenario","data":{"type":"squeeze"}}"#,
        r#"{"event":"set_scenario","data":{"type":"unheard-of"}}"#,
        r#"{"event":"resume_simulation","data":{}}"#,
    ];
    for text in requests {
        assert!(dispatcher.handle_text(text).await.is_ok(), "{text}");
    }

    let mut lines = Vec::new();
    for _ in 0..requests.len() {
        lines.push(tap.recv().await.unwrap());
    }
    assert_eq!(
        lines,
        [
            "PAUSE",
            "ORDER 0 10 101.5",
            "ORDER 1 3 99.25",
            "SCENARIO 2",
            "SCENARIO 0",
            "RESUME",
        ]
    );

    bridge.shutdown().await;
}

#[tokio::test]
async fn rejected_requests_never_reach_the_wire() {
    let (bridge, _feed, mut tap) = start_bridge(&test_config());
    let dispatcher = bridge.dispatcher();

    for text in [
        "not json",
        r#"{"event":"launch_rockets"}"#,
        r#"{"event":"place_order","data":{"side":"buy","quantity":-1,"price":10}}"#,
        r#"{"event":"place_order","data":{"side":"buy","quantity":1,"price":0}}"#,
        r#"{"event":"start_simulation","data":{"makers":1}}"#,
    ] {
        let result = dispatcher.handle_text(text).await;
        assert!(
            matches!(result, Err(BridgeError::InvalidRequest(_))),
            "{text}: {result:?}"
        );
    }

    let missing = dispatcher
        .handle_text(
            r#"{"event":"start_simulation","data":{"mode":"turbo","makers":1,"fundamental":1,"momentum":1,"noise":1}}"#,
        )
        .await;
    assert!(matches!(missing, Err(BridgeError::BinaryNotFound { .. })));

    tokio::task::yield_now().await;
    assert_eq!(tap.try_recv(), None);
    bridge.shutdown().await;
}

#[tokio::test]
async fn shutdown_with_no_process_is_clean() {
    let (bridge, _feed, _tap) = start_bridge(&test_config());
    let supervisor = std::sync::Arc::clone(bridge.supervisor());
    let token = bridge.shutdown_token();

    bridge.shutdown().await;
    assert!(token.is_cancelled());
    assert_eq!(supervisor.status().state, ProcessState::NotRunning);
}

#[cfg(unix)]
#[tokio::test]
async fn shutdown_terminates_the_active_simulation() {
    let Some(sleep) = ["/bin/sleep", "/usr/bin/sleep"]
        .into_iter()
        .find(|p| std::path::Path::new(p).exists())
    else {
        return;
    };
    let mut config = test_config();
    config.supervisor.binaries.insert(
        "moderate".to_owned(),
        marketsim_bridge::config::BinarySpec::new(sleep).with_args(["30"]),
    );
    let (bridge, _feed, mut tap) = start_bridge(&config);

    let started = bridge
        .dispatcher()
        .handle_text(
            r#"{"event":"start_simulation","data":{"makers":5,"fundamental":20,"momentum":10,"noise":50}}"#,
        )
        .await;
    assert!(started.is_ok(), "{started:?}");
    assert_eq!(tap.recv().await.as_deref(), Some("START 5 20 10 50"));

    let supervisor = std::sync::Arc::clone(bridge.supervisor());
    assert_eq!(supervisor.status().state, ProcessState::Running);
    assert_eq!(supervisor.status().mode.as_deref(), Some("moderate"));

    bridge.shutdown().await;
    assert_eq!(supervisor.status().state, ProcessState::NotRunning);
}
