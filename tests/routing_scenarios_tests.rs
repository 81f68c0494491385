use audio_isolator_lib::graph::fake::FakeGraphManager;
use audio_isolator_lib::graph::{
    default_selection, routed_sources, LinkFlags, ManualClock, PortDirection, RoutingController, RoutingError,
    RoutingState,
};
use audio_isolator_lib::{Classifier, RouterConfig};
use std::sync::Arc;
use std::time::Duration;

/// End-to-end routing scenarios against the in-memory graph
#[cfg(test)]
mod routing_scenarios_tests {
    use super::*;
    use serial_test::serial;
    use tokio_test::{assert_err, assert_ok};

    const GAME: u32 = 10;
    const SINK: u32 = 20;
    const TARGET: u32 = 30;
    const BROWSER: u32 = 40;
    const HEADSET: u32 = 50;
    const HELPER: u32 = 60;

    fn test_config() -> RouterConfig {
        RouterConfig {
            snapshot_timeout_ms: 500,
            link_timeout_ms: 500,
            destroy_timeout_ms: 500,
            settle_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Game playing to the speakers, speakers' monitor feeding the recorder
    fn desktop_graph() -> Arc<FakeGraphManager> {
        let fake = Arc::new(FakeGraphManager::new());
        fake.add_node(
            GAME,
            &[
                ("media.class", "Stream/Output/Audio"),
                ("application.name", "Hades"),
                ("application.process.binary", "Hades.exe"),
                ("node.name", "Hades"),
            ],
        )
        .add_node(
            SINK,
            &[
                ("media.class", "Audio/Sink"),
                ("node.name", "alsa_output.pci-0000_00_1f.3.analog-stereo"),
                ("node.description", "Built-in Audio Analog Stereo"),
            ],
        )
        .add_node(
            TARGET,
            &[
                ("media.class", "Stream/Input/Audio"),
                ("application.name", "Steam"),
                ("application.process.binary", "steam"),
            ],
        )
        .add_node(
            BROWSER,
            &[
                ("media.class", "Stream/Output/Audio"),
                ("application.name", "Firefox"),
                ("application.process.binary", "firefox"),
                ("media.name", "YouTube"),
            ],
        )
        .add_node(
            HEADSET,
            &[
                ("media.class", "Audio/Source"),
                ("node.name", "bluez_input.00_1B_66_AA_BB_CC"),
                ("node.description", "WH-1000XM4 Headset"),
            ],
        )
        .add_node(
            HELPER,
            &[
                ("media.class", "Stream/Output/Audio"),
                ("application.name", "Steam Web Helper"),
                ("application.process.binary", "steamwebhelper"),
            ],
        );

        fake.add_port(11, GAME, PortDirection::Out)
            .add_port(12, GAME, PortDirection::Out)
            .add_port(21, SINK, PortDirection::Out)
            .add_port(22, SINK, PortDirection::Out)
            .add_port(23, SINK, PortDirection::In)
            .add_port(24, SINK, PortDirection::In)
            .add_port(31, TARGET, PortDirection::In)
            .add_port(32, TARGET, PortDirection::In)
            .add_port(41, BROWSER, PortDirection::Out)
            .add_port(42, BROWSER, PortDirection::Out)
            .add_port(51, HEADSET, PortDirection::Out)
            .add_port(61, HELPER, PortDirection::Out);

        // game → speakers, browser → speakers, speakers → recorder
        fake.add_link(100, 11, 23)
            .add_link(101, 12, 24)
            .add_link(102, 41, 23)
            .add_link(103, 42, 24)
            .add_link(200, 21, 31)
            .add_link(201, 22, 32);
        fake
    }

    fn controller(fake: &Arc<FakeGraphManager>) -> RoutingController {
        RoutingController::new(fake.clone(), test_config())
    }

    #[tokio::test]
    async fn test_basic_isolation() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        let outcome = assert_ok!(controller.apply_routing(&[GAME]).await);
        assert!(outcome.ok, "{}", outcome.summary);
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.connected, 1);
        assert_eq!(outcome.summary, "Removed 2 existing route(s), connected 1 source(s)");

        assert!(fake.links_between(SINK, TARGET).is_empty());
        assert_eq!(fake.links_between(GAME, TARGET).len(), 2);
        // Playback path untouched
        assert_eq!(fake.links_between(GAME, SINK).len(), 2);

        let routes = controller.current_routes().await.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routed_sources(&routes), vec![GAME]);
        assert!(routes.iter().all(|route| route.source_label == "Hades"));
        assert_eq!(
            controller.state().await,
            RoutingState::Isolated { sources: vec![GAME] }
        );
    }

    #[tokio::test]
    async fn test_created_links_carry_isolation_flags() {
        let fake = desktop_graph();
        controller(&fake).apply_routing(&[GAME]).await.unwrap();

        let created = fake.created_requests();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|request| request.flags == LinkFlags::isolated_route()));
        assert_eq!((created[0].source_port_id, created[0].target_port_id), (11, 31));
        assert_eq!((created[1].source_port_id, created[1].target_port_id), (12, 32));
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        controller.apply_routing(&[GAME]).await.unwrap();
        let second = controller.apply_routing(&[GAME]).await.unwrap();
        assert!(second.ok);
        assert_eq!(second.removed, 2);

        let routes = controller.current_routes().await.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routed_sources(&routes), vec![GAME]);
        assert_eq!(fake.links_between(GAME, SINK).len(), 2);
    }

    #[tokio::test]
    async fn test_switching_selection_keeps_previous_routes() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        controller.apply_routing(&[GAME]).await.unwrap();
        controller.apply_routing(&[BROWSER]).await.unwrap();

        // Only selected sources and sinks are removed; the game route stays
        let routes = controller.current_routes().await.unwrap();
        assert_eq!(routed_sources(&routes), vec![GAME, BROWSER]);
    }

    #[tokio::test]
    async fn test_empty_selection_only_removes_sink_bleed() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        let outcome = controller.apply_routing(&[]).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.removed, 2);
        assert_eq!(fake.calls().creates, 0);
        assert!(controller.current_routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_default_after_disconnect() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        controller.apply_routing(&[GAME]).await.unwrap();
        let disconnected = controller.disconnect_all().await.unwrap();
        assert!(disconnected.ok);
        assert_eq!(disconnected.removed, 2);
        assert!(controller.current_routes().await.unwrap().is_empty());
        assert_eq!(controller.state().await, RoutingState::Unrouted);

        let restored = controller.restore_default().await.unwrap();
        assert!(restored.ok, "{}", restored.summary);
        assert_eq!(restored.connected, 2);
        assert_eq!(fake.links_between(SINK, TARGET).len(), 2);

        let sink_links: Vec<_> = fake
            .created_requests()
            .into_iter()
            .filter(|request| request.source_node_id == SINK)
            .collect();
        assert_eq!(sink_links.len(), 2);
        assert!(sink_links.iter().all(|request| request.flags == LinkFlags::restored_sink()));
    }

    #[tokio::test]
    async fn test_restore_default_when_already_connected() {
        let fake = desktop_graph();
        let restored = controller(&fake).restore_default().await.unwrap();
        assert!(restored.ok);
        assert_eq!(fake.calls().creates, 0);
        assert_eq!(fake.links_between(SINK, TARGET).len(), 2);
    }

    #[tokio::test]
    async fn test_restore_default_without_sink() {
        let fake = desktop_graph();
        fake.remove_node(SINK);
        let restored = controller(&fake).restore_default().await.unwrap();
        assert!(!restored.ok);
        assert!(restored.summary.contains("No audio sink"));
        assert!(restored.into_result().is_err());
    }

    #[tokio::test]
    async fn test_invalid_sources_are_filtered() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        let outcome = controller.apply_routing(&[GAME, HEADSET, 999, SINK]).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.connected, 1);
        assert!(fake.links_between(HEADSET, TARGET).is_empty());
        assert_eq!(routed_sources(&controller.current_routes().await.unwrap()), vec![GAME]);
    }

    #[tokio::test]
    async fn test_no_valid_sources_mutates_nothing() {
        let fake = desktop_graph();
        let result = controller(&fake).apply_routing(&[HEADSET, 999]).await;

        assert!(matches!(result, Err(RoutingError::NoValidSources { requested: 2 })));
        assert_eq!(fake.calls().mutations(), 0);
        assert_eq!(fake.links_between(SINK, TARGET).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_target_mutates_nothing() {
        let fake = desktop_graph();
        fake.remove_node(TARGET);
        let controller = controller(&fake);

        for result in [
            controller.apply_routing(&[GAME]).await.map(|_| ()),
            controller.disconnect_all().await.map(|_| ()),
            controller.restore_default().await.map(|_| ()),
            controller.current_routes().await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(RoutingError::TargetNotFound { .. })));
        }
        assert_eq!(fake.calls().mutations(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let fake = desktop_graph();
        fake.fail_links_from_port(12);

        let outcome = controller(&fake).apply_routing(&[GAME]).await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.connected, 0);
        assert!(outcome.summary.ends_with("(1 failed)"), "{}", outcome.summary);
        assert!(matches!(
            outcome.into_result(),
            Err(RoutingError::PartialFailure { .. })
        ));
        // The channel that did link stays in place
        assert_eq!(fake.links_between(GAME, TARGET).len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_manager() {
        let fake = desktop_graph();
        fake.set_unavailable(true);
        let error = assert_err!(controller(&fake).apply_routing(&[GAME]).await);
        assert!(matches!(error, RoutingError::Unavailable(_)));
        assert_eq!(fake.calls().mutations(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_timeout() {
        let fake = desktop_graph();
        fake.set_dump_delay(Some(Duration::from_secs(10)));
        let started = std::time::Instant::now();

        let result = controller(&fake).detect_sources(&[]).await;
        assert!(matches!(result, Err(RoutingError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_detect_sources() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        let sources = controller.detect_sources(&[]).await.unwrap();
        let ids: Vec<u32> = sources.iter().map(|source| source.node_id).collect();
        // Recorder, its web helper and sinks are not offered
        assert_eq!(ids, vec![GAME, BROWSER, HEADSET]);

        let browser = &sources[1];
        assert_eq!(browser.label, "Firefox (YouTube)");
        assert_eq!(browser.role.to_string(), "Browser");
        assert_eq!(default_selection(&sources), vec![GAME]);

        let excluded = controller.detect_sources(&["Hades".to_string()]).await.unwrap();
        assert!(excluded[0].excluded);
        assert!(default_selection(&excluded).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_labels() {
        let fake = desktop_graph();
        let controller = controller(&fake);

        let labels = vec!["Hades".to_string(), "Firefox (YouTube)".to_string(), "Doom".to_string()];
        let (ids, unresolved) = controller.resolve_labels(&labels).await.unwrap();
        assert_eq!(ids, vec![GAME, BROWSER]);
        assert_eq!(unresolved, vec!["Doom".to_string()]);
    }

    #[tokio::test]
    async fn test_reads_are_cached_within_window() {
        let fake = desktop_graph();
        let clock = Arc::new(ManualClock::new());
        let controller = RoutingController::with_parts(
            fake.clone(),
            test_config(),
            Arc::new(Classifier::default()),
            clock.clone(),
        );

        controller.detect_sources(&[]).await.unwrap();
        controller.detect_sources(&[]).await.unwrap();
        assert_eq!(fake.calls().dumps, 1);

        clock.advance(Duration::from_secs(3));
        controller.detect_sources(&[]).await.unwrap();
        assert_eq!(fake.calls().dumps, 2);
    }

    #[tokio::test]
    async fn test_writes_never_use_cached_snapshot() {
        let fake = desktop_graph();
        let clock = Arc::new(ManualClock::new());
        let controller = RoutingController::with_parts(
            fake.clone(),
            test_config(),
            Arc::new(Classifier::default()),
            clock,
        );

        controller.detect_sources(&[]).await.unwrap();
        // Link appears after the cached read
        fake.add_port(25, SINK, PortDirection::Out).add_link(202, 25, 31);
        controller.apply_routing(&[GAME]).await.unwrap();
        assert!(fake.links_between(SINK, TARGET).is_empty());
    }

    #[tokio::test]
    async fn test_recording_target_info() {
        let fake = desktop_graph();
        let target = controller(&fake).recording_target().await.unwrap();
        assert_eq!(target.node_id, TARGET);
        assert_eq!(target.name, "Steam");
        assert_eq!(target.properties.get("media.class").unwrap(), "Stream/Input/Audio");
    }

    #[tokio::test]
    #[serial]
    async fn test_route_debug_does_not_change_outcome() {
        audio_isolator_lib::log::set_route_debug(true);
        let fake = desktop_graph();
        let outcome = controller(&fake).apply_routing(&[GAME]).await;
        audio_isolator_lib::log::set_route_debug(false);

        assert!(outcome.unwrap().ok);
    }
}
