//! # Catch-Up Tests
//!
//! A lagging node downloads, verifies and stores the chain held by its
//! peers, then hands over to consensus exactly once.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{connect_all, wait_until, SyncNode, WAIT_LIMIT};
    use fast_sync::test_utils::ChainBuilder;
    use fast_sync::{FastSyncConfig, MemoryNetwork, SyncApi};
    use std::time::Duration;

    // =========================================================================
    // Single source
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_joiner_syncs_full_chain_from_one_peer() {
        let chain = ChainBuilder::new("catch-up").with_validators(&[10, 10, 10, 10]).build(500);
        let network = MemoryNetwork::new();

        let source = SyncNode::server(&network, 1, &chain, 500);
        let joiner = SyncNode::joiner(&network, 2, &chain);
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);

        for height in [1, 10, 500] {
            assert_eq!(joiner.block(height).as_ref(), Some(chain.block(height)));
        }
        for height in [501, 502, 600] {
            assert!(joiner.block(height).is_none());
        }
        assert_eq!(joiner.height(), 500);

        // Ticks keep running after the switch; no second hand-off.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let calls = joiner.handoff.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, chain.final_state);
        assert_eq!(calls[0].1, 500);

        let status = joiner.reactor.status();
        assert!(!status.syncing);
        assert_eq!(status.store_height, 500);
        assert_eq!(status.blocks_synced, 500);

        assert!(joiner.stop().await.is_ok());
        assert!(source.stop().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partial_store_resumes_from_its_tip() {
        let chain = ChainBuilder::new("resume").build(120);
        let network = MemoryNetwork::new();

        let source = SyncNode::server(&network, 1, &chain, 120);
        let joiner = SyncNode::spawn(&network, 2, &chain, 40, true, FastSyncConfig::for_testing());
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 120);
        assert_eq!(joiner.handoff.calls()[0].1, 80);
        assert_eq!(joiner.reactor.chain_state(), chain.final_state);
    }

    // =========================================================================
    // Many peers
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_multi_node_network_and_late_joiner() {
        let chain = ChainBuilder::new("multi").with_validators(&[3, 5, 7]).build(200);
        let network = MemoryNetwork::new();

        // Peers at height 0 must not trigger a premature switch before the
        // source's status arrives.
        let config = FastSyncConfig {
            quiescence_window_ms: 500,
            ..FastSyncConfig::for_testing()
        };

        let source = SyncNode::server(&network, 1, &chain, 200);
        let syncers: Vec<SyncNode> = (2..=4)
            .map(|id| SyncNode::spawn(&network, id, &chain, 0, true, config.clone()))
            .collect();

        let mut ids = vec![source.id];
        ids.extend(syncers.iter().map(|n| n.id));
        connect_all(&network, &ids);

        assert!(wait_until(WAIT_LIMIT, || syncers.iter().all(SyncNode::switched)).await);
        for node in &syncers {
            assert_eq!(node.height(), 200);
            assert_eq!(node.handoff.count(), 1);
            assert_eq!(network.peer_count(node.id), ids.len() - 1);
        }

        // A late joiner can sync from the whole network, switched nodes
        // included.
        let late = SyncNode::spawn(&network, 9, &chain, 0, true, config);
        for id in &ids {
            network.connect(*id, late.id);
        }
        assert!(wait_until(WAIT_LIMIT, || late.switched()).await);
        assert_eq!(late.height(), 200);
        assert_eq!(late.block(200).as_ref(), Some(chain.block(200)));
        assert_eq!(network.peer_count(late.id), ids.len());
    }

    // =========================================================================
    // Completion gate
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_zero_quiescence_switches_once_caught_up() {
        let chain = ChainBuilder::new("quiet").build(30);
        let network = MemoryNetwork::new();
        let config = FastSyncConfig {
            quiescence_window_ms: 0,
            ..FastSyncConfig::for_testing()
        };

        let source = SyncNode::server(&network, 1, &chain, 30);
        let joiner = SyncNode::spawn(&network, 2, &chain, 0, true, config);
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 30);
        assert_eq!(joiner.handoff.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_long_quiescence_holds_switch_after_download() {
        let chain = ChainBuilder::new("quiet").build(30);
        let network = MemoryNetwork::new();
        let config = FastSyncConfig {
            quiescence_window_ms: 60_000,
            ..FastSyncConfig::for_testing()
        };

        let source = SyncNode::server(&network, 1, &chain, 30);
        let joiner = SyncNode::spawn(&network, 2, &chain, 0, true, config);
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.height() == 30).await);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!joiner.switched());
        assert!(joiner.is_syncing());
        assert!(joiner.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_node_without_peers_keeps_waiting() {
        let chain = ChainBuilder::new("alone").build(5);
        let network = MemoryNetwork::new();
        let joiner = SyncNode::joiner(&network, 1, &chain);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!joiner.switched());
        assert_eq!(joiner.height(), 0);
        assert!(joiner.stop().await.is_ok());
    }
}
