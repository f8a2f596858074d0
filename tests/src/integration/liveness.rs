//! # Liveness Tests
//!
//! Unresponsive and departing peers must not stall a sync.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{wait_until, SyncNode, WAIT_LIMIT};
    use fast_sync::test_utils::ChainBuilder;
    use fast_sync::{MemoryNetwork, SyncApi, SyncMessage};
    use shared_types::PeerId;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_silent_peer_evicted_then_sync_completes() {
        let chain = ChainBuilder::new("silent").build(50);
        let network = MemoryNetwork::new();
        let joiner = SyncNode::joiner(&network, 1, &chain);

        // Claims the chain, never answers a request.
        let silent = PeerId::from_index(2);
        let (_silent_transport, _silent_inbox) = network.register(silent);
        network.connect(silent, joiner.id);
        network
            .send_as(silent, joiner.id, &SyncMessage::StatusResponse { height: 50 })
            .expect("silent peer is linked");

        // Alone, the silent peer is retried until it runs out of chances.
        assert!(wait_until(WAIT_LIMIT, || network.peer_count(joiner.id) == 0).await);
        assert_eq!(joiner.height(), 0);
        assert!(joiner.reactor.with_pool(|pool| pool.peer_ids().is_empty()));

        let source = SyncNode::server(&network, 3, &chain, 50);
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 50);
        assert_eq!(joiner.handoff.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_silent_peer_does_not_block_good_peer() {
        let chain = ChainBuilder::new("silent").build(80);
        let network = MemoryNetwork::new();
        let joiner = SyncNode::joiner(&network, 1, &chain);
        let source = SyncNode::server(&network, 2, &chain, 80);

        let silent = PeerId::from_index(3);
        let (_silent_transport, _silent_inbox) = network.register(silent);
        network.connect(silent, joiner.id);
        network
            .send_as(silent, joiner.id, &SyncMessage::StatusResponse { height: 80 })
            .expect("silent peer is linked");
        network.connect(source.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 80);
        assert_eq!(joiner.reactor.chain_state(), chain.final_state);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_source_leaving_mid_sync_is_replaced() {
        let chain = ChainBuilder::new("churn").build(300);
        let network = MemoryNetwork::new();
        let joiner = SyncNode::joiner(&network, 1, &chain);

        let first = SyncNode::server(&network, 2, &chain, 300);
        network.connect(first.id, joiner.id);
        assert!(wait_until(WAIT_LIMIT, || joiner.height() >= 20).await);

        network.unregister(first.id);
        let second = SyncNode::server(&network, 3, &chain, 300);
        network.connect(second.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 300);
        assert_eq!(network.peers_of(joiner.id), vec![second.id]);
    }
}
