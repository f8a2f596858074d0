//! # Misbehaving Peer Tests
//!
//! Peers serving another chain or undecodable bytes lose their link; the
//! syncing node never stores a block that is not on its own chain.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{wait_until, SyncNode, WAIT_LIMIT};
    use fast_sync::test_utils::{ChainBuilder, TestChain};
    use fast_sync::{MemoryNetwork, SyncApi};
    use shared_types::PeerId;

    fn assert_prefix_of(node: &SyncNode, chain: &TestChain) {
        for height in 1..=node.height() {
            assert_eq!(
                node.block(height).as_ref(),
                Some(chain.block(height)),
                "block {height} is not on the expected chain"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peer_on_other_chain_is_disconnected() {
        // Same validators and chain id; only the genesis time differs.
        let good = ChainBuilder::new("bad-block").build(148);
        let other = ChainBuilder::new("bad-block").genesis_time(7).build(148);
        let network = MemoryNetwork::new();

        let mut servers: Vec<SyncNode> = (1..=3)
            .map(|id| SyncNode::server(&network, id, &good, 148))
            .collect();
        servers.push(SyncNode::server(&network, 4, &other, 148));

        let joiner = SyncNode::joiner(&network, 9, &good);
        for server in &servers {
            network.connect(server.id, joiner.id);
        }

        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);

        // When the foreign peer's commit meets an honest block, both
        // suppliers are blamed, so one honest peer may go with it. The
        // foreign blocks leave with their supplier, so no second honest
        // peer can be caught.
        let bad = PeerId::from_index(4);
        assert_eq!(joiner.height(), 148);
        assert_eq!(joiner.reactor.chain_state(), good.final_state);
        assert_prefix_of(&joiner, &good);
        assert!(!network.peers_of(joiner.id).contains(&bad));
        assert!(network.peer_count(joiner.id) < servers.len());
        assert!(network.peer_count(joiner.id) >= servers.len() - 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lone_foreign_peer_stores_nothing() {
        let good = ChainBuilder::new("foreign").build(20);
        let other = ChainBuilder::new("foreign").genesis_time(99).build(20);
        let network = MemoryNetwork::new();

        let liar = SyncNode::server(&network, 1, &other, 20);
        let joiner = SyncNode::joiner(&network, 2, &good);
        network.connect(liar.id, joiner.id);

        assert!(wait_until(WAIT_LIMIT, || network.peer_count(joiner.id) == 0).await);
        assert_eq!(joiner.height(), 0);
        assert!(!joiner.switched());
        assert!(joiner.is_syncing());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_undecodable_message_disconnects_sender() {
        let chain = ChainBuilder::new("garbage").build(40);
        let network = MemoryNetwork::new();

        let source = SyncNode::server(&network, 1, &chain, 40);
        let joiner = SyncNode::joiner(&network, 2, &chain);

        let noisy = PeerId::from_index(3);
        let (_noisy_transport, _noisy_inbox) = network.register(noisy);
        network.connect(noisy, joiner.id);
        network.connect(source.id, joiner.id);

        network
            .send_raw(noisy, joiner.id, vec![0xFF; 9])
            .expect("noisy peer is linked");

        assert!(wait_until(WAIT_LIMIT, || !network.peers_of(joiner.id).contains(&noisy)).await);
        assert!(wait_until(WAIT_LIMIT, || joiner.switched()).await);
        assert_eq!(joiner.height(), 40);
        assert_eq!(network.peers_of(joiner.id), vec![source.id]);
    }
}
