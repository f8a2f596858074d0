//! # In-Memory Network
//!
//! Process-local switch connecting reactors over tokio channels. Every
//! node registers once and receives its [`TransportEvent`]s on an unbounded
//! channel; links are undirected. Messages travel as encoded bytes so the
//! codec path is exercised exactly as with a real transport.

use crate::adapters::codec::SyncCodec;
use crate::domain::{PeerFault, SyncMessage, TransportError};
use crate::ports::outbound::{Transport, TransportEvent};
use parking_lot::RwLock;
use shared_types::PeerId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

fn link(a: PeerId, b: PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
struct Switch {
    inboxes: HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>,
    links: BTreeSet<(PeerId, PeerId)>,
}

impl Switch {
    fn is_linked(&self, a: PeerId, b: PeerId) -> bool {
        self.links.contains(&link(a, b))
    }

    fn notify(&self, target: PeerId, event: TransportEvent) {
        if let Some(inbox) = self.inboxes.get(&target) {
            let _ = inbox.send(event);
        }
    }

    fn disconnect(&mut self, a: PeerId, b: PeerId) -> bool {
        if !self.links.remove(&link(a, b)) {
            return false;
        }
        self.notify(a, TransportEvent::PeerDisconnected(b));
        self.notify(b, TransportEvent::PeerDisconnected(a));
        true
    }

    fn peers_of(&self, id: PeerId) -> Vec<PeerId> {
        self.links
            .iter()
            .filter_map(|(a, b)| {
                if *a == id {
                    Some(*b)
                } else if *b == id {
                    Some(*a)
                } else {
                    None
                }
            })
            .collect()
    }

    fn deliver(&self, from: PeerId, to: PeerId, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_linked(from, to) {
            return Err(TransportError::PeerNotConnected(to));
        }
        let inbox = self
            .inboxes
            .get(&to)
            .ok_or(TransportError::PeerNotConnected(to))?;
        inbox
            .send(TransportEvent::Message {
                peer: from,
                payload,
            })
            .map_err(|_| TransportError::ChannelClosed(to))
    }
}

/// The shared switch. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    switch: Arc<RwLock<Switch>>,
    codec: SyncCodec,
}

impl MemoryNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node. Re-registering an id replaces its inbox.
    pub fn register(
        &self,
        id: PeerId,
    ) -> (Arc<MemoryTransport>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.switch.write().inboxes.insert(id, tx);
        let transport = Arc::new(MemoryTransport {
            id,
            switch: Arc::clone(&self.switch),
            codec: self.codec,
        });
        (transport, rx)
    }

    /// Link two registered nodes; both sides see `PeerConnected`.
    pub fn connect(&self, a: PeerId, b: PeerId) -> bool {
        let mut switch = self.switch.write();
        if a == b
            || !switch.inboxes.contains_key(&a)
            || !switch.inboxes.contains_key(&b)
            || !switch.links.insert(link(a, b))
        {
            return false;
        }
        switch.notify(a, TransportEvent::PeerConnected(b));
        switch.notify(b, TransportEvent::PeerConnected(a));
        true
    }

    /// Remove a link; both sides see `PeerDisconnected`.
    pub fn disconnect(&self, a: PeerId, b: PeerId) -> bool {
        self.switch.write().disconnect(a, b)
    }

    /// Detach a node and drop all of its links.
    pub fn unregister(&self, id: PeerId) {
        let mut switch = self.switch.write();
        for peer in switch.peers_of(id) {
            switch.disconnect(id, peer);
        }
        switch.inboxes.remove(&id);
    }

    /// Current neighbours of `id`.
    pub fn peers_of(&self, id: PeerId) -> Vec<PeerId> {
        self.switch.read().peers_of(id)
    }

    /// Number of neighbours of `id`.
    pub fn peer_count(&self, id: PeerId) -> usize {
        self.peers_of(id).len()
    }

    /// Inject raw bytes as if `from` had sent them to `to`.
    pub fn send_raw(&self, from: PeerId, to: PeerId, payload: Vec<u8>) -> Result<(), TransportError> {
        self.switch.read().deliver(from, to, payload)
    }

    /// Encode and inject a message from `from` to `to`.
    pub fn send_as(
        &self,
        from: PeerId,
        to: PeerId,
        message: &SyncMessage,
    ) -> Result<(), TransportError> {
        let payload = self.codec.encode(message)?;
        self.send_raw(from, to, payload)
    }
}

/// One node's handle on the [`MemoryNetwork`].
pub struct MemoryTransport {
    id: PeerId,
    switch: Arc<RwLock<Switch>>,
    codec: SyncCodec,
}

impl MemoryTransport {
    /// Id this transport sends as.
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl Transport for MemoryTransport {
    fn send(&self, peer: PeerId, message: &SyncMessage) -> Result<(), TransportError> {
        let payload = self.codec.encode(message)?;
        self.switch.read().deliver(self.id, peer, payload)
    }

    fn broadcast(&self, message: &SyncMessage) {
        let payload = match self.codec.encode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, kind = message.kind(), "[fast-sync] Broadcast encode failed");
                return;
            }
        };
        let switch = self.switch.read();
        for peer in switch.peers_of(self.id) {
            if let Err(e) = switch.deliver(self.id, peer, payload.clone()) {
                debug!(%peer, error = %e, "[fast-sync] Broadcast delivery failed");
            }
        }
    }

    fn report_peer(&self, peer: PeerId, fault: &PeerFault) {
        warn!(
            %peer,
            reason = %fault,
            "[fast-sync] Disconnecting reported peer"
        );
        self.switch.write().disconnect(self.id, peer);
    }
}
