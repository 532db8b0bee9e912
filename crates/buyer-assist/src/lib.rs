//! Process-wide assistive download ticket registry.
//!
//! Two buyers trading with the same seller for the same work (same
//! `handprint`) can hint each other at chunk availability by exchanging
//! short-lived tickets. The registry is a best-effort, in-memory side
//! channel: losing a ticket never fails a trade.

use std::sync::Arc;

use buyer_primitives::{AssistiveTicketNode, Fingerprint};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Callback invoked when a ticket becomes available to offer to a node's
/// seller. Registry callbacks are serialized per node: while one callback
/// for a node is running, no other callback for the same node can start.
pub type TicketCallback = Box<dyn Fn(String) + Send + Sync>;

struct NodeEntry {
    node: AssistiveTicketNode,
    callback: Option<TicketCallback>,
    refcount: usize,
}

/// A `(seller, handprint)` key.
type NodeKey = (String, Fingerprint);

/// The process-wide registry. Cheap to clone; all clones share the same
/// underlying map.
#[derive(Clone, Default)]
pub struct AssistiveTicketRegistry {
    nodes: Arc<DashMap<NodeKey, Arc<Mutex<NodeEntry>>>>,
}

impl AssistiveTicketRegistry {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `(seller, handprint)`. Attaches to an existing
    /// node for the same pair if one is already registered (ref-counted);
    /// otherwise creates a new one. `on_ticket_offered` replaces any
    /// previously registered callback for this pair.
    pub fn init_node(&self, seller: &str, handprint: Fingerprint, on_ticket_offered: TicketCallback) {
        let key = (seller.to_string(), handprint);
        let entry = self
            .nodes
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Mutex::new(NodeEntry {
                    node: AssistiveTicketNode::new(handprint),
                    callback: None,
                    refcount: 0,
                }))
            })
            .clone();
        let mut guard = entry.lock();
        guard.refcount += 1;
        guard.callback = Some(on_ticket_offered);
    }

    /// Drop interest in `(seller, handprint)`. The node is removed once no
    /// caller references it.
    pub fn exit_node(&self, seller: &str, handprint: Fingerprint) {
        let key = (seller.to_string(), handprint);
        let should_remove = match self.nodes.get(&key) {
            Some(entry) => {
                let mut guard = entry.lock();
                guard.refcount = guard.refcount.saturating_sub(1);
                guard.refcount == 0
            }
            None => return,
        };
        if should_remove {
            self.nodes.remove(&key);
        }
    }

    /// Record that `from_seller` offered us `ticket`, and fan it out to
    /// every other interested node sharing the same `handprint`.
    pub fn new_ticket(&self, from_seller: &str, handprint: Fingerprint, ticket: String) {
        if let Some(entry) = self.nodes.get(&(from_seller.to_string(), handprint)) {
            entry.lock().node.incoming.push(ticket.clone());
        }

        for item in self.nodes.iter() {
            let (seller, node_handprint) = item.key();
            if node_handprint != &handprint || seller == from_seller {
                continue;
            }
            let entry = item.value().clone();
            let mut guard = entry.lock();
            if !guard.node.interested {
                continue;
            }
            guard.node.outgoing.push(ticket.clone());
            if let Some(callback) = guard.callback.as_ref() {
                callback(ticket.clone());
            }
        }
    }

    /// Mark whether our own activity at `(seller, handprint)` still wishes
    /// to send more tickets.
    pub fn set_node_interested(&self, seller: &str, handprint: Fingerprint, interested: bool) {
        if let Some(entry) = self.nodes.get(&(seller.to_string(), handprint)) {
            entry.lock().node.interested = interested;
        }
    }

    /// Number of registered nodes. Exposed for tests.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry currently holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn init_exit_removes_node_at_zero_refcount() {
        let registry = AssistiveTicketRegistry::new();
        let hp = Fingerprint::digest(b"work");
        registry.init_node("seller-a", hp, Box::new(|_| {}));
        assert_eq!(registry.len(), 1);
        registry.init_node("seller-a", hp, Box::new(|_| {}));
        registry.exit_node("seller-a", hp);
        assert_eq!(registry.len(), 1, "still referenced once");
        registry.exit_node("seller-a", hp);
        assert!(registry.is_empty());
    }

    #[test]
    fn ticket_fans_out_to_other_interested_nodes_with_same_handprint() {
        let registry = AssistiveTicketRegistry::new();
        let hp = Fingerprint::digest(b"work");
        let other_hp = Fingerprint::digest(b"other-work");

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        registry.init_node(
            "seller-b",
            hp,
            Box::new(move |_ticket| {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry.init_node("seller-c", other_hp, Box::new(|_| {}));

        registry.new_ticket("seller-a", hp, "ticket-1".to_string());

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn uninterested_node_does_not_receive_callback() {
        let registry = AssistiveTicketRegistry::new();
        let hp = Fingerprint::digest(b"work");
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        registry.init_node(
            "seller-b",
            hp,
            Box::new(move |_| {
                received_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry.set_node_interested("seller-b", hp, false);
        registry.new_ticket("seller-a", hp, "ticket-1".to_string());
        assert_eq!(received.load(Ordering::SeqCst), 0);
    }
}
