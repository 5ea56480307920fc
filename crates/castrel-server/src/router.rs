//! Dispatch logic: who receives an inbound envelope, and in what form.

use crate::registry::{PeerHandle, Registry};
use castrel_core::{Envelope, Payload, Route};
use tracing::{debug, warn};

/// Select the recipients for an envelope among the given peers.
///
/// Matching is by display name with ASCII case folding, and may select more
/// than one peer per name since duplicates are never rejected at handshake.
/// The sender is exempted by name as well, so sessions sharing the sender's
/// name are skipped on broadcast and blockcast.
pub fn recipients<'a>(
    sender_name: &str,
    route: &Route,
    peers: &'a [PeerHandle],
) -> Vec<&'a PeerHandle> {
    match route {
        Route::Broadcast => peers
            .iter()
            .filter(|p| !p.name.eq_ignore_ascii_case(sender_name))
            .collect(),
        Route::Unicast { target } => peers
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(target))
            .collect(),
        Route::Blockcast { exclude } => peers
            .iter()
            .filter(|p| {
                !p.name.eq_ignore_ascii_case(sender_name) && !p.name.eq_ignore_ascii_case(exclude)
            })
            .collect(),
        Route::Logout => Vec::new(),
    }
}

/// Rewrite an envelope for delivery.
///
/// Text payloads get the sender's name prefixed as `@sender: text`. File
/// payloads are forwarded byte-identical, without sender attribution.
pub fn outbound(sender_name: &str, envelope: &Envelope) -> Envelope {
    match &envelope.payload {
        Payload::Text(text) => Envelope {
            route: envelope.route.clone(),
            payload: Payload::Text(format!("@{sender_name}: {text}")),
        },
        Payload::File { .. } => envelope.clone(),
    }
}

/// Route one inbound envelope: compute the recipient set from a registry
/// snapshot and queue the outbound envelope to each recipient.
///
/// A failed delivery to one recipient (full or closed outbox) is logged and
/// skipped; it never aborts delivery to the remaining recipients.
pub async fn dispatch(registry: &Registry, sender_name: &str, envelope: &Envelope) {
    let peers = registry.snapshot().await;
    let targets = recipients(sender_name, &envelope.route, &peers);
    if targets.is_empty() {
        debug!(sender = %sender_name, "no recipients for envelope");
        return;
    }

    let out = outbound(sender_name, envelope);
    let mut delivered = 0usize;
    for peer in targets {
        match peer.outbox.try_send(out.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(id = peer.id, name = %peer.name, error = %e, "delivery failed, skipping recipient");
            }
        }
    }
    debug!(sender = %sender_name, delivered, "envelope dispatched");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionId;
    use tokio::sync::mpsc;

    fn peers_named(names: &[&str]) -> (Vec<PeerHandle>, Vec<mpsc::Receiver<Envelope>>) {
        let mut handles = Vec::new();
        let mut inboxes = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let (tx, rx) = mpsc::channel(8);
            handles.push(PeerHandle {
                id: i as SessionId + 1,
                name: name.to_string(),
                outbox: tx,
            });
            inboxes.push(rx);
        }
        (handles, inboxes)
    }

    fn names(selected: &[&PeerHandle]) -> Vec<String> {
        selected.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn broadcast_excludes_sender() {
        let (peers, _rx) = peers_named(&["alice", "bob", "carol"]);
        let selected = recipients("alice", &Route::Broadcast, &peers);
        assert_eq!(names(&selected), vec!["bob", "carol"]);
    }

    #[test]
    fn unicast_selects_all_case_insensitive_matches() {
        let (peers, _rx) = peers_named(&["alice", "Bob", "bob", "carol"]);
        let selected = recipients(
            "alice",
            &Route::Unicast {
                target: "BOB".into(),
            },
            &peers,
        );
        assert_eq!(names(&selected), vec!["Bob", "bob"]);
    }

    #[test]
    fn blockcast_excludes_sender_and_named_party() {
        let (peers, _rx) = peers_named(&["alice", "bob", "carol"]);
        let selected = recipients(
            "alice",
            &Route::Blockcast {
                exclude: "Carol".into(),
            },
            &peers,
        );
        assert_eq!(names(&selected), vec!["bob"]);
    }

    #[test]
    fn logout_selects_nobody() {
        let (peers, _rx) = peers_named(&["alice", "bob"]);
        let selected = recipients("alice", &Route::Logout, &peers);
        assert!(selected.is_empty());
    }

    #[test]
    fn text_payload_gets_sender_prefix() {
        let envelope = Envelope::text(Route::Broadcast, "hi");
        let out = outbound("alice", &envelope);
        assert_eq!(out.payload, Payload::Text("@alice: hi".into()));
        assert_eq!(out.route, Route::Broadcast);
    }

    #[test]
    fn file_payload_is_forwarded_unmodified() {
        let envelope = Envelope {
            route: Route::Unicast {
                target: "bob".into(),
            },
            payload: Payload::File {
                name: "photo.png".into(),
                bytes: vec![1, 2, 3],
            },
        };
        let out = outbound("alice", &envelope);
        assert_eq!(out, envelope);
    }

    #[tokio::test]
    async fn dispatch_delivers_to_recipient_queues() {
        let registry = Registry::new(8);
        let (peers, mut inboxes) = peers_named(&["alice", "bob", "carol"]);
        for peer in peers {
            assert!(registry.insert(peer).await);
        }

        let envelope = Envelope::text(Route::Broadcast, "hi");
        dispatch(&registry, "alice", &envelope).await;

        let expected = Envelope::text(Route::Broadcast, "@alice: hi");
        assert_eq!(inboxes[1].recv().await, Some(expected.clone()));
        assert_eq!(inboxes[2].recv().await, Some(expected));
        assert!(inboxes[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_skips_failed_recipient_and_continues() {
        let registry = Registry::new(8);
        let (peers, mut inboxes) = peers_named(&["alice", "bob", "carol"]);
        for peer in peers {
            assert!(registry.insert(peer).await);
        }
        // Bob's session is gone; its outbox only has closed receivers.
        inboxes.remove(1);

        let envelope = Envelope::text(Route::Broadcast, "hi");
        dispatch(&registry, "alice", &envelope).await;

        let expected = Envelope::text(Route::Broadcast, "@alice: hi");
        assert_eq!(inboxes[1].recv().await, Some(expected));
    }
}
