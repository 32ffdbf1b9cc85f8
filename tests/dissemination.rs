use libp2p_multicast::host::testing::{connect, connect_pair};
use libp2p_multicast::{
    Config, Error, ForwardValidator, Listener, Message, Multicast, PeerId, PeerRecord,
    SubscriptionOptions, Topic, ValidatorResult, PROTOCOL_ID,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Collector {
    tx: mpsc::UnboundedSender<Message>,
}

impl Listener for Collector {
    fn on_message(&self, message: &Message) {
        let _ = self.tx.send(message.clone());
    }
}

fn collector() -> (Arc<Collector>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Collector { tx }), rx)
}

async fn recv_within(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Message> {
    tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await
        .unwrap_or(None)
}

async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Message>) {
    assert!(
        tokio::time::timeout(Duration::from_millis(150), rx.recv())
            .await
            .is_err(),
        "expected no message to arrive"
    );
}

/// Scenario: a two-node link with `hops = 1` delivers locally on both ends.
#[tokio::test]
async fn two_node_hop_one_delivers_to_both_ends() {
    env_logger::try_init().ok();

    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);

    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let node_b = Multicast::new(peer_b.clone(), Config::default());

    let (host_a, host_b) = connect_pair(peer_a, peer_b);
    node_a.start(Arc::new(host_a)).unwrap();
    node_b.start(Arc::new(host_b)).unwrap();

    let (listener_a, mut rx_a) = collector();
    let (listener_b, mut rx_b) = collector();
    node_a
        .subscribe(Topic::new("chat"), listener_a, SubscriptionOptions::new())
        .unwrap();
    node_b
        .subscribe(Topic::new("chat"), listener_b, SubscriptionOptions::new())
        .unwrap();

    // Let each side's subscription announcement land before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;

    node_a
        .publish(vec![Topic::new("chat")], vec![b"hello".to_vec()], 1)
        .await
        .unwrap();

    let got_a = recv_within(&mut rx_a).await.expect("local delivery on publisher");
    assert_eq!(got_a.data, b"hello");

    let got_b = recv_within(&mut rx_b).await.expect("delivery across the link");
    assert_eq!(got_b.data, b"hello");
}

/// Scenario: a three-node line A-B-C. Publishing from A with `hops = 2`
/// reaches C via B even though A and C never connect directly.
#[tokio::test]
async fn three_node_line_forwards_across_the_middle_peer() {
    env_logger::try_init().ok();

    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);
    let peer_c = PeerId::new(vec![3]);

    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let node_b = Multicast::new(peer_b.clone(), Config::default());
    let node_c = Multicast::new(peer_c.clone(), Config::default());

    let (host_a, host_b) = connect_pair(peer_a.clone(), peer_b.clone());
    let host_c = connect(&host_b, peer_b.clone(), peer_c.clone());

    node_a.start(Arc::new(host_a)).unwrap();
    node_b.start(Arc::new(host_b)).unwrap();
    node_c.start(Arc::new(host_c)).unwrap();

    let (listener_b, _rx_b) = collector();
    let (listener_c, mut rx_c) = collector();
    node_b
        .subscribe(Topic::new("news"), listener_b, SubscriptionOptions::new())
        .unwrap();
    node_c
        .subscribe(Topic::new("news"), listener_c, SubscriptionOptions::new())
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    node_a
        .publish(vec![Topic::new("news")], vec![b"breaking".to_vec()], 2)
        .await
        .unwrap();

    let got_c = recv_within(&mut rx_c).await.expect("delivery through the middle peer");
    assert_eq!(got_c.data, b"breaking");
}

/// Scenario: a forwarding validator that always rejects prevents delivery
/// across a link without affecting local delivery on the publishing node.
#[tokio::test]
async fn rejecting_validator_blocks_forwarding_but_not_local_delivery() {
    env_logger::try_init().ok();

    struct NeverForward;

    #[async_trait::async_trait]
    impl ForwardValidator for NeverForward {
        async fn validate(&self, _peer: &PeerRecord, _message: &Message) -> ValidatorResult {
            Ok(false)
        }
    }

    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);
    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let node_b = Multicast::new(peer_b.clone(), Config::default());

    let (host_a, host_b) = connect_pair(peer_a, peer_b);
    node_a.start(Arc::new(host_a)).unwrap();
    node_b.start(Arc::new(host_b)).unwrap();

    let (listener_a, mut rx_a) = collector();
    let (listener_b, mut rx_b) = collector();
    node_a
        .subscribe(
            Topic::new("chat"),
            listener_a,
            SubscriptionOptions::with_forward_hooks(vec![Arc::new(NeverForward)]),
        )
        .unwrap();
    node_b
        .subscribe(Topic::new("chat"), listener_b, SubscriptionOptions::new())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    node_a
        .publish(vec![Topic::new("chat")], vec![b"blocked".to_vec()], 1)
        .await
        .unwrap();

    let local = recv_within(&mut rx_a)
        .await
        .expect("local delivery is unaffected by forward hooks");
    assert_eq!(local.data, b"blocked");
    assert_silent(&mut rx_b).await;
}

/// Scenario: once a peer's connection drops mid-forward, the remaining
/// peers still receive the message and nothing panics.
#[tokio::test]
async fn disconnecting_one_peer_does_not_disrupt_delivery_to_others() {
    env_logger::try_init().ok();

    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);
    let peer_c = PeerId::new(vec![3]);

    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let node_b = Multicast::new(peer_b.clone(), Config::default());
    let node_c = Multicast::new(peer_c.clone(), Config::default());

    let (host_a, host_b) = connect_pair(peer_a.clone(), peer_b.clone());
    let host_c = connect(&host_a, peer_a.clone(), peer_c.clone());

    node_a.start(Arc::new(host_a)).unwrap();
    node_b.start(Arc::new(host_b)).unwrap();
    node_c.start(Arc::new(host_c)).unwrap();

    let (listener_b, mut rx_b) = collector();
    let (listener_c, mut rx_c) = collector();
    node_b
        .subscribe(Topic::new("chat"), listener_b, SubscriptionOptions::new())
        .unwrap();
    node_c
        .subscribe(Topic::new("chat"), listener_c, SubscriptionOptions::new())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    node_c.stop().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    node_a
        .publish(vec![Topic::new("chat")], vec![b"still here".to_vec()], 1)
        .await
        .unwrap();

    let got_b = recv_within(&mut rx_b).await.expect("b still receives despite c's disconnect");
    assert_eq!(got_b.data, b"still here");
    assert_silent(&mut rx_c).await;
}

/// Scenario: publishing before `start` fails with `Error::NotStarted`.
#[tokio::test]
async fn publish_before_start_is_rejected() {
    let node = Multicast::new(PeerId::new(vec![9]), Config::default());
    let err = node
        .publish(vec![Topic::new("chat")], vec![b"x".to_vec()], 1)
        .await;
    assert!(matches!(err, Err(Error::NotStarted)));
}

/// Subscription mirror (§8): after `subscribe`, a connected peer's
/// `peers(topic)` view includes us; after `unsubscribe`, it eventually does
/// not. `ls()` reflects our own local subscription set throughout.
#[tokio::test]
async fn subscribe_and_unsubscribe_are_mirrored_to_the_connected_peer() {
    env_logger::try_init().ok();

    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);

    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let node_b = Multicast::new(peer_b.clone(), Config::default());

    let (host_a, host_b) = connect_pair(peer_a.clone(), peer_b.clone());
    node_a.start(Arc::new(host_a)).unwrap();
    node_b.start(Arc::new(host_b)).unwrap();

    let (listener_a, _rx_a) = collector();
    node_a
        .subscribe(Topic::new("chat"), listener_a, SubscriptionOptions::new())
        .unwrap();
    assert_eq!(node_a.ls(), vec![Topic::new("chat")]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mirrored = node_b.peers(Some(&Topic::new("chat")));
    assert!(mirrored.contains(&peer_a));

    node_a.unsubscribe(Topic::new("chat"), &[]).unwrap();
    assert!(node_a.ls().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = node_b.peers(Some(&Topic::new("chat")));
    assert!(!after.contains(&peer_a));
}

/// `start` registers `Config::protocol_id` with the host (§6), rather than
/// the field sitting unread.
#[tokio::test]
async fn start_registers_the_configured_protocol_id_with_the_host() {
    let peer_a = PeerId::new(vec![1]);
    let peer_b = PeerId::new(vec![2]);

    let node_a = Multicast::new(peer_a.clone(), Config::default());
    let (host_a, _host_b) = connect_pair(peer_a, peer_b);
    let host_a = Arc::new(host_a);

    assert_eq!(host_a.registered_protocol(), None);
    node_a.start(host_a.clone()).unwrap();
    assert_eq!(host_a.registered_protocol(), Some(PROTOCOL_ID));
}
