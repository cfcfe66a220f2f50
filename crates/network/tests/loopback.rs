use diana_core::ObjectKind;
use diana_network::{Client, Proxy, SharedTracker};
use diana_protocol::{
    FrameCodec, ObjectUpdatePacket, Packet, ShipCommand, VersionPacket, WelcomePacket,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

#[tokio::test]
async fn proxy_relays_both_directions_and_tracks_server_state() {
    // stand-in for an Artemis server
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server.local_addr().unwrap();

    let tracker = SharedTracker::default();
    let proxy = Proxy::bind("127.0.0.1:0".parse().unwrap(), server_addr.to_string())
        .await
        .unwrap()
        .with_tracker(tracker.clone());
    let proxy_addr = proxy.local_addr().unwrap();
    let proxy_task = tokio::spawn(async move { proxy.run().await });

    let mut client = Client::connect("127.0.0.1", proxy_addr.port()).await.unwrap();

    let (upstream, _) = server.accept().await.unwrap();
    let mut upstream = Framed::new(upstream, FrameCodec::server());

    // mine 0x20 at x = 1.0
    let update = ObjectUpdatePacket::new(vec![
        0x06, 0x20, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x80, 0x3f, 0x00,
    ]);
    upstream.send(WelcomePacket::new("Welcome aboard").into()).await.unwrap();
    upstream.send(VersionPacket::new(2, 1, 1).into()).await.unwrap();
    upstream.send(update.clone().into()).await.unwrap();

    assert_eq!(
        client.next_packet().await.unwrap(),
        Some(Packet::Welcome(WelcomePacket::new("Welcome aboard")))
    );
    assert_eq!(
        client.next_packet().await.unwrap(),
        Some(Packet::Version(VersionPacket::new(2, 1, 1)))
    );
    assert_eq!(
        client.next_packet().await.unwrap(),
        Some(Packet::ObjectUpdate(update))
    );

    // the proxy observes before forwarding
    {
        let tracker = tracker.lock();
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(0x20).unwrap().kind(), ObjectKind::Mine);
    }

    client.send(ShipCommand::Ready.into()).await.unwrap();
    assert_eq!(
        upstream.next().await.unwrap().unwrap(),
        Packet::ShipCommand(ShipCommand::Ready)
    );

    drop(upstream);
    assert_eq!(client.next_packet().await.unwrap(), None);

    proxy_task.abort();
}

#[tokio::test]
async fn unreachable_server_closes_client() {
    // grab a free port, then release it so nothing is listening there
    let vacant = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let vacant_addr = vacant.local_addr().unwrap();
    drop(vacant);

    let proxy = Proxy::bind("127.0.0.1:0".parse().unwrap(), vacant_addr.to_string())
        .await
        .unwrap();
    let proxy_addr = proxy.local_addr().unwrap();
    let proxy_task = tokio::spawn(async move { proxy.run().await });

    let mut client = Client::connect("127.0.0.1", proxy_addr.port()).await.unwrap();
    assert_eq!(client.next_packet().await.unwrap(), None);

    proxy_task.abort();
}
