use std::sync::Arc;

use framewire_core::{BufferView, SendOutcome};
use framewire_udp::{UdpClient, UdpClientConfig, UdpClientEvent, UdpServer, UdpServerConfig, UdpServerEvent};
use tokio_util::sync::CancellationToken;

/// A datagram sent to a bound server arrives through `PacketArrived` with
/// the sender's address attached, and the server can post a reply back to
/// that address since `UdpServer::post` takes an explicit destination.
#[tokio::test(flavor = "multi_thread")]
async fn server_echoes_a_datagram_back_to_its_sender() {
    let cancel = CancellationToken::new();
    let server = Arc::new(UdpServer::new(UdpServerConfig::new("127.0.0.1".parse().unwrap(), 0)));
    let mut server_events = Arc::clone(&server).start(cancel.child_token());
    let local_addr = match server_events.recv().await.unwrap() {
        UdpServerEvent::Started { local_addr } => local_addr,
        other => panic!("expected Started, got {other:?}"),
    };

    let server_for_echo = Arc::clone(&server);
    tokio::spawn(async move {
        while let Some(event) = server_events.recv().await {
            if let UdpServerEvent::PacketArrived { from, data } = event {
                server_for_echo.post(from, data);
            }
        }
    });

    let client = Arc::new(UdpClient::new(UdpClientConfig::new("127.0.0.1", local_addr.port())));
    let mut client_events = Arc::clone(&client).start(cancel.child_token());
    let target = loop {
        match client_events.recv().await.unwrap() {
            UdpClientEvent::Ready { target } => break target,
            UdpClientEvent::Started => continue,
            other => panic!("unexpected event before ready: {other:?}"),
        }
    };
    assert_eq!(target, local_addr);

    assert!(client.post(BufferView::new(b"ping".to_vec())));

    let data = loop {
        match client_events.recv().await.unwrap() {
            UdpClientEvent::PacketArrived { data, .. } => break data,
            other => panic!("unexpected event: {other:?}"),
        }
    };
    assert_eq!(data.materialize(), b"ping");

    cancel.cancel();
}

/// `send` awaits the true end-to-end completion promise rather than just
/// the enqueue step `post` reports.
#[tokio::test(flavor = "multi_thread")]
async fn send_resolves_sent_on_success() {
    let cancel = CancellationToken::new();
    let server = Arc::new(UdpServer::new(UdpServerConfig::new("127.0.0.1".parse().unwrap(), 0)));
    let mut server_events = Arc::clone(&server).start(cancel.child_token());
    let local_addr = match server_events.recv().await.unwrap() {
        UdpServerEvent::Started { local_addr } => local_addr,
        other => panic!("expected Started, got {other:?}"),
    };

    let client = Arc::new(UdpClient::new(UdpClientConfig::new("127.0.0.1", local_addr.port())));
    let mut client_events = Arc::clone(&client).start(cancel.child_token());
    loop {
        match client_events.recv().await.unwrap() {
            UdpClientEvent::Ready { .. } => break,
            _ => continue,
        }
    }

    let send_cancel = CancellationToken::new();
    let outcome = client.send(BufferView::new(b"pong".to_vec()), &send_cancel).await.unwrap();
    assert_eq!(outcome, SendOutcome::Sent);

    cancel.cancel();
}

/// A `send` raced against an already-cancelled token observes cancellation
/// rather than blocking until the queue drains.
#[tokio::test(flavor = "multi_thread")]
async fn send_observes_external_cancellation_before_enqueue() {
    let cancel = CancellationToken::new();
    let server = Arc::new(UdpServer::new(
        UdpServerConfig::new("127.0.0.1".parse().unwrap(), 0).with_max_send_queue_size(1),
    ));
    let mut server_events = Arc::clone(&server).start(cancel.child_token());
    let local_addr = match server_events.recv().await.unwrap() {
        UdpServerEvent::Started { local_addr } => local_addr,
        other => panic!("expected Started, got {other:?}"),
    };

    let client = Arc::new(UdpClient::new(
        UdpClientConfig::new("127.0.0.1", local_addr.port()).with_max_send_queue_size(1),
    ));
    let mut client_events = Arc::clone(&client).start(cancel.child_token());
    loop {
        match client_events.recv().await.unwrap() {
            UdpClientEvent::Ready { .. } => break,
            _ => continue,
        }
    }

    let already_cancelled = CancellationToken::new();
    already_cancelled.cancel();
    let result = client.send(BufferView::new(b"never".to_vec()), &already_cancelled).await;
    assert!(result.is_err(), "an already-cancelled token must short-circuit send");

    cancel.cancel();
}

/// `add_to_send_queue` called before `start` has finished binding fails
/// gracefully (an already-resolved `Failed` receiver) instead of panicking,
/// matching `post`/`send`'s contract for the same pre-ready race.
#[tokio::test(flavor = "multi_thread")]
async fn add_to_send_queue_before_ready_resolves_failed_instead_of_panicking() {
    let cancel = CancellationToken::new();

    let client = Arc::new(UdpClient::new(UdpClientConfig::new("127.0.0.1", 9)));
    let not_yet_cancelled = CancellationToken::new();
    let rx = client
        .add_to_send_queue(BufferView::new(b"too-early".to_vec()), &not_yet_cancelled)
        .await
        .unwrap();
    assert_eq!(rx.await.unwrap(), SendOutcome::Failed);

    let server = Arc::new(UdpServer::new(UdpServerConfig::new("127.0.0.1".parse().unwrap(), 0)));
    let rx = server
        .add_to_send_queue("127.0.0.1:9".parse().unwrap(), BufferView::new(b"too-early".to_vec()), &not_yet_cancelled)
        .await
        .unwrap();
    assert_eq!(rx.await.unwrap(), SendOutcome::Failed);

    cancel.cancel();
}
