//! The async façade against a minimal scripted broker over an in-memory
//! duplex stream

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Decoder, Encoder};

use siderite::frames::amqp::{Frame, FrameBody, FrameCodec};
use siderite::types::definitions::Role;
use siderite::types::messaging::{DeliveryState, Message, Target};
use siderite::types::performatives::{Attach, Begin, Close, Disposition, End, Flow, Open};
use siderite::{Connection, Sender, Session};

/// Just enough broker to answer one client: header echo, open/begin/attach
/// echoes, a pile of credit, accept-everything dispositions, end/close
/// echoes
async fn run_broker(mut io: DuplexStream) {
    let mut codec = FrameCodec::new(1024 * 1024);
    let mut inbox = BytesMut::new();
    let mut read_buf = [0u8; 8 * 1024];
    let mut header_done = false;

    loop {
        let n = match io.read(&mut read_buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        inbox.extend_from_slice(&read_buf[..n]);

        if !header_done {
            if inbox.len() < 8 {
                continue;
            }
            let _ = inbox.split_to(8);
            header_done = true;
            if io.write_all(b"AMQP\x00\x01\x00\x00").await.is_err() {
                return;
            }
        }

        let mut replies = BytesMut::new();
        loop {
            let frame = match codec.decode(&mut inbox) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_) => return,
            };
            let channel = frame.channel;
            match frame.body {
                FrameBody::Open(_) => {
                    let open = Open {
                        container_id: "scripted-broker".into(),
                        ..Default::default()
                    };
                    codec
                        .encode(Frame::new(0u16, FrameBody::Open(open)), &mut replies)
                        .unwrap();
                }
                FrameBody::Begin(begin) => {
                    let echo = Begin {
                        remote_channel: Some(channel),
                        next_outgoing_id: 0,
                        incoming_window: 2048,
                        outgoing_window: 2048,
                        ..begin
                    };
                    codec
                        .encode(Frame::new(channel, FrameBody::Begin(echo)), &mut replies)
                        .unwrap();
                }
                FrameBody::Attach(attach) => {
                    let echo = Attach {
                        role: attach.role.remote(),
                        initial_delivery_count: attach
                            .role
                            .is_receiver()
                            .then_some(0),
                        ..attach
                    };
                    let handle = echo.handle;
                    codec
                        .encode(Frame::new(channel, FrameBody::Attach(echo)), &mut replies)
                        .unwrap();
                    // senders get plenty of credit up front
                    let flow = Flow {
                        next_incoming_id: Some(0),
                        incoming_window: 2048,
                        next_outgoing_id: 0,
                        outgoing_window: 2048,
                        handle: Some(handle),
                        delivery_count: Some(0),
                        link_credit: Some(100),
                        ..Default::default()
                    };
                    codec
                        .encode(Frame::new(channel, FrameBody::Flow(flow)), &mut replies)
                        .unwrap();
                }
                FrameBody::Transfer { performative, .. } => {
                    if performative.settled != Some(true) {
                        let disposition = Disposition {
                            role: Role::Receiver,
                            first: performative.delivery_id.unwrap_or(0),
                            last: None,
                            settled: true,
                            state: Some(DeliveryState::accepted()),
                            batchable: false,
                        };
                        codec
                            .encode(
                                Frame::new(channel, FrameBody::Disposition(disposition)),
                                &mut replies,
                            )
                            .unwrap();
                    }
                }
                FrameBody::Detach(detach) => {
                    codec
                        .encode(Frame::new(channel, FrameBody::Detach(detach)), &mut replies)
                        .unwrap();
                }
                FrameBody::End(_) => {
                    codec
                        .encode(
                            Frame::new(channel, FrameBody::End(End::default())),
                            &mut replies,
                        )
                        .unwrap();
                }
                FrameBody::Close(_) => {
                    codec
                        .encode(
                            Frame::new(0u16, FrameBody::Close(Close::default())),
                            &mut replies,
                        )
                        .unwrap();
                    let _ = io.write_all(&replies).await;
                    return;
                }
                FrameBody::Flow(_) | FrameBody::Disposition(_) | FrameBody::Empty => {}
            }
        }
        if !replies.is_empty() && io.write_all(&replies).await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn open_send_close_over_a_duplex() {
    let (client_io, broker_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(run_broker(broker_io));

    let mut connection = Connection::builder()
        .container_id("loopback-client")
        .open_with_stream(client_io)
        .await
        .expect("open");

    let mut session = Session::begin(&mut connection).await.expect("begin");

    let sender = Sender::attach(&mut session, "sender-0", "loopback-queue")
        .await
        .expect("attach");

    // at-least-once: the completion carries the broker's outcome
    let outcome = sender
        .send(Message::value("hello loopback"))
        .await
        .expect("send");
    assert!(matches!(outcome, Some(DeliveryState::Accepted(_))));

    sender.close().await.expect("link close");
    session.end().await.expect("session end");
    connection.close().await.expect("connection close");
}

#[tokio::test]
async fn attach_uses_dense_handles() {
    let (client_io, broker_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(run_broker(broker_io));

    let mut connection = Connection::builder()
        .container_id("loopback-client")
        .open_with_stream(client_io)
        .await
        .expect("open");
    let mut session = Session::begin(&mut connection).await.expect("begin");

    let first = Sender::attach_with_options(
        &mut session,
        siderite::LinkOptions::sender("a").target(Target::with_address("q")),
    )
    .await
    .expect("attach a");
    let _second = Sender::attach_with_options(
        &mut session,
        siderite::LinkOptions::sender("b").target(Target::with_address("q")),
    )
    .await
    .expect("attach b");

    // close the first link and confirm the connection still works
    first.close().await.expect("close a");
    connection.close().await.expect("connection close");
}
