//! End-to-end protocol scenarios against the sans-I/O engine, with the
//! remote peer scripted frame by frame

mod common;

use common::{begin_session, begin_session_with_windows, events, opened_engine, Peer};

use siderite::engine::{Event, LinkOptions, SendOptions};
use siderite::types::definitions::{
    ErrorCondition, Handle, LinkError, ReceiverSettleMode, Role, SenderSettleMode,
};
use siderite::types::messaging::{DeliveryState, Message, Source, Target};
use siderite::types::performatives::{Attach, Close, Flow, Transfer};
use siderite::frames::amqp::FrameBody;

#[test]
fn anonymous_open_close() {
    let mut peer = Peer::new();
    let mut engine = siderite::Engine::builder().container_id("c1").build();
    engine.start();
    engine.open().unwrap();

    // the engine leads with the protocol header, pipelining its open
    let mut header = bytes::BytesMut::new();
    while let Some(chunk) = engine.pending_output() {
        header.extend_from_slice(&chunk);
    }
    assert_eq!(&header[..8], common::AMQP_HEADER);

    engine.ingest(common::AMQP_HEADER).unwrap();
    let frames = peer.drain(&mut engine);
    match &frames[0].body {
        FrameBody::Open(open) => assert_eq!(open.container_id, "c1"),
        other => panic!("expected open, got {}", other.name()),
    }

    peer.feed(
        &mut engine,
        0,
        FrameBody::Open(siderite::types::performatives::Open {
            container_id: "s1".into(),
            ..Default::default()
        }),
    );
    assert!(events(&mut engine)
        .iter()
        .any(|event| matches!(event, Event::Opened)));

    engine.close(None).unwrap();
    let frames = peer.drain(&mut engine);
    assert!(matches!(frames[0].body, FrameBody::Close(_)));

    peer.feed(&mut engine, 0, FrameBody::Close(Close::default()));
    assert!(events(&mut engine)
        .iter()
        .any(|event| matches!(event, Event::Closed { error: None })));
    assert!(engine.is_closed());
}

#[test]
fn attach_sender_send_one_settled_message() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    let session = begin_session(&mut peer, &mut engine);

    let link = engine
        .attach(
            session,
            LinkOptions::sender("L1")
                .target(Target::with_address("q"))
                .snd_settle_mode(SenderSettleMode::Settled),
        )
        .unwrap();

    let frames = peer.drain(&mut engine);
    match &frames[0].body {
        FrameBody::Attach(attach) => {
            assert_eq!(attach.name, "L1");
            assert_eq!(attach.handle, Handle(0));
            assert_eq!(attach.role, Role::Sender);
            assert_eq!(attach.snd_settle_mode, SenderSettleMode::Settled);
            assert_eq!(attach.initial_delivery_count, Some(0));
        }
        other => panic!("expected attach, got {}", other.name()),
    }

    peer.feed(
        &mut engine,
        0,
        FrameBody::Attach(Attach {
            name: "L1".into(),
            handle: Handle(0),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Settled,
            rcv_settle_mode: Default::default(),
            source: None,
            target: Some(Target::with_address("q")),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );
    assert!(events(&mut engine)
        .iter()
        .any(|event| matches!(event, Event::LinkAttached { .. })));

    // one unit of credit from the server
    peer.feed(
        &mut engine,
        0,
        FrameBody::Flow(Flow {
            next_incoming_id: Some(0),
            incoming_window: 2048,
            next_outgoing_id: 0,
            outgoing_window: 2048,
            handle: Some(Handle(0)),
            delivery_count: Some(0),
            link_credit: Some(1),
            ..Default::default()
        }),
    );

    let payload = Message::value("hi").encode().unwrap();
    engine
        .send(link, vec![0x01].into(), payload.clone(), SendOptions::default())
        .unwrap();

    let frames = peer.drain(&mut engine);
    match &frames[0].body {
        FrameBody::Transfer {
            performative,
            payload: sent,
        } => {
            assert_eq!(performative.delivery_id, Some(0));
            assert_eq!(performative.delivery_tag.as_deref(), Some(&[0x01][..]));
            assert_eq!(performative.settled, Some(true));
            assert!(!performative.more);
            assert_eq!(sent, &payload);
        }
        other => panic!("expected transfer, got {}", other.name()),
    }

    // a settled delivery is forgotten as soon as it leaves
    assert!(events(&mut engine).iter().any(|event| matches!(
        event,
        Event::TransferSent { settled: true, delivery_id: 0, .. }
    )));

    // link-credit dropped to zero: the next send queues until new credit
    engine
        .send(link, vec![0x02].into(), payload, SendOptions::default())
        .unwrap();
    assert!(peer.drain(&mut engine).is_empty());
}

#[test]
fn unsettled_receive_with_auto_accept_replenishes_credit() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    let session = begin_session(&mut peer, &mut engine);

    engine
        .attach(
            session,
            LinkOptions::receiver("R1")
                .source(Source::with_address("q"))
                .credit_window(1)
                .auto_accept(true),
        )
        .unwrap();
    let frames = peer.drain(&mut engine);
    assert!(matches!(frames[0].body, FrameBody::Attach(_)));

    peer.feed(
        &mut engine,
        0,
        FrameBody::Attach(Attach {
            name: "R1".into(),
            handle: Handle(0),
            role: Role::Sender,
            snd_settle_mode: Default::default(),
            rcv_settle_mode: Default::default(),
            source: Some(Source::with_address("q")),
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );

    // the initial credit grant goes out as a link flow
    let frames = peer.drain(&mut engine);
    match &frames[0].body {
        FrameBody::Flow(flow) => {
            assert_eq!(flow.handle, Some(Handle(0)));
            assert_eq!(flow.link_credit, Some(1));
        }
        other => panic!("expected flow, got {}", other.name()),
    }

    let payload = Message::value("pay").encode().unwrap();
    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(7),
                delivery_tag: Some(vec![0x0a].into()),
                settled: Some(false),
                more: false,
                ..Default::default()
            },
            payload: payload.clone(),
        },
    );

    let received = events(&mut engine);
    let delivered = received.iter().find_map(|event| match event {
        Event::Delivery { delivery, .. } => Some(delivery),
        _ => None,
    });
    assert_eq!(delivered.expect("one delivery").payload, payload);

    let frames = peer.drain(&mut engine);
    let disposition = frames
        .iter()
        .find_map(|frame| match &frame.body {
            FrameBody::Disposition(d) => Some(d),
            _ => None,
        })
        .expect("auto-accept emits a disposition");
    assert_eq!(disposition.role, Role::Receiver);
    assert_eq!(disposition.first, 7);
    assert_eq!(disposition.last, None);
    assert!(disposition.settled);
    assert!(matches!(
        disposition.state,
        Some(DeliveryState::Accepted(_))
    ));

    let replenished = frames
        .iter()
        .find_map(|frame| match &frame.body {
            FrameBody::Flow(f) => Some(f),
            _ => None,
        })
        .expect("credit is replenished");
    assert_eq!(replenished.link_credit, Some(1));
}

#[test]
fn multi_frame_transfer_reassembles() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    let session = begin_session(&mut peer, &mut engine);

    engine
        .attach(
            session,
            LinkOptions::receiver("R1")
                .source(Source::with_address("q"))
                .credit_window(10),
        )
        .unwrap();
    peer.drain(&mut engine);
    peer.feed(&mut engine, 0, attach_echo_sender("R1"));
    peer.drain(&mut engine);

    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(3),
                delivery_tag: Some(vec![0x03].into()),
                more: true,
                ..Default::default()
            },
            payload: bytes::Bytes::from_static(b"AB"),
        },
    );
    assert!(
        !events(&mut engine)
            .iter()
            .any(|event| matches!(event, Event::Delivery { .. })),
        "a partial delivery must not surface"
    );

    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(3),
                more: false,
                ..Default::default()
            },
            payload: bytes::Bytes::from_static(b"CD"),
        },
    );

    let received = events(&mut engine);
    let deliveries: Vec<_> = received
        .iter()
        .filter_map(|event| match event {
            Event::Delivery { delivery, .. } => Some(delivery),
            _ => None,
        })
        .collect();
    assert_eq!(deliveries.len(), 1, "exactly one delivery is observed");
    assert_eq!(&deliveries[0].payload[..], b"ABCD");
    assert_eq!(deliveries[0].delivery_id, 3);
}

#[test]
fn aborted_delivery_discards_payload() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    let session = begin_session(&mut peer, &mut engine);

    engine
        .attach(
            session,
            LinkOptions::receiver("R1")
                .source(Source::with_address("q"))
                .credit_window(10),
        )
        .unwrap();
    peer.drain(&mut engine);
    peer.feed(&mut engine, 0, attach_echo_sender("R1"));
    peer.drain(&mut engine);

    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(4),
                delivery_tag: Some(vec![0x04].into()),
                more: true,
                ..Default::default()
            },
            payload: bytes::Bytes::from_static(b"XX"),
        },
    );
    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(4),
                aborted: true,
                ..Default::default()
            },
            payload: bytes::Bytes::new(),
        },
    );

    let received = events(&mut engine);
    assert!(
        received
            .iter()
            .any(|event| matches!(event, Event::DeliveryAborted { delivery_id: 4, .. })),
        "the abort must surface as a distinct error"
    );
    assert!(
        !received
            .iter()
            .any(|event| matches!(event, Event::Delivery { .. })),
        "no payload is delivered"
    );
}

#[test]
fn session_window_stall_blocks_the_second_transfer() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    // the server will only window one frame at a time
    let session = begin_session_with_windows(&mut peer, &mut engine, 1);

    let link = engine
        .attach(
            session,
            LinkOptions::sender("L1")
                .target(Target::with_address("q"))
                .snd_settle_mode(SenderSettleMode::Settled),
        )
        .unwrap();
    peer.drain(&mut engine);
    peer.feed(
        &mut engine,
        0,
        FrameBody::Attach(Attach {
            name: "L1".into(),
            handle: Handle(0),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Settled,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: Some(Target::with_address("q")),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );
    peer.feed(
        &mut engine,
        0,
        FrameBody::Flow(Flow {
            next_incoming_id: Some(0),
            incoming_window: 1,
            next_outgoing_id: 0,
            outgoing_window: 2048,
            handle: Some(Handle(0)),
            delivery_count: Some(0),
            link_credit: Some(2),
            ..Default::default()
        }),
    );
    peer.drain(&mut engine);

    let payload = Message::value("m").encode().unwrap();
    engine
        .send(link, vec![1].into(), payload.clone(), SendOptions::default())
        .unwrap();
    engine
        .send(link, vec![2].into(), payload, SendOptions::default())
        .unwrap();

    let frames = peer.drain(&mut engine);
    let transfers = frames
        .iter()
        .filter(|frame| matches!(frame.body, FrameBody::Transfer { .. }))
        .count();
    assert_eq!(transfers, 1, "the second transfer must wait for the window");

    // the server processes the first transfer and reopens the window
    peer.feed(
        &mut engine,
        0,
        FrameBody::Flow(Flow {
            next_incoming_id: Some(1),
            incoming_window: 1,
            next_outgoing_id: 0,
            outgoing_window: 2048,
            handle: Some(Handle(0)),
            delivery_count: Some(1),
            link_credit: Some(1),
            ..Default::default()
        }),
    );

    let frames = peer.drain(&mut engine);
    let second: Vec<_> = frames
        .iter()
        .filter_map(|frame| match &frame.body {
            FrameBody::Transfer { performative, .. } => Some(performative),
            _ => None,
        })
        .collect();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].delivery_id, Some(1));
}

#[test]
fn credit_violation_detaches_the_link_not_the_session() {
    let mut peer = Peer::new();
    let mut engine = opened_engine(&mut peer);
    let session = begin_session(&mut peer, &mut engine);

    // a receiver that never granted any credit
    engine
        .attach(
            session,
            LinkOptions::receiver("R1").source(Source::with_address("q")),
        )
        .unwrap();
    peer.drain(&mut engine);
    peer.feed(&mut engine, 0, attach_echo_sender("R1"));
    peer.drain(&mut engine);
    events(&mut engine);

    peer.feed(
        &mut engine,
        0,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(0),
                delivery_tag: Some(vec![1].into()),
                ..Default::default()
            },
            payload: bytes::Bytes::from_static(b"x"),
        },
    );

    let frames = peer.drain(&mut engine);
    let detach = frames
        .iter()
        .find_map(|frame| match &frame.body {
            FrameBody::Detach(d) => Some(d),
            _ => None,
        })
        .expect("the offending link detaches with the error");
    assert!(detach.closed);
    assert_eq!(
        detach.error.as_ref().map(|e| e.condition.clone()),
        Some(ErrorCondition::LinkError(LinkError::TransferLimitExceeded))
    );
    assert!(
        !frames
            .iter()
            .any(|frame| matches!(frame.body, FrameBody::End(_))),
        "the session must stay mapped"
    );

    let received = events(&mut engine);
    assert!(received.iter().any(|event| matches!(
        event,
        Event::LinkDetached {
            closed: true,
            error: Some(_),
            ..
        }
    )));
    assert!(!received
        .iter()
        .any(|event| matches!(event, Event::SessionEnded { .. })));

    // the session still accepts new links
    engine
        .attach(
            session,
            LinkOptions::receiver("R2")
                .source(Source::with_address("q"))
                .credit_window(1),
        )
        .unwrap();
    let frames = peer.drain(&mut engine);
    assert!(matches!(frames[0].body, FrameBody::Attach(_)));
}

fn attach_echo_sender(name: &str) -> FrameBody {
    FrameBody::Attach(Attach {
        name: name.into(),
        handle: Handle(0),
        role: Role::Sender,
        snd_settle_mode: Default::default(),
        rcv_settle_mode: Default::default(),
        source: Some(Source::with_address("q")),
        target: None,
        unsettled: None,
        incomplete_unsettled: false,
        initial_delivery_count: Some(0),
        max_message_size: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    })
}
