//! # Packet Round-Trip Tests
//!
//! Every registered packet kind must survive encode → decode field for field
//! through the dispatcher of the role that owns it.

use bytes::{Bytes, BytesMut};
use codec::*;
use proptest::prelude::*;
use std::collections::HashSet;
use types::{sync_file_kind, CoreMessage, PacketType, ProtocolFamily};

fn sample_message() -> CoreMessage {
    CoreMessage::new(1234, "orders.new", Bytes::from_static(b"hello"))
        .with_durable(true)
        .with_priority(7)
        .with_timestamp(1_700_000_000_000)
        .with_property("region", "eu-west")
        .with_property("kind", "limit")
}

/// One populated instance per registered packet type
fn sample_packets() -> Vec<Packet> {
    vec![
        Ping { connection_ttl: 30_000 }.into(),
        Disconnect { node_id: Some("node-a".into()) }.into(),
        Exception { code: 101, message: Some("queue exists".into()) }.into(),
        NullResponse {}.into(),
        PacketsConfirmed { command_id: 99 }.into(),
        CreateSession {
            name: "session-1".into(),
            session_channel_id: 10,
            version: types::PROTOCOL_VERSION,
            username: Some("guest".into()),
            password: None,
            min_large_message_size: 100 * 1024,
            xa: false,
            auto_commit_sends: true,
            auto_commit_acks: true,
            pre_acknowledge: false,
            window_size: 1024 * 1024,
            default_address: None,
        }
        .into(),
        CreateSessionResponse { server_version: 1 }.into(),
        CreateQueue {
            address: "orders.*".into(),
            queue_name: "Q1".into(),
            filter: Some("region = 'eu'".into()),
            durable: true,
            temporary: false,
        }
        .into(),
        DeleteQueue { queue_name: "Q1".into() }.into(),
        SessionCommit {}.into(),
        SessionRollback { consider_last_message_as_delivered: true }.into(),
        SessionStart {}.into(),
        SessionStop {}.into(),
        SessionClose {}.into(),
        SessionCreateConsumer {
            id: 3,
            queue_name: "Q1".into(),
            filter: None,
            browse_only: true,
            requires_response: true,
        }
        .into(),
        SessionAcknowledge { consumer_id: 3, message_id: 1234, requires_response: false }.into(),
        SessionBindingQuery { address: "orders.new".into() }.into(),
        SessionBindingQueryResponse {
            exists: true,
            queue_names: vec!["Q1".into(), "Q2".into()],
        }
        .into(),
        SessionFlowCredit { consumer_id: 3, credits: 64 * 1024 }.into(),
        SessionSend { message: sample_message(), requires_response: true }.into(),
        SessionSendLarge { message: sample_message() }.into(),
        SessionSendContinuation {
            body: Bytes::from_static(b"chunk"),
            continues: true,
            requires_response: false,
        }
        .into(),
        SessionConsumerClose { consumer_id: 3 }.into(),
        SessionReceiveMessage { consumer_id: 3, delivery_count: 1, message: sample_message() }.into(),
        SessionReceiveLargeMessage {
            consumer_id: 3,
            delivery_count: 2,
            large_message_size: 10 * 1024 * 1024,
            message: sample_message(),
        }
        .into(),
        SessionReceiveContinuation {
            consumer_id: 3,
            body: Bytes::from_static(b"tail"),
            continues: false,
        }
        .into(),
        ReplicationResponse {}.into(),
        ReplicationAppend {
            journal_id: 1,
            is_update: false,
            record_id: 77,
            record_type: 31,
            record: Bytes::from_static(&[1, 2, 3, 4]),
        }
        .into(),
        ReplicationDelete { journal_id: 1, record_id: 77 }.into(),
        ReplicationCommitRollback { journal_id: 1, commit: true, tx_id: 900 }.into(),
        ReplicationLargeMessageBegin { message_id: 5, header: Bytes::from_static(b"hdr") }.into(),
        ReplicationLargeMessageEnd { message_id: 5, pending_record_id: 6, is_delete: false }.into(),
        ReplicationLargeMessageWrite { message_id: 5, body: Bytes::from_static(b"AB") }.into(),
        ReplicationSyncFile {
            file_id: 5,
            file_kind: sync_file_kind::LARGE_MESSAGE,
            data: Bytes::from_static(b"snapshot"),
        }
        .into(),
        ReplicationStartFinishSync {
            finished: true,
            node_id: "primary-1".into(),
            file_ids: vec![5, 8, 13],
        }
        .into(),
    ]
}

/// Dispatcher that owns a packet type on the receiving side
fn dispatcher_for(packet_type: PacketType) -> &'static PacketDispatcher {
    match packet_type {
        PacketType::SessionReceiveMessage
        | PacketType::SessionReceiveLargeMessage
        | PacketType::SessionReceiveContinuation => PacketDispatcher::client(),
        _ => PacketDispatcher::server(),
    }
}

#[test]
fn test_every_registered_kind_round_trips() {
    let packets = sample_packets();

    let covered: HashSet<PacketType> = packets.iter().map(Packet::packet_type).collect();
    for packet_type in PacketType::ALL {
        assert!(covered.contains(&packet_type), "no sample for {}", packet_type);
    }

    for packet in packets {
        let bytes = packet.to_bytes();
        let decoded = dispatcher_for(packet.packet_type())
            .decode(&bytes)
            .unwrap_or_else(|e| panic!("{} failed to decode: {}", packet.packet_type(), e));
        assert_eq!(decoded, packet);
    }
}

#[test]
fn test_round_trip_preserves_hash_identity() {
    let mut seen = HashSet::new();
    for packet in sample_packets() {
        let decoded = dispatcher_for(packet.packet_type())
            .decode(&packet.to_bytes())
            .unwrap();
        seen.insert(packet);
        assert!(seen.contains(&decoded));
    }
}

#[test]
fn test_default_packets_round_trip() {
    for packet_type in PacketType::ALL {
        let packet = Packet::default_for(packet_type);
        let decoded = dispatcher_for(packet_type).decode(&packet.to_bytes()).unwrap();
        assert_eq!(decoded.packet_type(), packet_type);
    }
}

#[test]
fn test_truncated_packets_are_malformed() {
    for packet in sample_packets() {
        let bytes = packet.to_bytes();
        if bytes.len() < 2 {
            continue;
        }
        let truncated = &bytes[..bytes.len() - 1];
        let err = dispatcher_for(packet.packet_type())
            .decode(truncated)
            .unwrap_err();
        assert!(
            matches!(err, CodecError::Malformed { .. }),
            "{}: expected malformed, got {:?}",
            packet.packet_type(),
            err
        );
    }
}

#[test]
fn test_trailing_garbage_is_malformed() {
    let mut bytes = Packet::from(DeleteQueue { queue_name: "Q1".into() }).to_bytes();
    bytes.extend_from_slice(&[0xAB]);
    let err = PacketDispatcher::server().decode(&bytes).unwrap_err();
    assert!(matches!(err, CodecError::Malformed { remaining: 1, .. }));
}

#[test]
fn test_wrong_role_is_unknown_packet_type() {
    let send = Packet::from(SessionSend { message: sample_message(), requires_response: false });
    let err = PacketDispatcher::client().decode(&send.to_bytes()).unwrap_err();
    assert!(matches!(
        err,
        CodecError::UnknownPacketType { tag: 71, role: DispatcherRole::Client, .. }
    ));

    let write = Packet::from(ReplicationLargeMessageWrite::default());
    let err = PacketDispatcher::client().decode(&write.to_bytes()).unwrap_err();
    assert!(matches!(err, CodecError::UnknownPacketType { family: "replication", .. }));
}

#[test]
fn test_empty_buffer_is_malformed() {
    let err = PacketDispatcher::server().decode(&[]).unwrap_err();
    assert!(matches!(err, CodecError::Malformed { need: 1, remaining: 0, .. }));
}

#[test]
fn test_encode_packet_appends() {
    let mut out = BytesMut::new();
    encode_packet(&Ping { connection_ttl: 1 }.into(), &mut out);
    encode_packet(&SessionClose {}.into(), &mut out);
    assert_eq!(out.len(), 9 + 1);
    assert_eq!(
        decode_packet(PacketDispatcher::base(), &out[..9]).unwrap(),
        Packet::Ping(Ping { connection_ttl: 1 })
    );
}

#[test]
fn test_family_partition_matches_dispatch() {
    for packet_type in PacketType::types_in_family(ProtocolFamily::Replication) {
        assert!(PacketDispatcher::server().recognizes(packet_type.tag()));
        assert!(!PacketDispatcher::base().recognizes(packet_type.tag()));
    }
}

fn arb_message() -> impl Strategy<Value = CoreMessage> {
    (
        any::<i64>(),
        proptest::option::of("[a-z]{1,8}(\\.[a-z*#]{1,8}){0,4}"),
        any::<bool>(),
        any::<u8>(),
        any::<i64>(),
        proptest::collection::btree_map("[a-z]{1,6}", ".{0,12}", 0..4),
        proptest::collection::vec(any::<u8>(), 0..256),
    )
        .prop_map(
            |(message_id, address, durable, priority, timestamp, properties, body)| CoreMessage {
                message_id,
                address,
                durable,
                priority,
                timestamp,
                properties,
                body: Bytes::from(body),
            },
        )
}

proptest! {
    #[test]
    fn prop_session_send_round_trips(message in arb_message(), requires_response in any::<bool>()) {
        let packet = Packet::from(SessionSend { message, requires_response });
        let decoded = PacketDispatcher::server().decode(&packet.to_bytes()).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn prop_sync_start_round_trips(
        finished in any::<bool>(),
        node_id in ".{0,32}",
        file_ids in proptest::collection::vec(any::<i64>(), 0..32),
    ) {
        let packet = Packet::from(ReplicationStartFinishSync { finished, node_id, file_ids });
        let decoded = PacketDispatcher::server().decode(&packet.to_bytes()).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn prop_random_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = PacketDispatcher::server().decode(&data);
        let _ = PacketDispatcher::client().decode(&data);
    }
}
