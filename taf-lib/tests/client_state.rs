use taf_lib::client::{encode_mask, ClientEvent, EventClient, WatchSet};
use taf_lib::proto::{dispatch, Message};
use taf_lib::TafError;

#[test]
fn add_watch_allocates_dense_indices_and_queues_setups() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    for i in 0..3u32 {
        let handle = client.add_watch(b"a\\.log".to_vec(), b"ERROR".to_vec(), &mut out);
        assert_eq!(handle.index, i);
    }
    assert_eq!(client.watch_count(), 3);
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|m| m.code() == 0x03));
}

#[test]
fn watch_set_sends_the_mask_verbatim() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    client.watch_set(vec![0x05, 0x80], &mut out);
    assert_eq!(out, vec![Message::WatchSet { mask: vec![0x05, 0x80] }]);
}

#[test]
fn reset_sends_reset() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    client.reset(&mut out);
    assert_eq!(out, vec![Message::Reset]);
}

#[test]
fn notify_surfaces_the_watch_index() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    dispatch(&mut client, Message::Notify { watch: 2 }, &mut out).unwrap();
    assert_eq!(client.take_events(), vec![ClientEvent::Notified(2)]);
    assert!(out.is_empty());
    // drained
    assert!(client.take_events().is_empty());
}

#[test]
fn acks_are_tolerated_up_to_the_setup_count() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    client.add_watch(b"a".to_vec(), b"b".to_vec(), &mut out);
    dispatch(&mut client, Message::Ack, &mut out).unwrap();
    let err = dispatch(&mut client, Message::Ack, &mut out).unwrap_err();
    assert!(matches!(err, TafError::Protocol(_)), "got {err:?}");
}

#[test]
fn ping_is_answered_with_pong() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    dispatch(&mut client, Message::Ping(7), &mut out).unwrap();
    assert_eq!(out, vec![Message::Pong(7)]);
}

#[test]
fn server_bound_messages_are_protocol_errors() {
    let mut client = EventClient::new();
    let mut out = Vec::new();
    for msg in [
        Message::Reset,
        Message::WatchSet { mask: vec![] },
        Message::WatchSetup { file_pattern: vec![], line_pattern: vec![] },
    ] {
        let err = dispatch(&mut client, msg, &mut out).unwrap_err();
        assert!(matches!(err, TafError::Protocol(_)), "got {err:?}");
    }
}

#[test]
fn masks_are_little_endian_and_minimal() {
    assert_eq!(encode_mask(&[]), Vec::<u8>::new());
    assert_eq!(encode_mask(&[0]), vec![0x01]);
    assert_eq!(encode_mask(&[0, 1]), vec![0x03]);
    assert_eq!(encode_mask(&[7]), vec![0x80]);
    assert_eq!(encode_mask(&[8]), vec![0x00, 0x01]);
    assert_eq!(encode_mask(&[9, 0]), vec![0x01, 0x02]);
}

#[test]
fn watch_sets_carry_description_and_mask() {
    let set = WatchSet::new("errors only", &[0, 2]);
    assert_eq!(set.description, "errors only");
    assert_eq!(set.mask, vec![0x05]);
}
