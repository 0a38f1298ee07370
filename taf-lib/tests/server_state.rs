use std::cell::Cell;
use std::path::Path;

use taf_lib::proto::{dispatch, Message};
use taf_lib::server::EventServer;
use taf_lib::TafError;

fn setup(file: &str, line: &str) -> Message {
    Message::WatchSetup {
        file_pattern: file.as_bytes().to_vec(),
        line_pattern: line.as_bytes().to_vec(),
    }
}

fn drive(server: &mut EventServer, msg: Message) -> Vec<Message> {
    let mut out = Vec::new();
    dispatch(server, msg, &mut out).unwrap();
    out
}

fn lines(ls: &[&str]) -> Vec<Vec<u8>> {
    ls.iter().map(|l| l.as_bytes().to_vec()).collect()
}

fn notify(server: &mut EventServer, path: &str, ls: &[&str]) -> Vec<Message> {
    let mut out = Vec::new();
    let produced = lines(ls);
    server.notify(Path::new(path), move || Ok(produced), &mut out);
    out
}

#[test]
fn registration_assigns_dense_indices_and_acks_each_setup() {
    let mut server = EventServer::new();
    for _ in 0..3 {
        let out = drive(&mut server, setup("a\\.log", "ERROR"));
        assert_eq!(out, vec![Message::Ack]);
    }
    assert_eq!(server.watch_count(), 3);
}

#[test]
fn setup_requests_watches_for_matching_known_files() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    server.add_file("b.log");
    server.add_file("notes.txt");

    drive(&mut server, setup("\\.log$", "ERROR"));
    let mut requested = server.take_watch_requests();
    requested.sort();
    assert_eq!(requested, vec![Path::new("a.log"), Path::new("b.log")]);

    // drained; a second call has nothing new
    assert!(server.take_watch_requests().is_empty());
}

#[test]
fn an_all_zero_mask_blocks_every_notification() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x00] });

    let mut out = Vec::new();
    server.notify(
        Path::new("a.log"),
        || -> std::io::Result<Vec<Vec<u8>>> { panic!("lines must not be realized") },
        &mut out,
    );
    assert!(out.is_empty());
}

#[test]
fn fires_once_per_watch_until_reset() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });

    let out = notify(&mut server, "a.log", &["INFO ok", "ERROR bad"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);

    // already fired: a second matching change stays silent
    assert!(notify(&mut server, "a.log", &["ERROR worse"]).is_empty());

    drive(&mut server, Message::Reset);
    let out = notify(&mut server, "a.log", &["ERROR again"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);
}

#[test]
fn watch_set_toggles_armed_but_never_fired() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });
    assert_eq!(notify(&mut server, "a.log", &["ERROR"]).len(), 1);

    // disabling and re-enabling must not clear the fired flag
    drive(&mut server, Message::WatchSet { mask: vec![0x00] });
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });
    assert!(notify(&mut server, "a.log", &["ERROR"]).is_empty());

    drive(&mut server, Message::Reset);
    assert_eq!(notify(&mut server, "a.log", &["ERROR"]).len(), 1);
}

#[test]
fn one_change_notifies_multiple_watches_in_index_order() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, setup("a\\.log", "WARN"));
    drive(&mut server, Message::WatchSet { mask: vec![0x03] });

    let out = notify(&mut server, "a.log", &["WARN first", "ERROR second"]);
    assert_eq!(
        out,
        vec![Message::Notify { watch: 0 }, Message::Notify { watch: 1 }]
    );
}

#[test]
fn lines_are_realized_once_per_change() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, setup("a\\.log", "WARN"));
    drive(&mut server, Message::WatchSet { mask: vec![0x03] });

    let calls = Cell::new(0);
    let mut out = Vec::new();
    server.notify(
        Path::new("a.log"),
        || {
            calls.set(calls.get() + 1);
            Ok(lines(&["WARN and ERROR in one line"]))
        },
        &mut out,
    );
    assert_eq!(calls.get(), 1);
    assert_eq!(out.len(), 2);
}

#[test]
fn unknown_paths_get_a_lazily_built_watch_list() {
    let mut server = EventServer::new();
    // no add_file for this path at all
    drive(&mut server, setup("stray\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });

    let out = notify(&mut server, "stray.log", &["ERROR"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);
}

#[test]
fn files_added_after_registration_are_matched() {
    let mut server = EventServer::new();
    drive(&mut server, setup("late\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });
    server.add_file("late.log");

    let out = notify(&mut server, "late.log", &["ERROR"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);
}

#[test]
fn mask_bits_past_the_watch_count_are_ignored() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0xff, 0xff, 0xff] });

    let out = notify(&mut server, "a.log", &["ERROR"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);
}

#[test]
fn line_patterns_use_substring_search() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });

    let out = notify(&mut server, "a.log", &["2026-01-01 ERROR: midline match"]);
    assert_eq!(out.len(), 1);
}

#[test]
fn a_failing_line_producer_is_isolated() {
    let mut server = EventServer::new();
    server.add_file("a.log");
    drive(&mut server, setup("a\\.log", "ERROR"));
    drive(&mut server, Message::WatchSet { mask: vec![0x01] });

    let mut out = Vec::new();
    server.notify(
        Path::new("a.log"),
        || Err(std::io::Error::other("gone")),
        &mut out,
    );
    assert!(out.is_empty());

    // the watch is still armed and unfired
    let out = notify(&mut server, "a.log", &["ERROR"]);
    assert_eq!(out, vec![Message::Notify { watch: 0 }]);
}

#[test]
fn ping_is_answered_with_pong() {
    let mut server = EventServer::new();
    let out = drive(&mut server, Message::Ping(12345));
    assert_eq!(out, vec![Message::Pong(12345)]);
}

#[test]
fn client_bound_messages_are_protocol_errors() {
    let mut server = EventServer::new();
    let mut out = Vec::new();
    for msg in [Message::Ack, Message::Notify { watch: 0 }] {
        let err = dispatch(&mut server, msg, &mut out).unwrap_err();
        assert!(matches!(err, TafError::Protocol(_)), "got {err:?}");
    }
}

#[test]
fn an_uncompilable_pattern_is_a_protocol_error() {
    let mut server = EventServer::new();
    let mut out = Vec::new();
    let err = dispatch(&mut server, setup("[unclosed", "x"), &mut out).unwrap_err();
    assert!(matches!(err, TafError::Protocol(_)), "got {err:?}");
}
