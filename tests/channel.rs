use std::time::{Duration, Instant};

use freight::{
    close, make, recv, send, Channel, ChannelError, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT,
};

#[test]
fn defaults_are_the_documented_constants() {
    assert_eq!(DEFAULT_CHECK_INTERVAL, Duration::from_millis(100));
    assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(60));
}

#[test]
fn channels_are_auto_named_in_sequence() {
    let a = make::<u8>(1);
    let b = make::<u8>(1);
    assert!(a.name().starts_with("chan-"));
    assert_ne!(a.name(), b.name());
}

#[test]
fn with_name_and_display() {
    let ch = Channel::<u8>::with_name(4, "conveyor");
    assert_eq!(ch.name(), "conveyor");
    let rendered = format!("{}", ch);
    assert!(rendered.contains("name: conveyor"));
    assert!(rendered.contains("capacity: 4"));
    assert!(rendered.contains("closed: false"));
    close(&ch);
    assert!(format!("{:?}", ch).contains("closed: true"));
}

#[test]
fn snapshots_follow_traffic() {
    let ch = make(2);
    assert_eq!(ch.len(), 0);
    assert!(ch.is_empty());
    send(&ch, 1).unwrap();
    assert_eq!(ch.len(), 1);
    assert!(!ch.is_closed());
    close(&ch);
    assert!(ch.is_closed());
    assert_eq!(ch.len(), 1, "closing does not discard buffered items");
    assert_eq!(recv(&ch), Ok(1));
}

#[test]
fn available_room_beats_expired_send_deadline() {
    let ch = make(1);
    ch.set_send_deadline(Some(Instant::now() - Duration::from_millis(1)));
    assert_eq!(send(&ch, 1), Ok(()));
    // Full now, and the deadline is long gone.
    assert_eq!(send(&ch, 2), Err(ChannelError::Timeout));
    ch.set_send_deadline(None);
    // The default horizon applies again; room appears once we receive.
    assert_eq!(recv(&ch), Ok(1));
    assert_eq!(send(&ch, 3), Ok(()));
}
