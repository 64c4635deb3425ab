//! Integration tests for the keypad driver lifecycle.
//!
//! # Purpose
//!
//! These tests drive `KeypadDriver` through its *public* API against the
//! in-memory `MockTransport` and a `FakeEnumerator`-backed presence monitor.
//! They verify:
//!
//! - Teardown runs its steps exactly once, however many threads trigger it.
//! - Outgoing frames never interleave, even when callers race.
//! - Unplugging the keypad closes its driver and only its driver.
//! - Key notifications fed in arbitrary chunks end up in the key state map.
//! - Command replies reach frame subscribers and decode.
//!
//! # Timing
//!
//! The presence monitor polls every 10 ms here.  Tests that depend on it wait
//! for the first tick (via `FakeEnumerator::call_count`) before changing the
//! device list, otherwise the change would be folded into the first snapshot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use numpad_core::domain::{DeviceInfo, SerialSettings};
use numpad_core::keys::{Key, KeyEvent, KeyState};
use numpad_core::protocol::command::{Command, DeviceStatus, ToggleMode, UfnReply, CMD_GET_UFN};
use numpad_core::protocol::{encode_frame, Frame};
use numpad_driver::infrastructure::presence::mock::FakeEnumerator;
use numpad_driver::infrastructure::transport::mock::{MockTransport, WriteMark};
use numpad_driver::{DriverState, EmitError, KeypadDriver, PresenceMonitor};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn keypad(port: &str) -> DeviceInfo {
    DeviceInfo::new(port, "8857", "0323")
}

fn monitor_with(ports: &[&str]) -> (Arc<FakeEnumerator>, PresenceMonitor) {
    let fake = Arc::new(FakeEnumerator::with_devices(
        ports.iter().map(|p| keypad(p)).collect(),
    ));
    let monitor = PresenceMonitor::with_interval(fake.clone(), Duration::from_millis(10));
    (fake, monitor)
}

fn open(port: &str, transport: &Arc<MockTransport>, monitor: &PresenceMonitor) -> Arc<KeypadDriver> {
    KeypadDriver::open(SerialSettings::for_port(port), transport.clone(), monitor)
        .expect("driver should open")
}

fn key_frame(key: Key, state: KeyState) -> Vec<u8> {
    KeyEvent::new(key, state).to_frame().encode()
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

// ── Teardown ──────────────────────────────────────────────────────────────────

/// Many threads disposing at once must run the teardown steps once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispose_runs_teardown_once() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);

    // Act
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let d = Arc::clone(&driver);
            std::thread::spawn(move || d.dispose())
        })
        .collect();
    for handle in handles {
        handle.join().expect("dispose thread panicked");
    }

    // Assert
    assert_eq!(driver.state(), DriverState::Disposed);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(monitor.subscriber_count(), 0);
}

#[tokio::test]
async fn test_closed_resolves_after_explicit_dispose() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);

    // Act
    driver.dispose();

    // Assert
    tokio::time::timeout(Duration::from_secs(1), driver.closed())
        .await
        .expect("closed() should resolve");
    assert!(!transport.is_open());
    assert!(matches!(driver.ping().await, Err(EmitError::Cancelled)));
}

// ── Command emission ──────────────────────────────────────────────────────────

/// Racing submissions are written one after the other, never interleaved.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_submissions_never_interleave() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    transport.set_write_delay(Duration::from_millis(15));
    let driver = open("COM5", &transport, &monitor);

    // Act
    let tasks: Vec<_> = (0..4u8)
        .map(|i| {
            let d = Arc::clone(&driver);
            tokio::spawn(async move { d.submit(0x10 + i, &[i]).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task panicked").expect("submit should succeed");
    }

    // Assert – every Begin is immediately followed by its own End
    let log = transport.write_log();
    assert_eq!(log.len(), 8);
    for pair in log.chunks(2) {
        match pair {
            [WriteMark::Begin(a), WriteMark::End(b)] => assert_eq!(a, b),
            other => panic!("interleaved writes: {other:?}"),
        }
    }
    assert_eq!(transport.writes().len(), 4);
}

#[tokio::test]
async fn test_typed_command_is_written_as_a_full_frame() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);

    // Act
    driver
        .send(&Command::GetUfn { ufn: 2 })
        .await
        .expect("send should succeed");

    // Assert
    assert_eq!(transport.writes(), vec![encode_frame(CMD_GET_UFN, &[2])]);
}

// ── Presence ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unplugging_keypad_disposes_driver() {
    // Arrange
    let (fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);
    assert!(wait_until(|| fake.call_count() >= 1).await, "monitor never ticked");

    // Act
    fake.unplug("COM5");

    // Assert
    tokio::time::timeout(Duration::from_secs(2), driver.closed())
        .await
        .expect("driver should close after removal");
    assert_eq!(transport.close_count(), 1);
    assert_eq!(monitor.subscriber_count(), 0);
}

/// One monitor serves two drivers; removing one port leaves the other alone.
#[tokio::test]
async fn test_removal_only_affects_the_matching_driver() {
    // Arrange
    let (fake, monitor) = monitor_with(&["COM5", "COM6"]);
    let t5 = Arc::new(MockTransport::new());
    let t6 = Arc::new(MockTransport::new());
    let d5 = open("COM5", &t5, &monitor);
    let d6 = open("COM6", &t6, &monitor);
    assert!(wait_until(|| fake.call_count() >= 1).await, "monitor never ticked");

    // Act
    fake.unplug("COM6");
    tokio::time::timeout(Duration::from_secs(2), d6.closed())
        .await
        .expect("COM6 driver should close");
    let later = fake.call_count() + 2;
    assert!(wait_until(|| fake.call_count() >= later).await);

    // Assert
    assert!(d5.is_alive());
    assert!(t5.is_open());
    assert_eq!(monitor.subscriber_count(), 1);
    d5.ping().await.expect("surviving driver still writes");
}

#[tokio::test]
async fn test_other_ports_coming_and_going_are_ignored() {
    // Arrange
    let (fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);
    assert!(wait_until(|| fake.call_count() >= 1).await, "monitor never ticked");

    // Act
    fake.plug(keypad("COM9"));
    let seen = fake.call_count() + 2;
    assert!(wait_until(|| fake.call_count() >= seen).await);
    fake.unplug("COM9");
    let seen = fake.call_count() + 2;
    assert!(wait_until(|| fake.call_count() >= seen).await);

    // Assert
    assert!(driver.is_alive());
    assert_eq!(transport.close_count(), 0);
}

// ── Receiving ─────────────────────────────────────────────────────────────────

/// Notifications split at every possible boundary and mixed with noise still
/// leave the key map holding the last reported state of each key.
#[tokio::test]
async fn test_key_state_map_reflects_last_notification_per_key() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = driver.subscribe_key_state(move |e: &KeyEvent| sink.lock().unwrap().push(*e));

    let mut stream = vec![0x55, 0xAA];
    stream.extend(key_frame(Key::Num5, KeyState::Rise));
    stream.extend(key_frame(Key::Enter, KeyState::Rise));
    stream.push(0x00);
    stream.extend(key_frame(Key::Num5, KeyState::High));
    stream.extend(key_frame(Key::Enter, KeyState::Fall));
    stream.extend(key_frame(Key::Ufn1, KeyState::Rise));

    // Act – feed three bytes at a time
    for chunk in stream.chunks(3) {
        assert!(transport.inject(chunk));
    }
    assert!(wait_until(|| events.lock().unwrap().len() == 5).await);

    // Assert
    assert_eq!(driver.key_state(Key::Num5), Some(KeyState::High));
    assert_eq!(driver.key_state(Key::Enter), Some(KeyState::Fall));
    assert_eq!(driver.key_state(Key::Ufn1), Some(KeyState::Rise));
    assert_eq!(driver.key_state(Key::Num0), None);
    assert_eq!(driver.pressed_keys(), vec![Key::Ufn1, Key::Num5]);
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&KeyEvent::new(Key::Ufn1, KeyState::Rise))
    );
}

#[tokio::test]
async fn test_corrupted_notification_is_dropped_and_stream_recovers() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);
    let mut bad = key_frame(Key::Num7, KeyState::Rise);
    let last = bad.len() - 1;
    bad[last] = bad[last].wrapping_add(1);

    // Act
    transport.inject(&bad);
    transport.inject(&key_frame(Key::Num8, KeyState::Rise));

    // Assert
    assert!(wait_until(|| driver.key_state(Key::Num8).is_some()).await);
    assert_eq!(driver.key_state(Key::Num7), None);
    assert!(driver.is_alive());
}

#[tokio::test]
async fn test_ufn_reply_reaches_frame_subscribers() {
    // Arrange
    let (_fake, monitor) = monitor_with(&["COM5"]);
    let transport = Arc::new(MockTransport::new());
    let driver = open("COM5", &transport, &monitor);
    let frames = Arc::new(Mutex::new(Vec::<Frame>::new()));
    let sink = Arc::clone(&frames);
    let _sub = driver.subscribe_frames(move |f| sink.lock().unwrap().push(f.clone()));
    let request = Command::GetUfn { ufn: 1 };
    driver.send(&request).await.expect("send should succeed");

    // Act – device answers: success, ufn 1, scan code 0x04, no modifiers, toggle
    transport.inject(&encode_frame(request.reply_code(), &[0, 1, 0x04, 0x00, 1]));

    // Assert
    assert!(wait_until(|| frames.lock().unwrap().len() == 1).await);
    let frame = frames.lock().unwrap()[0].clone();
    let reply = UfnReply::from_frame(&frame).expect("valid reply");
    assert_eq!(reply.request, CMD_GET_UFN);
    assert_eq!(reply.status, DeviceStatus::Success);
    let mapping = reply.mapping().expect("successful reply has a mapping");
    assert_eq!(mapping.scan_code, 0x04);
    assert_eq!(mapping.toggle, ToggleMode::Toggle);
    assert!(driver.key_states().is_empty());
}
