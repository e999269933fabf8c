//! End-to-end frame and input flow: package bytes in, host-owned pixels out.

use wapp_host::{
    InputEvent, Metadata, Package, PointerButton, Session, SessionConfig, SurfaceEvent,
    SurfaceScale, TickOutcome,
};

/// Publishes a 2x2 all-red frame from a data segment on every update.
const RED_GUEST: &str = r#"
(module
  (import "wapp" "publish_frame" (func $publish (param i32 i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 64) "\ff\00\00\ff\ff\00\00\ff\ff\00\00\ff\ff\00\00\ff")
  (func (export "update") (param f64)
    (call $publish (i32.const 2) (i32.const 2) (i32.const 64))))
"#;

/// Grows memory by one page on the first update, then publishes a single
/// pixel stored beyond the original page boundary.
const GROWING_GUEST: &str = r#"
(module
  (import "wapp" "publish_frame" (func $publish (param i32 i32 i32)))
  (memory (export "memory") 1)
  (global $grown (mut i32) (i32.const 0))
  (func (export "update") (param f64)
    (if (i32.eqz (global.get $grown))
      (then
        (drop (memory.grow (i32.const 1)))
        (global.set $grown (i32.const 1))))
    (i32.store (i32.const 65536) (i32.const 0x04030201))
    (call $publish (i32.const 1) (i32.const 1) (i32.const 65536))))
"#;

/// Publishes a descriptor far larger than its one page of memory.
const OOB_GUEST: &str = r#"
(module
  (import "wapp" "publish_frame" (func $publish (param i32 i32 i32)))
  (memory (export "memory") 1)
  (func (export "update") (param f64)
    (call $publish (i32.const 300) (i32.const 300) (i32.const 16))))
"#;

/// Records the last pointer-down into memory and publishes those 12 bytes
/// as a 3x1 frame. Exports no key handlers at all.
const POINTER_GUEST: &str = r#"
(module
  (import "wapp" "publish_frame" (func $publish (param i32 i32 i32)))
  (memory (export "memory") 1)
  (func (export "update") (param f64)
    (call $publish (i32.const 3) (i32.const 1) (i32.const 16)))
  (func (export "on_pointer_down") (param i32 i32 i32)
    (i32.store (i32.const 16) (local.get 0))
    (i32.store (i32.const 20) (local.get 1))
    (i32.store (i32.const 24) (local.get 2))))
"#;

/// Records the last resize notification and publishes it as a 2x1 frame.
const RESIZE_GUEST: &str = r#"
(module
  (import "wapp" "publish_frame" (func $publish (param i32 i32 i32)))
  (memory (export "memory") 1)
  (func (export "update") (param f64)
    (call $publish (i32.const 2) (i32.const 1) (i32.const 16)))
  (func (export "on_resize") (param i32 i32)
    (i32.store (i32.const 16) (local.get 0))
    (i32.store (i32.const 20) (local.get 1))))
"#;

/// Updates without ever publishing.
const SILENT_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "update") (param f64)))
"#;

fn running_session(metadata: Metadata, guest: &str) -> Session {
    let bytes = Package::encode(&metadata, guest.as_bytes());
    let mut session = Session::new(SessionConfig::default());
    session.load(&bytes, "fallback").unwrap();
    session
}

fn frame_data(session: &mut Session) -> Vec<u8> {
    match session.step(1.0 / 60.0).unwrap() {
        TickOutcome::Frame(frame) => frame.data().to_vec(),
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[test]
fn red_frame_end_to_end() {
    let mut session = running_session(Metadata::named("Demo"), RED_GUEST);
    assert_eq!(session.title(), "Demo");

    match session.step(1.0 / 60.0).unwrap() {
        TickOutcome::Frame(frame) => {
            assert_eq!((frame.width(), frame.height()), (2, 2));
            assert_eq!(frame.pitch(), 8);
            assert_eq!(frame.data(), &[255, 0, 0, 255].repeat(4));
        }
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[test]
fn empty_metadata_falls_back_to_caller_title() {
    let session = running_session(Metadata::new(), RED_GUEST);
    assert_eq!(session.title(), "fallback");
}

#[test]
fn unpublished_guest_yields_no_frame() {
    let mut session = running_session(Metadata::new(), SILENT_GUEST);
    assert!(matches!(
        session.step(1.0 / 60.0).unwrap(),
        TickOutcome::NoFrame
    ));
}

#[test]
fn frame_survives_memory_growth() {
    let mut session = running_session(Metadata::new(), GROWING_GUEST);

    // First tick grows memory mid-update; the bridge must read the pixel
    // from the memory as it is after the call, not from a stale view.
    assert_eq!(frame_data(&mut session), vec![1, 2, 3, 4]);
    assert_eq!(frame_data(&mut session), vec![1, 2, 3, 4]);
}

#[test]
fn out_of_bounds_descriptor_skips_the_frame_only() {
    let mut session = running_session(Metadata::new(), OOB_GUEST);

    for _ in 0..3 {
        match session.step(1.0 / 60.0).unwrap() {
            TickOutcome::Skipped(err) => {
                assert!(err.to_string().contains("out of bounds"), "{err}");
            }
            other => panic!("expected a skipped frame, got {other:?}"),
        }
    }
    assert_eq!(session.state(), wapp_host::SessionState::Running);
}

#[test]
fn pointer_events_reach_the_guest_before_update() {
    let mut session = running_session(Metadata::new(), POINTER_GUEST);

    // No on_key_up export: the event is dropped silently and the pointer
    // event right after it still lands.
    session.queue_input(InputEvent::KeyUp { code: 65 });
    session.queue_input(InputEvent::PointerDown {
        x: 5,
        y: 7,
        button: 1,
    });

    let expected = [5i32, 7, 1]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect::<Vec<u8>>();
    assert_eq!(frame_data(&mut session), expected);
}

#[test]
fn surface_events_are_scaled_into_backing_pixels() {
    let mut session = running_session(Metadata::new(), POINTER_GUEST);
    session.set_surface_scale(SurfaceScale {
        logical_width: 320.0,
        logical_height: 240.0,
        backing_width: 640,
        backing_height: 480,
    });

    // Unmapped key identifiers vanish at translation time.
    session.queue(&SurfaceEvent::KeyDown {
        key: "VolumeUp".into(),
    });
    session.queue(&SurfaceEvent::PointerDown {
        x: 2.5,
        y: 3.5,
        button: PointerButton::Primary,
    });

    let expected = [5i32, 7, 1]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect::<Vec<u8>>();
    assert_eq!(frame_data(&mut session), expected);
}

#[test]
fn resize_notification_reaches_the_guest() {
    let mut session = running_session(Metadata::new(), RESIZE_GUEST);
    session.resize(640, 480).unwrap();

    let expected = [640i32, 480]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect::<Vec<u8>>();
    assert_eq!(frame_data(&mut session), expected);
}
