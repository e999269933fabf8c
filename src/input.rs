//! Input translation from the host surface to the guest's call shape.
//!
//! Pointer coordinates arrive in the surface's logical space and leave in
//! backing-pixel space, top-left origin on both sides. Key identifiers are
//! host-native names mapped through a static table into the stable numeric
//! code space shared with guests; names with no entry are dropped, never
//! forwarded.

use serde::{Deserialize, Serialize};

/// Pointer buttons as reported by the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Auxiliary,
    Secondary,
    /// Anything beyond the three encoded buttons; never forwarded.
    Other,
}

impl PointerButton {
    /// Stable wire code: 1 primary, 2 middle/auxiliary, 3 secondary.
    pub fn code(self) -> Option<i32> {
        match self {
            PointerButton::Primary => Some(1),
            PointerButton::Auxiliary => Some(2),
            PointerButton::Secondary => Some(3),
            PointerButton::Other => None,
        }
    }
}

/// An input event as delivered by the host presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    PointerMove { x: f64, y: f64 },
    PointerDown { x: f64, y: f64, button: PointerButton },
    PointerUp { x: f64, y: f64, button: PointerButton },
    KeyDown { key: String },
    KeyUp { key: String },
}

/// An input event in guest space, ready to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    PointerMove { x: i32, y: i32 },
    PointerDown { x: i32, y: i32, button: i32 },
    PointerUp { x: i32, y: i32, button: i32 },
    KeyDown { code: i32 },
    KeyUp { code: i32 },
}

/// Scaling between the surface's logical coordinate space and its backing
/// pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceScale {
    pub logical_width: f64,
    pub logical_height: f64,
    pub backing_width: u32,
    pub backing_height: u32,
}

impl SurfaceScale {
    /// One-to-one mapping; the default until real surface geometry is known.
    pub fn unity() -> Self {
        Self::identity(1, 1)
    }

    /// Logical and backing spaces coincide (scale factor 1).
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            logical_width: f64::from(width),
            logical_height: f64::from(height),
            backing_width: width,
            backing_height: height,
        }
    }

    fn map(&self, x: f64, y: f64) -> (i32, i32) {
        let sx = scale_factor(self.logical_width, self.backing_width);
        let sy = scale_factor(self.logical_height, self.backing_height);
        ((x * sx).floor() as i32, (y * sy).floor() as i32)
    }
}

impl Default for SurfaceScale {
    fn default() -> Self {
        Self::unity()
    }
}

fn scale_factor(logical: f64, backing: u32) -> f64 {
    if logical > 0.0 {
        f64::from(backing) / logical
    } else {
        1.0
    }
}

/// Translates host surface events into guest-space [`InputEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct InputTranslator {
    scale: SurfaceScale,
}

impl InputTranslator {
    pub fn new(scale: SurfaceScale) -> Self {
        Self { scale }
    }

    /// Replace the coordinate mapping, e.g. after a resize or DPI change.
    pub fn set_scale(&mut self, scale: SurfaceScale) {
        self.scale = scale;
    }

    /// Translate one event. `None` means the event has no guest-space
    /// representation (unmapped key, unencoded button) and is dropped.
    pub fn translate(&self, event: &SurfaceEvent) -> Option<InputEvent> {
        match event {
            SurfaceEvent::PointerMove { x, y } => {
                let (x, y) = self.scale.map(*x, *y);
                Some(InputEvent::PointerMove { x, y })
            }
            SurfaceEvent::PointerDown { x, y, button } => {
                let button = button.code()?;
                let (x, y) = self.scale.map(*x, *y);
                Some(InputEvent::PointerDown { x, y, button })
            }
            SurfaceEvent::PointerUp { x, y, button } => {
                let button = button.code()?;
                let (x, y) = self.scale.map(*x, *y);
                Some(InputEvent::PointerUp { x, y, button })
            }
            SurfaceEvent::KeyDown { key } => {
                key_code(key).map(|code| InputEvent::KeyDown { code })
            }
            SurfaceEvent::KeyUp { key } => key_code(key).map(|code| InputEvent::KeyUp { code }),
        }
    }
}

/// Map a host-native key identifier (W3C `KeyboardEvent.code` names) to the
/// stable numeric code space shared with guests.
///
/// Guests see the same number on every platform. Identifiers without an
/// entry return `None` and must not be forwarded.
pub fn key_code(key: &str) -> Option<i32> {
    if let Some(rest) = key.strip_prefix("Key") {
        return single_char(rest)
            .filter(char::is_ascii_uppercase)
            .map(|c| c as i32);
    }
    if let Some(rest) = key.strip_prefix("Digit") {
        return single_char(rest)
            .filter(char::is_ascii_digit)
            .map(|c| c as i32);
    }
    let code = match key {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "ShiftLeft" | "ShiftRight" => 16,
        "ControlLeft" | "ControlRight" => 17,
        "AltLeft" | "AltRight" => 18,
        "Escape" => 27,
        "Space" => 32,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        "Delete" => 46,
        _ => return None,
    };
    Some(code)
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
