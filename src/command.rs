//! Commands and types used throughout hyprexpose.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes every request an embedding host (or the daemon's
//! socket) can make of an overview, and [`Vec2`] / [`Rect`] / [`Color`] /
//! [`MonitorInfo`] / [`WindowId`] provide the supporting data types.
//!
//! Colours accept either a raw ARGB integer or a `"0xAARRGGBB"` string so
//! the same value can be copied out of a Hyprland config file.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

//  Geometry

/// A 2D vector in logical or pixel space, depending on context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Same value on both axes.
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v }
    }

    /// Component-wise linear interpolation towards `to`.
    pub fn lerp(self, to: Vec2, t: f64) -> Vec2 {
        (to - self) * t + self
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Div for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x{:.1}", self.x, self.y)
    }
}

/// An axis-aligned rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// A rectangle at the origin with the given size.
    pub fn from_size(size: Vec2) -> Self {
        Self::new(0.0, 0.0, size.x, size.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.w, self.h)
    }

    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Move the rectangle by `offset`.
    pub fn translate(self, offset: Vec2) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.w, self.h)
    }

    /// Scale position and size by `factor` (logical → pixel space).
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.w * factor, self.h * factor)
    }

    /// Snap to whole pixels, keeping the far edge where it rounds to.
    pub fn round(self) -> Self {
        let x = self.x.round();
        let y = self.y.round();
        let right = (self.x + self.w).round();
        let bottom = (self.y + self.h).round();
        Self::new(x, y, right - x, bottom - y)
    }

    /// Whether the interiors of `self` and `other` intersect.  Touching
    /// edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

//  Colour

/// An RGBA colour with components in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Decode a packed `0xAARRGGBB` value.
    pub fn from_argb(argb: u32) -> Self {
        let channel = |shift: u32| ((argb >> shift) & 0xff) as f64 / 255.0;
        Self::new(channel(16), channel(8), channel(0), channel(24))
    }

    /// The same colour, fully opaque.
    pub fn strip_alpha(self) -> Self {
        Self { a: 1.0, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::from_argb(0xff11_1111)
    }
}

/// Parse `"0xAARRGGBB"`, `"AARRGGBB"` or a decimal string.
fn parse_argb(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s
            .parse::<u32>()
            .ok()
            .or_else(|| u32::from_str_radix(s, 16).ok()),
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Color;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "ARGB integer or \"0xAARRGGBB\" string")
            }
            fn visit_u64<E>(self, n: u64) -> Result<Color, E>
            where
                E: DeError,
            {
                let argb = u32::try_from(n)
                    .map_err(|_| DeError::custom(format!("colour {:#x} does not fit in 32 bits", n)))?;
                Ok(Color::from_argb(argb))
            }
            fn visit_i64<E>(self, n: i64) -> Result<Color, E>
            where
                E: DeError,
            {
                let n = u64::try_from(n).map_err(|_| DeError::custom("colour must not be negative"))?;
                self.visit_u64(n)
            }
            fn visit_str<E>(self, s: &str) -> Result<Color, E>
            where
                E: DeError,
            {
                parse_argb(s)
                    .map(Color::from_argb)
                    .ok_or_else(|| DeError::custom(format!("invalid colour: {:?}", s)))
            }
        }
        deserializer.deserialize_any(V)
    }
}

//  Host objects

/// Opaque handle to a window owned by the host compositor.
///
/// The overview never owns windows; a handle may go stale at any time and
/// every use must tolerate that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Pixel format code of a monitor's output buffers (DRM fourcc on Linux).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    /// `DRM_FORMAT_XRGB8888`.
    pub const XRGB8888: PixelFormat = PixelFormat(0x3432_5258);
}

/// Display surface metadata supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub name: String,
    /// Top-left corner in the global layout (logical px).
    pub position: Vec2,
    /// Logical size.
    pub size: Vec2,
    /// Size of the output buffer in physical pixels.
    pub pixel_size: Vec2,
    pub scale: f64,
    pub format: PixelFormat,
}

/// Input events the overview intercepts while it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    MouseMove,
    TouchMove,
    MouseButton,
    TouchDown,
}

impl InputKind {
    pub const ALL: [InputKind; 4] = [
        InputKind::MouseMove,
        InputKind::TouchMove,
        InputKind::MouseButton,
        InputKind::TouchDown,
    ];

    /// Click or tap, as opposed to motion.
    pub fn is_select(self) -> bool {
        matches!(self, InputKind::MouseButton | InputKind::TouchDown)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::MouseMove => write!(f, "mouseMove"),
            InputKind::TouchMove => write!(f, "touchMove"),
            InputKind::MouseButton => write!(f, "mouseButton"),
            InputKind::TouchDown => write!(f, "touchDown"),
        }
    }
}

//  Commands

/// Every request that can be made of the overview from outside the host's
/// own callbacks.
///
/// Commands are produced by [`CommandSource`](crate::traits::CommandSource)
/// implementations and applied by
/// [`OverviewManager::apply`](crate::manager::OverviewManager::apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Open an overview for the focused window.
    Open { via_swipe: bool },

    /// Open if closed, close (on the opened window) if open.
    Toggle,

    /// Close the overview, focusing the selected or opened window.
    Close,

    /// Remember the tile under the pointer as the close target without
    /// closing.
    SelectHovered,

    /// Move the pointer to a global position (logical px).
    PointerMove { x: f64, y: f64 },

    /// Click at the current pointer position.
    Select,

    /// A multi-finger swipe started.
    SwipeBegin { fingers: u32 },

    /// Incremental vertical finger travel in pixels.
    SwipeUpdate { dy: f64 },

    /// Fingers lifted.
    SwipeEnd,

    /// The host destroyed a window.
    WindowClosed(WindowId),

    /// The host moved keyboard focus to a window.
    FocusChanged(WindowId),
}

//  Tests
