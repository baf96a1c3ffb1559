//! Core traits that decouple hyprexpose from any specific compositor or
//! transport mechanism.
//!
//! The overview never reaches into compositor internals.  Everything it
//! needs from the host is listed here as an explicit, minimal contract:
//!
//! * [`Compositor`] — window enumeration, focus, pointer, input hooks,
//!   cursor and damage bookkeeping;
//! * [`Renderer`] — off-screen framebuffers and the "draw window W into
//!   framebuffer F" primitive;
//! * [`CommandSource`] — a transport delivering [`Command`]s (a Unix
//!   socket, a test harness, …).
//!
//! [`Host`] is simply "both [`Compositor`] and [`Renderer`]"; session entry
//! points take `&mut H: Host` so the host context is always passed
//! explicitly and never stored.

use crate::command::{Color, Command, InputKind, MonitorInfo, PixelFormat, Rect, Vec2, WindowId};
use std::sync::mpsc;
use std::time::Instant;

/// Which windows a session should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowFilter {
    /// Also list windows on special (scratchpad) workspaces.
    pub include_special: bool,
    /// Leave out windows that have never presented any content.
    pub skip_empty: bool,
}

/// Token returned by [`Compositor::register_input_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(pub u64);

/// Window-management side of the host.
///
/// Every mutating call is best-effort: a window may have been destroyed
/// since its [`WindowId`] was handed out, and implementations should treat
/// that as a no-op rather than an error where they can.
pub trait Compositor {
    /// The error type produced by this compositor.
    type Error: std::error::Error + Send + 'static;

    /// The display surface the overview opens on (the last focused
    /// monitor).
    fn monitor(&self) -> MonitorInfo;

    /// Windows to show on `monitor`, in a stable order: mapped, not hidden,
    /// willing to take focus, honouring `filter`.
    fn eligible_windows(&self, monitor: &MonitorInfo, filter: WindowFilter) -> Vec<WindowId>;

    /// The window that currently has keyboard focus, if any.
    fn focused_window(&self) -> Option<WindowId>;

    /// Whether `window` still exists and is mapped.
    fn is_window_valid(&self, window: WindowId) -> bool;

    /// Give `window` keyboard focus.
    fn focus_window(&mut self, window: WindowId) -> Result<(), Self::Error>;

    /// Move the pointer to a global position.
    fn warp_pointer(&mut self, point: Vec2) -> Result<(), Self::Error>;

    /// Current pointer position in global coordinates.
    fn pointer_position(&self) -> Vec2;

    /// Start routing `kind` events to the overview.  While registered, the
    /// host asks the overview whether each event is consumed before
    /// handling it itself.
    fn register_input_hook(&mut self, kind: InputKind) -> HookHandle;

    /// Stop routing events for a hook returned by
    /// [`register_input_hook`](Compositor::register_input_hook).
    fn unregister_input_hook(&mut self, handle: HookHandle);

    /// Override the cursor image until [`unset_cursor_image`](Compositor::unset_cursor_image).
    fn set_cursor_image(&mut self, name: &str);

    /// Restore the default cursor.
    fn unset_cursor_image(&mut self);

    /// Mark the whole monitor as needing a redraw.
    fn damage_monitor(&mut self, monitor: &MonitorInfo);

    /// Mark a global rectangle as needing a redraw.
    fn damage_box(&mut self, rect: Rect);

    /// Ask for a frame on `monitor` even if nothing else is damaged.
    fn schedule_frame(&mut self, monitor: &MonitorInfo);
}

/// GPU side of the host.
///
/// Framebuffer allocation and release are synchronous and must happen with
/// the host's graphics context current; callers invoke
/// [`make_current`](Renderer::make_current) first.
pub trait Renderer {
    /// Backing storage of one off-screen render target.
    type Framebuffer;

    /// The error type produced when allocation fails.
    type Error: std::error::Error + Send + 'static;

    /// Make the host's graphics context current on this thread.
    fn make_current(&mut self);

    /// Allocate a render target of `size` physical pixels.
    fn alloc_framebuffer(
        &mut self,
        size: Vec2,
        format: PixelFormat,
    ) -> Result<Self::Framebuffer, Self::Error>;

    /// Free a render target.
    fn release_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    /// Bind `framebuffer` as the target of subsequent draws.  Always paired
    /// with [`end_offscreen`](Renderer::end_offscreen).
    fn begin_offscreen(&mut self, monitor: &MonitorInfo, framebuffer: &mut Self::Framebuffer);

    /// Fill the bound target with `color`.
    fn clear(&mut self, color: Color);

    /// Draw the current contents of `window` into the bound target.  Must
    /// not change any window state.
    fn render_window(&mut self, window: WindowId, monitor: &MonitorInfo, now: Instant);

    /// Restore the default render target.
    fn end_offscreen(&mut self);

    /// Composite a framebuffer's texture onto the monitor at `dest` (pixel
    /// space).
    fn draw_framebuffer(&mut self, framebuffer: &Self::Framebuffer, dest: Rect);

    /// Drop any cached blur for `monitor` after the overview disappears.
    fn mark_blur_dirty(&mut self, monitor: &MonitorInfo);
}

/// A full host: compositor and renderer in one context object.
pub trait Host: Compositor + Renderer {}

impl<T: Compositor + Renderer> Host for T {}

//  Command Source

/// A source of [`Command`]s.
///
/// Implementations listen on some transport and forward parsed commands
/// into the provided [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error>;
}
