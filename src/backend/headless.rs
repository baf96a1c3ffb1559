//! In-memory [`Host`](crate::traits::Host) with no display server.
//!
//! [`HeadlessHost`] keeps a window table and a single monitor, and records
//! what a real compositor would have done: which window got focus, which
//! hooks are registered, what was damaged, and which framebuffers were drawn
//! where.  Framebuffers carry no pixels, only the list of windows rendered
//! into them since the last clear.
//!
//! It backs the daemon binary and the session tests.

use crate::command::{Color, InputKind, MonitorInfo, PixelFormat, Rect, Vec2, WindowId};
use crate::traits::{Compositor, HookHandle, Renderer, WindowFilter};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// A window known to the headless host.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    pub id: WindowId,
    pub title: String,
    pub mapped: bool,
    pub hidden: bool,
    pub accepts_focus: bool,
    /// Lives on a special (scratchpad) workspace.
    pub special: bool,
    /// Has presented at least one buffer.
    pub has_content: bool,
}

impl HeadlessWindow {
    /// A mapped, visible, focusable window with content.
    pub fn new(id: WindowId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            mapped: true,
            hidden: false,
            accepts_focus: true,
            special: false,
            has_content: true,
        }
    }
}

/// Handle to a headless render target.
#[derive(Debug, PartialEq, Eq)]
pub struct SoftwareFramebuffer {
    id: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl SoftwareFramebuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f64, self.height as f64)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

/// Errors from the headless host.
#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error("no such window: {0}")]
    UnknownWindow(WindowId),
    #[error("window {0} does not accept focus")]
    Unfocusable(WindowId),
    #[error("cannot allocate a {width}x{height} framebuffer")]
    Alloc { width: u32, height: u32 },
}

/// An in-memory compositor and renderer.
#[derive(Debug)]
pub struct HeadlessHost {
    monitor: MonitorInfo,
    windows: Vec<HeadlessWindow>,
    focused: Option<WindowId>,
    focus_history: Vec<WindowId>,
    pointer: Vec2,
    hooks: BTreeMap<u64, InputKind>,
    next_hook: u64,
    cursor: Option<String>,
    damage_events: usize,
    damaged_boxes: Vec<Rect>,
    frames_scheduled: usize,
    blur_invalidations: usize,
    context_activations: usize,
    next_framebuffer: u64,
    live_framebuffers: usize,
    contents: HashMap<u64, Vec<WindowId>>,
    bound: Option<u64>,
    pairing_errors: usize,
    render_counts: HashMap<WindowId, usize>,
    frame: Vec<(u64, Rect)>,
    background: Option<Color>,
    fail_allocations: bool,
}

impl HeadlessHost {
    /// An empty host with one monitor.
    pub fn new(monitor: MonitorInfo) -> Self {
        Self {
            monitor,
            windows: Vec::new(),
            focused: None,
            focus_history: Vec::new(),
            pointer: Vec2::ZERO,
            hooks: BTreeMap::new(),
            next_hook: 1,
            cursor: None,
            damage_events: 0,
            damaged_boxes: Vec::new(),
            frames_scheduled: 0,
            blur_invalidations: 0,
            context_activations: 0,
            next_framebuffer: 1,
            live_framebuffers: 0,
            contents: HashMap::new(),
            bound: None,
            pairing_errors: 0,
            render_counts: HashMap::new(),
            frame: Vec::new(),
            background: None,
            fail_allocations: false,
        }
    }

    /// The 1920x1080 monitor used when none is given.
    pub fn default_monitor() -> MonitorInfo {
        MonitorInfo {
            name: "HEADLESS-1".into(),
            position: Vec2::ZERO,
            size: Vec2::new(1920.0, 1080.0),
            pixel_size: Vec2::new(1920.0, 1080.0),
            scale: 1.0,
            format: PixelFormat::XRGB8888,
        }
    }

    /// A host with `count` windows, ids `1..=count`, the first one
    /// focused.
    pub fn with_windows(count: usize) -> Self {
        let mut host = Self::new(Self::default_monitor());
        for i in 0..count {
            let id = WindowId(i as u64 + 1);
            host.add_window(HeadlessWindow::new(id, format!("window {}", i + 1)));
        }
        host.focused = host.windows.first().map(|w| w.id);
        host
    }

    //  Scripting

    pub fn add_window(&mut self, window: HeadlessWindow) {
        debug!("headless: new window {} ({:?})", window.id, window.title);
        self.windows.push(window);
    }

    /// Destroy a window.  Returns whether it existed.
    pub fn remove_window(&mut self, id: WindowId) -> bool {
        let before = self.windows.len();
        self.windows.retain(|w| w.id != id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        before != self.windows.len()
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut HeadlessWindow> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    /// Move keyboard focus without going through the overview.
    pub fn focus(&mut self, id: WindowId) {
        self.focused = Some(id);
    }

    /// Move the pointer to a global position.
    pub fn move_pointer(&mut self, point: Vec2) {
        self.pointer = point;
    }

    /// Resize or rescale the monitor, as a mode change or `wlr-randr` would.
    pub fn set_monitor(&mut self, monitor: MonitorInfo) {
        info!(
            "headless: monitor {} now {} ({} px) @ {}",
            monitor.name, monitor.size, monitor.pixel_size, monitor.scale
        );
        self.monitor = monitor;
    }

    /// Make every following framebuffer allocation fail.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    //  Inspection

    pub fn monitor_info(&self) -> &MonitorInfo {
        &self.monitor
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.iter().map(|w| w.id).collect()
    }

    pub fn focused_window_id(&self) -> Option<WindowId> {
        self.focused
    }

    /// Windows focused through [`Compositor::focus_window`], oldest first.
    pub fn focus_history(&self) -> &[WindowId] {
        &self.focus_history
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn active_hooks(&self) -> usize {
        self.hooks.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.live_framebuffers
    }

    /// Framebuffer currently bound for off-screen drawing.
    pub fn bound_target(&self) -> Option<u64> {
        self.bound
    }

    /// Begin without end, or end without begin, seen so far.
    pub fn pairing_errors(&self) -> usize {
        self.pairing_errors
    }

    /// How many times `window` was rendered into any framebuffer.
    pub fn render_count(&self, window: WindowId) -> usize {
        self.render_counts.get(&window).copied().unwrap_or(0)
    }

    /// Windows rendered into framebuffer `id` since its last clear.
    pub fn framebuffer_contents(&self, id: u64) -> &[WindowId] {
        self.contents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Framebuffers composited since the monitor was last cleared, with
    /// their destination boxes.
    pub fn last_frame(&self) -> &[(u64, Rect)] {
        &self.frame
    }

    /// Colour the monitor was last cleared to.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn damage_events(&self) -> usize {
        self.damage_events
    }

    pub fn damaged_boxes(&self) -> &[Rect] {
        &self.damaged_boxes
    }

    pub fn frames_scheduled(&self) -> usize {
        self.frames_scheduled
    }

    pub fn blur_invalidations(&self) -> usize {
        self.blur_invalidations
    }

    /// Times the graphics context was made current.
    pub fn context_activations(&self) -> usize {
        self.context_activations
    }

    fn window(&self, id: WindowId) -> Option<&HeadlessWindow> {
        self.windows.iter().find(|w| w.id == id)
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(Self::default_monitor())
    }
}

impl Compositor for HeadlessHost {
    type Error = HeadlessError;

    fn monitor(&self) -> MonitorInfo {
        self.monitor.clone()
    }

    fn eligible_windows(&self, _monitor: &MonitorInfo, filter: WindowFilter) -> Vec<WindowId> {
        self.windows
            .iter()
            .filter(|w| w.mapped && !w.hidden && w.accepts_focus)
            .filter(|w| filter.include_special || !w.special)
            .filter(|w| !filter.skip_empty || w.has_content)
            .map(|w| w.id)
            .collect()
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused
    }

    fn is_window_valid(&self, window: WindowId) -> bool {
        self.window(window).is_some_and(|w| w.mapped)
    }

    fn focus_window(&mut self, window: WindowId) -> Result<(), HeadlessError> {
        let w = self.window(window).ok_or(HeadlessError::UnknownWindow(window))?;
        if !w.accepts_focus {
            return Err(HeadlessError::Unfocusable(window));
        }
        info!("headless: focus -> {}", window);
        self.focused = Some(window);
        self.focus_history.push(window);
        Ok(())
    }

    fn warp_pointer(&mut self, point: Vec2) -> Result<(), HeadlessError> {
        self.pointer = point;
        Ok(())
    }

    fn pointer_position(&self) -> Vec2 {
        self.pointer
    }

    fn register_input_hook(&mut self, kind: InputKind) -> HookHandle {
        let id = self.next_hook;
        self.next_hook += 1;
        self.hooks.insert(id, kind);
        debug!("headless: hook {} registered for {}", id, kind);
        HookHandle(id)
    }

    fn unregister_input_hook(&mut self, handle: HookHandle) {
        if self.hooks.remove(&handle.0).is_none() {
            warn!("headless: unknown hook {}", handle.0);
        }
    }

    fn set_cursor_image(&mut self, name: &str) {
        self.cursor = Some(name.to_owned());
    }

    fn unset_cursor_image(&mut self) {
        self.cursor = None;
    }

    fn damage_monitor(&mut self, _monitor: &MonitorInfo) {
        self.damage_events += 1;
    }

    fn damage_box(&mut self, rect: Rect) {
        self.damaged_boxes.push(rect);
    }

    fn schedule_frame(&mut self, _monitor: &MonitorInfo) {
        self.frames_scheduled += 1;
    }
}

impl Renderer for HeadlessHost {
    type Framebuffer = SoftwareFramebuffer;
    type Error = HeadlessError;

    fn make_current(&mut self) {
        self.context_activations += 1;
    }

    fn alloc_framebuffer(
        &mut self,
        size: Vec2,
        format: PixelFormat,
    ) -> Result<SoftwareFramebuffer, HeadlessError> {
        let (width, height) = (size.x.round().max(0.0) as u32, size.y.round().max(0.0) as u32);
        if self.fail_allocations || width == 0 || height == 0 {
            return Err(HeadlessError::Alloc { width, height });
        }
        let id = self.next_framebuffer;
        self.next_framebuffer += 1;
        self.live_framebuffers += 1;
        self.contents.insert(id, Vec::new());
        Ok(SoftwareFramebuffer {
            id,
            width,
            height,
            format,
        })
    }

    fn release_framebuffer(&mut self, framebuffer: SoftwareFramebuffer) {
        if self.bound == Some(framebuffer.id) {
            warn!("headless: releasing bound framebuffer {}", framebuffer.id);
            self.pairing_errors += 1;
        }
        self.contents.remove(&framebuffer.id);
        self.live_framebuffers = self.live_framebuffers.saturating_sub(1);
    }

    fn begin_offscreen(&mut self, _monitor: &MonitorInfo, framebuffer: &mut SoftwareFramebuffer) {
        if let Some(previous) = self.bound.replace(framebuffer.id) {
            warn!("headless: framebuffer {} still bound", previous);
            self.pairing_errors += 1;
        }
    }

    fn clear(&mut self, color: Color) {
        match self.bound {
            Some(id) => {
                if let Some(contents) = self.contents.get_mut(&id) {
                    contents.clear();
                }
            }
            None => {
                self.frame.clear();
                self.background = Some(color);
            }
        }
    }

    fn render_window(&mut self, window: WindowId, _monitor: &MonitorInfo, _now: Instant) {
        let Some(id) = self.bound else {
            warn!("headless: render of {} with no target bound", window);
            return;
        };
        if let Some(contents) = self.contents.get_mut(&id) {
            contents.push(window);
        }
        *self.render_counts.entry(window).or_insert(0) += 1;
    }

    fn end_offscreen(&mut self) {
        if self.bound.take().is_none() {
            warn!("headless: end_offscreen without a bound framebuffer");
            self.pairing_errors += 1;
        }
    }

    fn draw_framebuffer(&mut self, framebuffer: &SoftwareFramebuffer, dest: Rect) {
        self.frame.push((framebuffer.id, dest));
    }

    fn mark_blur_dirty(&mut self, _monitor: &MonitorInfo) {
        self.blur_invalidations += 1;
    }
}

//  Tests
