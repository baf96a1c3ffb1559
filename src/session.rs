//! The overview session: one open exposé on one monitor.
//!
//! An [`OverviewSession`] is created by [`OverviewSession::open`], driven by
//! the host's frame and input callbacks, and finally consumed by
//! [`OverviewSession::destroy`] once it reports [`SessionStatus::Closed`].
//!
//! ```text
//! Opening ──(opening transition ends)──► Open ──(select / close)──► Closing ──► Closed
//!                                         │
//!                      Swiping ──(release)─┴─► Settling ──► NotSwiping
//!                                              └──(commit)──► Closing
//! ```
//!
//! Only the opened (or close-target) tile tracks live window content; every
//! other tile shows the snapshot taken when the session opened, or when the
//! last transition ended.
//!
//! Every entry point takes the host explicitly and returns a
//! [`SessionStatus`].  Nothing here returns an error to the host: failures
//! are logged and turn into an orderly close.

use crate::animation::{
    AnimationEvent, SwipeDecision, SwipeRange, TransitionAnimator, SWIPE_COMMIT_THRESHOLD,
};
use crate::command::{InputKind, MonitorInfo, Vec2, WindowId};
use crate::config::Settings;
use crate::framebuffer::{CacheError, TileFramebufferCache};
use crate::grid::{compute_geometry, slot_of, GridGeometry, GridSlot};
use crate::hit_test::hit_test;
use crate::traits::{HookHandle, Host, Renderer, WindowFilter};
use log::{debug, error, info, warn};
use std::sync::mpsc;
use std::time::Instant;

/// Cursor shown while the overview is up.
pub const CURSOR_IMAGE: &str = "left_ptr";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Zooming out from the focused window to the grid.
    Opening,
    /// Grid is up and accepting selection.
    Open,
    /// Zooming into the selected tile.
    Closing,
    /// Finished; the owner must call [`OverviewSession::destroy`].
    Closed,
}

/// Swipe sub-state, orthogonal to [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeState {
    NotSwiping,
    /// Fingers down; the transition tracks them directly.
    Swiping,
    /// Fingers lifted below the commit threshold; easing back to the grid.
    Settling,
}

/// What the owner should do with the session after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    /// Tear the session down now.
    Closed,
}

/// Which transition finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionEnd {
    Opened,
    SwipeReverted,
    Closed,
}

/// One grid cell bound to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// `None` once the window has gone away; the tile then draws nothing.
    pub window: Option<WindowId>,
    pub slot: GridSlot,
}

/// A live overview on one monitor.
pub struct OverviewSession<H: Host> {
    settings: Settings,
    monitor: MonitorInfo,
    tiles: Vec<Tile>,
    framebuffers: TileFramebufferCache<<H as Renderer>::Framebuffer>,
    animator: TransitionAnimator<TransitionEnd>,
    events: mpsc::Receiver<AnimationEvent<TransitionEnd>>,
    state: SessionState,
    swipe: SwipeState,
    via_swipe: bool,
    swipe_spent: bool,
    opened_id: Option<usize>,
    close_on_id: Option<usize>,
    last_pointer_local: Vec2,
    damage_dirty: bool,
    hooks: Vec<HookHandle>,
}

impl<H: Host> OverviewSession<H> {
    /// Open an overview on the host's current monitor.
    ///
    /// `started_on` is the window the user was looking at; when `None` the
    /// host's focused window is used.  With `via_swipe` the session starts
    /// fully zoomed in on that window and waits for swipe updates instead
    /// of running the opening transition.
    ///
    /// If tile storage cannot be allocated the returned session is already
    /// [`SessionState::Closed`].
    pub fn open(
        host: &mut H,
        settings: Settings,
        started_on: Option<WindowId>,
        via_swipe: bool,
        now: Instant,
    ) -> Self {
        host.make_current();
        let monitor = host.monitor();
        let filter = WindowFilter {
            include_special: settings.include_special,
            skip_empty: settings.skip_empty,
        };
        let windows = host.eligible_windows(&monitor, filter);
        let tiles: Vec<Tile> = windows
            .iter()
            .enumerate()
            .map(|(i, &window)| Tile {
                window: Some(window),
                slot: slot_of(i, settings.columns),
            })
            .collect();

        let started_on = started_on.or_else(|| host.focused_window());
        let opened_id = started_on
            .and_then(|w| windows.iter().position(|&candidate| candidate == w))
            .or((!tiles.is_empty()).then_some(0));

        let geometry = compute_geometry(tiles.len(), settings.columns, settings.gap, monitor.size, 1.0);
        let (zoomed_size, zoomed_position) = zoomed_target(&geometry, &monitor, opened_id);

        let (tx, events) = mpsc::channel();
        let mut animator = TransitionAnimator::new(zoomed_size, zoomed_position, tx);
        animator.set_swipe_range(swipe_range(&monitor, zoomed_size, zoomed_position));

        info!(
            "opening overview on {}: {} tile(s), {} column(s), opened on {:?}{}",
            monitor.name,
            tiles.len(),
            settings.columns,
            opened_id,
            if via_swipe { " (swipe)" } else { "" }
        );

        let mut session = Self {
            framebuffers: TileFramebufferCache::new(tiles.len()),
            settings,
            monitor,
            tiles,
            animator,
            events,
            state: SessionState::Opening,
            swipe: SwipeState::NotSwiping,
            via_swipe,
            swipe_spent: false,
            opened_id,
            close_on_id: None,
            last_pointer_local: Vec2::ZERO,
            damage_dirty: false,
            hooks: Vec::new(),
        };

        if let Err(e) = session.redraw_all(host, true, now) {
            session.fail(e);
            return session;
        }

        if via_swipe {
            session.state = SessionState::Open;
            session.swipe = SwipeState::Swiping;
        } else {
            session.animator.begin_timed_transition(
                session.monitor.size,
                Vec2::ZERO,
                session.settings.transition,
                TransitionEnd::Opened,
                now,
            );
        }

        host.set_cursor_image(CURSOR_IMAGE);
        session.last_pointer_local = host.pointer_position() - session.monitor.position;
        session.hooks = InputKind::ALL
            .iter()
            .map(|&kind| {
                debug!("intercepting {} events", kind);
                host.register_input_hook(kind)
            })
            .collect();

        host.damage_monitor(&session.monitor);
        host.schedule_frame(&session.monitor);
        session
    }

    //  Accessors

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn swipe_state(&self) -> SwipeState {
        self.swipe
    }

    pub fn status(&self) -> SessionStatus {
        if self.state == SessionState::Closed {
            SessionStatus::Closed
        } else {
            SessionStatus::Running
        }
    }

    pub fn monitor(&self) -> &MonitorInfo {
        &self.monitor
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tile the session opened on.  `None` for an empty grid.
    pub fn opened_id(&self) -> Option<usize> {
        self.opened_id
    }

    /// Tile the session will close on, once chosen.
    pub fn close_on_id(&self) -> Option<usize> {
        self.close_on_id
    }

    /// Current animated `(size, position)`.
    pub fn transform(&self) -> (Vec2, Vec2) {
        (self.animator.size(), self.animator.position())
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.live_allocations()
    }

    /// Allocated size of a tile's framebuffer.
    pub fn framebuffer_size(&self, tile: usize) -> Option<Vec2> {
        self.framebuffers.size_of(tile)
    }

    //  Frame callbacks

    /// Composite the grid onto the monitor.  Called once per frame.
    pub fn render(&mut self, host: &mut H) -> SessionStatus {
        if self.state == SessionState::Closed {
            return self.status();
        }
        self.sync_monitor(host);
        host.make_current();

        let percent = self.animator.percent();
        let gap_scale = if self.state == SessionState::Closing {
            1.0 - percent
        } else {
            percent
        };
        let geometry = compute_geometry(
            self.tiles.len(),
            self.settings.columns,
            self.settings.gap,
            self.animator.size(),
            gap_scale,
        );
        let offset = self.animator.position();
        let scale = self.monitor.scale;

        host.clear(self.settings.background.strip_alpha());
        for (i, rect) in geometry.tile_rects().enumerate() {
            let Some(framebuffer) = self.framebuffers.get(i) else {
                continue;
            };
            host.draw_framebuffer(framebuffer, rect.scale(scale).translate(offset).round());
        }
        self.status()
    }

    /// Refresh the active tile if its window reported damage since the last
    /// frame.
    pub fn on_pre_render(&mut self, host: &mut H, now: Instant) -> SessionStatus {
        if self.state == SessionState::Closed {
            return self.status();
        }
        self.sync_monitor(host);
        if !self.damage_dirty {
            return self.status();
        }
        self.damage_dirty = false;

        let active = if self.state == SessionState::Closing {
            self.close_on_id.or(self.opened_id)
        } else {
            self.opened_id
        };
        if let Some(id) = active {
            if let Err(e) = self.redraw_id(host, id, false, now) {
                self.fail(e);
            }
        }
        self.status()
    }

    /// The host saw damage on the monitor.  Marks the active tile for a
    /// lazy refresh and asks for a frame.
    pub fn on_damage_reported(&mut self, host: &mut H) -> SessionStatus {
        if self.state == SessionState::Closed {
            return self.status();
        }
        self.sync_monitor(host);
        self.damage_dirty = true;

        if let Some(id) = self.opened_id {
            let geometry = compute_geometry(
                self.tiles.len(),
                self.settings.columns,
                self.settings.gap,
                self.animator.size(),
                1.0,
            );
            // The animated offset is in pixels; damage is in global logical space.
            let offset = self.animator.position() / self.monitor.scale;
            host.damage_box(
                geometry
                    .tile_rect(id)
                    .translate(offset)
                    .translate(self.monitor.position),
            );
        }
        host.damage_monitor(&self.monitor);
        host.schedule_frame(&self.monitor);
        self.status()
    }

    /// Advance transitions and act on any that finished.
    pub fn tick(&mut self, host: &mut H, now: Instant) -> SessionStatus {
        if self.state == SessionState::Closed {
            return self.status();
        }
        self.sync_monitor(host);
        self.animator.tick(now);
        self.pump(host, now);
        self.status()
    }

    //  Input

    /// An intercepted input event.  Returns whether the overview consumed
    /// it; the host must not handle a consumed event itself.
    pub fn on_input(&mut self, host: &mut H, kind: InputKind, now: Instant) -> (bool, SessionStatus) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return (false, self.status());
        }
        self.sync_monitor(host);

        self.last_pointer_local = host.pointer_position() - self.monitor.position;
        if kind.is_select() {
            self.select_hovered();
            return (true, self.close(host, now));
        }
        (true, self.status())
    }

    /// Remember the tile under the pointer as the close target.
    pub fn select_hovered(&mut self) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.close_on_id = self.hovered_tile();
        debug!("hovered tile: {:?}", self.close_on_id);
    }

    /// Tile under the last recorded pointer position, measured against the
    /// grid as it is currently drawn.
    fn hovered_tile(&self) -> Option<usize> {
        let columns = self.settings.columns.get();
        let rows = self.tiles.len().div_ceil(columns);
        let divisor = columns.max(rows) as f64;

        let tile = self.animator.size() / divisor;
        let extent = tile * Vec2::new(columns as f64, rows as f64);
        let local = self.last_pointer_local - self.animator.position() / self.monitor.scale;
        hit_test(local, extent, columns, rows, self.tiles.len())
    }

    /// Start closing on the selected tile (or the opened one).
    ///
    /// The tile's window is focused if it still exists.  On an empty grid
    /// nothing is focused but the session still closes.
    pub fn close(&mut self, host: &mut H, now: Instant) -> SessionStatus {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return self.status();
        }
        self.sync_monitor(host);

        let target = self.close_on_id.or(self.opened_id);
        match target.and_then(|id| self.tiles.get(id)).and_then(|t| t.window) {
            Some(window) if host.is_window_valid(window) => {
                info!("closing overview on tile {:?} (window {})", target, window);
                if let Err(e) = host.focus_window(window) {
                    warn!("failed to focus {}: {}", window, e);
                }
            }
            Some(window) => warn!("window {} is gone, closing without focus", window),
            None => info!("closing overview without a target window"),
        }

        let geometry = self.settled_geometry();
        let (size, position) = zoomed_target(&geometry, &self.monitor, target);
        self.state = SessionState::Closing;
        self.swipe = SwipeState::NotSwiping;
        self.close_on_id = target;
        self.animator.begin_timed_transition(
            size,
            position,
            self.settings.transition,
            TransitionEnd::Closed,
            now,
        );

        if let Err(e) = self.redraw_all(host, false, now) {
            self.fail(e);
        }
        host.damage_monitor(&self.monitor);
        host.schedule_frame(&self.monitor);
        self.status()
    }

    //  Swipe

    /// Accumulated finger travel since the swipe began.  Ignored unless the
    /// session was opened by a swipe that has not been released yet.
    pub fn on_swipe_update(&mut self, host: &mut H, delta: f64, now: Instant) -> SessionStatus {
        if !self.via_swipe
            || self.swipe_spent
            || matches!(self.state, SessionState::Closing | SessionState::Closed)
        {
            return self.status();
        }
        self.sync_monitor(host);
        self.swipe = SwipeState::Swiping;
        if let Some(percent) = self
            .animator
            .drive_by_swipe_delta(delta, self.settings.gestures.distance)
        {
            debug!("swipe delta {:.1} -> {:.3}", delta, percent);
        }
        self.pump(host, now);
        self.status()
    }

    /// Fingers lifted: close if the swipe went past halfway, otherwise ease
    /// back to the open grid.
    pub fn on_swipe_end(&mut self, host: &mut H, now: Instant) -> SessionStatus {
        if self.swipe != SwipeState::Swiping
            || matches!(self.state, SessionState::Closing | SessionState::Closed)
        {
            return self.status();
        }
        self.swipe_spent = true;

        match self.animator.end_swipe(SWIPE_COMMIT_THRESHOLD) {
            SwipeDecision::Commit => {
                info!("swipe released past threshold, closing");
                self.close(host, now)
            }
            SwipeDecision::Revert => {
                debug!("swipe released below threshold, settling to grid");
                self.swipe = SwipeState::Settling;
                self.animator.begin_timed_transition(
                    self.monitor.size,
                    Vec2::ZERO,
                    self.settings.transition,
                    TransitionEnd::SwipeReverted,
                    now,
                );
                self.status()
            }
        }
    }

    //  Host events

    /// A window was destroyed.  Its tile stays in place but draws nothing.
    pub fn on_window_closed(&mut self, host: &mut H, window: WindowId) -> SessionStatus {
        if self.state == SessionState::Closed {
            return self.status();
        }
        if let Some(id) = self.tiles.iter().position(|t| t.window == Some(window)) {
            info!("window {} closed, emptying tile {}", window, id);
            self.forget_tile(host, id);
            host.damage_monitor(&self.monitor);
        }
        self.status()
    }

    /// Focus moved to `window` behind the overview's back: close on it.
    pub fn on_focus_changed(&mut self, host: &mut H, window: WindowId, now: Instant) -> SessionStatus {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return self.status();
        }
        if let Some(id) = self.tiles.iter().position(|t| t.window == Some(window)) {
            self.opened_id = Some(id);
        }
        self.close_on_id = self.opened_id;
        self.close(host, now)
    }

    //  Teardown

    /// Release every resource the session holds.  Consumes the session.
    pub fn destroy(mut self, host: &mut H) {
        host.make_current();
        self.framebuffers.release_all(host);
        for hook in self.hooks.drain(..) {
            host.unregister_input_hook(hook);
        }
        host.unset_cursor_image();
        host.mark_blur_dirty(&self.monitor);
        host.damage_monitor(&self.monitor);
        info!("overview on {} torn down", self.monitor.name);
    }

    //  Internals

    /// Pick up a monitor resize or rescale made since the last call.
    ///
    /// The swipe endpoints follow the new size, a settled grid snaps to it
    /// and the active tile is marked for a re-render, which reallocates its
    /// storage at the new resolution.
    fn sync_monitor(&mut self, host: &mut H) {
        let current = host.monitor();
        if current == self.monitor {
            return;
        }
        info!(
            "monitor {} changed: {} @ {} -> {} @ {}",
            current.name, self.monitor.size, self.monitor.scale, current.size, current.scale
        );
        let settled = self.state == SessionState::Open && self.swipe == SwipeState::NotSwiping;
        self.monitor = current;

        let geometry = self.settled_geometry();
        let (zoomed_size, zoomed_position) = zoomed_target(&geometry, &self.monitor, self.opened_id);
        self.animator
            .set_swipe_range(swipe_range(&self.monitor, zoomed_size, zoomed_position));
        if settled {
            self.animator.warp(self.monitor.size, Vec2::ZERO);
        }
        self.damage_dirty = true;
        host.damage_monitor(&self.monitor);
        host.schedule_frame(&self.monitor);
    }

    fn settled_geometry(&self) -> GridGeometry {
        compute_geometry(
            self.tiles.len(),
            self.settings.columns,
            self.settings.gap,
            self.monitor.size,
            1.0,
        )
    }

    /// Drain animator notifications.
    fn pump(&mut self, host: &mut H, now: Instant) {
        let mut damaged = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                AnimationEvent::Updated(_) => damaged = true,
                AnimationEvent::Finished(TransitionEnd::Opened)
                | AnimationEvent::Finished(TransitionEnd::SwipeReverted) => {
                    if self.state == SessionState::Closing || self.state == SessionState::Closed {
                        continue;
                    }
                    debug!("grid settled");
                    self.state = SessionState::Open;
                    self.swipe = SwipeState::NotSwiping;
                    if let Err(e) = self.redraw_all(host, true, now) {
                        self.fail(e);
                    }
                }
                AnimationEvent::Finished(TransitionEnd::Closed) => {
                    info!("closing transition finished");
                    self.state = SessionState::Closed;
                }
            }
        }
        if damaged && self.state != SessionState::Closed {
            host.damage_monitor(&self.monitor);
            host.schedule_frame(&self.monitor);
        }
    }

    /// Framebuffer size for a tile re-render.
    fn target_resolution(&self, force_low: bool) -> Vec2 {
        let full = self.monitor.pixel_size;
        if !self.settings.low_res_previews {
            return full;
        }
        let zoomed = self.animator.size() != self.monitor.size;
        if !force_low && (zoomed || self.state == SessionState::Closing) {
            full
        } else {
            self.settled_geometry().tile_size * 2.0
        }
    }

    fn redraw_id(&mut self, host: &mut H, id: usize, force_low: bool, now: Instant) -> Result<(), CacheError> {
        let Some(window) = self.tiles.get(id).and_then(|t| t.window) else {
            return Ok(());
        };
        if !host.is_window_valid(window) {
            warn!("window {} of tile {} is no longer valid", window, id);
            self.forget_tile(host, id);
            return Ok(());
        }

        host.make_current();
        let size = self.target_resolution(force_low);
        if self.framebuffers.ensure(host, id, size, self.monitor.format)? {
            debug!("tile {} storage (re)allocated at {}", id, size);
        }
        let monitor = &self.monitor;
        self.framebuffers.render_into(host, id, monitor, |pass| {
            pass.render_window(window, monitor, now);
        });
        Ok(())
    }

    fn redraw_all(&mut self, host: &mut H, force_low: bool, now: Instant) -> Result<(), CacheError> {
        for id in 0..self.tiles.len() {
            self.redraw_id(host, id, force_low, now)?;
        }
        Ok(())
    }

    fn forget_tile(&mut self, host: &mut H, id: usize) {
        if let Some(tile) = self.tiles.get_mut(id) {
            tile.window = None;
        }
        host.make_current();
        self.framebuffers.release(host, id);
    }

    fn fail(&mut self, e: CacheError) {
        error!("{}; tearing down overview on {}", e, self.monitor.name);
        self.state = SessionState::Closed;
    }
}

impl<H: Host> Drop for OverviewSession<H> {
    fn drop(&mut self) {
        if !self.hooks.is_empty() {
            warn!(
                "overview session on {} dropped without destroy; {} input hook(s) leaked",
                self.monitor.name,
                self.hooks.len()
            );
        }
    }
}

/// Swipe endpoints: the plain grid at percent 0, zoomed in at percent 1.
fn swipe_range(monitor: &MonitorInfo, zoomed_size: Vec2, zoomed_position: Vec2) -> SwipeRange {
    SwipeRange {
        size_min: monitor.size,
        size_max: zoomed_size,
        position_min: Vec2::ZERO,
        position_max: zoomed_position,
    }
}

/// `(size, position)` that shows tile `id` full-screen.  Without a tile the
/// plain grid transform is returned.
fn zoomed_target(geometry: &GridGeometry, monitor: &MonitorInfo, id: Option<usize>) -> (Vec2, Vec2) {
    match id {
        Some(id) => (
            geometry.focused_size(monitor.size),
            geometry.focused_position(id, monitor.scale),
        ),
        None => (monitor.size, Vec2::ZERO),
    }
}

//  Tests
