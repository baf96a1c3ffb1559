//! Owner of the (at most one) live overview session.
//!
//! The host keeps one [`OverviewManager`] for its whole lifetime and routes
//! every overview-related callback through it.  While no session is open
//! each hook is a cheap no-op.  When a session reports
//! [`SessionStatus::Closed`] the manager destroys it on the spot, so a
//! finished session is never referenced again.

use crate::command::{Command, InputKind, Vec2, WindowId};
use crate::config::Settings;
use crate::gestures::SwipeTracker;
use crate::session::{OverviewSession, SessionStatus};
use crate::traits::{Compositor, Host};
use log::{debug, info, warn};
use std::time::Instant;

/// Explicit registry for the active [`OverviewSession`].
pub struct OverviewManager<H: Host> {
    settings: Settings,
    session: Option<OverviewSession<H>>,
    swipe: SwipeTracker,
}

impl<H: Host> OverviewManager<H> {
    pub fn new(settings: Settings) -> Self {
        Self {
            swipe: SwipeTracker::new(settings.gestures.clone()),
            settings,
            session: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&OverviewSession<H>> {
        self.session.as_ref()
    }

    /// Open an overview.  Ignored while one is already open.  Returns
    /// whether a session was started.
    pub fn open(
        &mut self,
        host: &mut H,
        started_on: Option<WindowId>,
        via_swipe: bool,
        now: Instant,
    ) -> bool {
        if self.session.is_some() {
            debug!("overview already open");
            return false;
        }
        let session = OverviewSession::open(host, self.settings.clone(), started_on, via_swipe, now);
        let status = session.status();
        self.session = Some(session);
        self.settle(host, status);
        self.session.is_some()
    }

    /// Close the open overview, or open one if none is open.
    pub fn toggle(&mut self, host: &mut H, now: Instant) {
        if self.session.is_some() {
            self.close(host, now);
        } else {
            self.open(host, None, false, now);
        }
    }

    pub fn close(&mut self, host: &mut H, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.close(host, now);
        self.settle(host, status);
    }

    pub fn select_hovered(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.select_hovered();
        }
    }

    pub fn render(&mut self, host: &mut H) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.render(host);
        self.settle(host, status);
    }

    pub fn on_pre_render(&mut self, host: &mut H, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_pre_render(host, now);
        self.settle(host, status);
    }

    pub fn on_damage_reported(&mut self, host: &mut H) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_damage_reported(host);
        self.settle(host, status);
    }

    /// Offer an intercepted input event to the overview.  Returns whether
    /// it was consumed.
    pub fn on_input(&mut self, host: &mut H, kind: InputKind, now: Instant) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let (consumed, status) = session.on_input(host, kind, now);
        self.settle(host, status);
        consumed
    }

    /// A multi-finger swipe started.  Opens an overview via swipe when the
    /// finger count matches and none is open yet.
    pub fn on_swipe_begin(&mut self, host: &mut H, fingers: u32, now: Instant) -> bool {
        if self.session.is_some() {
            debug!("swipe ignored, overview already open");
            return false;
        }
        if !self.swipe.begin(fingers) {
            return false;
        }
        if !self.open(host, None, true, now) {
            self.swipe.reset();
            return false;
        }
        true
    }

    pub fn on_swipe_update(&mut self, host: &mut H, dy: f64, now: Instant) {
        let Some(delta) = self.swipe.update(dy) else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_swipe_update(host, delta, now);
        self.settle(host, status);
    }

    pub fn on_swipe_end(&mut self, host: &mut H, now: Instant) {
        if !self.swipe.end() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_swipe_end(host, now);
        self.settle(host, status);
    }

    pub fn on_window_closed(&mut self, host: &mut H, window: WindowId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_window_closed(host, window);
        self.settle(host, status);
    }

    pub fn on_focus_changed(&mut self, host: &mut H, window: WindowId, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.on_focus_changed(host, window, now);
        self.settle(host, status);
    }

    /// Advance animations.  Called once per frame before rendering.
    pub fn tick(&mut self, host: &mut H, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let status = session.tick(host, now);
        self.settle(host, status);
    }

    /// Dispatch a [`Command`].
    pub fn apply(&mut self, host: &mut H, cmd: Command, now: Instant) {
        debug!("applying {:?}", cmd);
        match cmd {
            Command::Open { via_swipe } => {
                self.open(host, None, via_swipe, now);
            }
            Command::Toggle => self.toggle(host, now),
            Command::Close => self.close(host, now),
            Command::SelectHovered => self.select_hovered(),
            Command::PointerMove { x, y } => {
                if let Err(e) = Compositor::warp_pointer(host, Vec2::new(x, y)) {
                    warn!("failed to move pointer: {}", e);
                }
                self.on_input(host, InputKind::MouseMove, now);
            }
            Command::Select => {
                self.on_input(host, InputKind::MouseButton, now);
            }
            Command::SwipeBegin { fingers } => {
                self.on_swipe_begin(host, fingers, now);
            }
            Command::SwipeUpdate { dy } => self.on_swipe_update(host, dy, now),
            Command::SwipeEnd => self.on_swipe_end(host, now),
            Command::WindowClosed(window) => self.on_window_closed(host, window),
            Command::FocusChanged(window) => self.on_focus_changed(host, window, now),
        }
    }

    /// Tear down any open session immediately, e.g. when the host exits.
    pub fn shutdown(&mut self, host: &mut H) {
        if let Some(session) = self.session.take() {
            info!("shutting down open overview");
            session.destroy(host);
        }
        self.swipe.reset();
    }

    fn settle(&mut self, host: &mut H, status: SessionStatus) {
        if status != SessionStatus::Closed {
            return;
        }
        if let Some(session) = self.session.take() {
            session.destroy(host);
        }
        self.swipe.reset();
    }
}

impl<H: Host> Drop for OverviewManager<H> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("overview manager dropped with a session still open; call shutdown first");
        }
    }
}

//  Tests
