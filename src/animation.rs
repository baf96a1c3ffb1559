//! Interpolated `size` / `position` pair driving the grid ↔ focused
//! transition.
//!
//! The overview is drawn by laying out the grid at the animated `size` and
//! shifting it by the animated `position`.  Zooming into one tile means
//! growing `size` and moving `position` together, so both channels always
//! animate in lockstep under one curve.
//!
//! Two drivers exist and only one is active at a time:
//!
//! * **timed** — [`TransitionAnimator::begin_timed_transition`] eases both
//!   channels from their current value to a target over a fixed duration,
//!   advanced by [`TransitionAnimator::tick`];
//! * **gesture** — [`TransitionAnimator::drive_by_swipe_delta`] assigns the
//!   values directly from finger travel, no easing, so the picture tracks
//!   the fingers exactly.  Starting a gesture suspends any timed transition.
//!
//! The animator never calls back into its owner.  Every value change and
//! every finished transition is reported as an [`AnimationEvent`] on an
//! [`mpsc`] channel that the owner drains when convenient.  A finished
//! transition carries the token `C` the owner passed when starting it.

use crate::command::Vec2;
use crate::config::TransitionCurve;
use crate::bezier::BezierCurve;
use log::debug;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Which animated quantity an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Size,
    Position,
}

/// Notifications from a [`TransitionAnimator`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent<C> {
    /// A channel's value changed; the owner should redraw.
    Updated(Channel),
    /// A timed transition reached its target.  Sent exactly once per
    /// [`begin_timed_transition`](TransitionAnimator::begin_timed_transition)
    /// that runs to completion.
    Finished(C),
}

/// Which driver currently owns the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationMode {
    Idle,
    Timed,
    Gesture,
}

/// Outcome of releasing a swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDecision {
    /// Far enough towards the focused window: finish closing.
    Commit,
    /// Not far enough: settle back to the open grid.
    Revert,
}

/// Endpoints of the swipe gesture.
///
/// `*_min` is the fully open grid (gesture percent `0`), `*_max` the single
/// focused window (percent `1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeRange {
    pub size_min: Vec2,
    pub size_max: Vec2,
    pub position_min: Vec2,
    pub position_max: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    start: Instant,
    duration: Duration,
    curve: BezierCurve,
}

/// One interpolated vector quantity.
#[derive(Debug)]
pub struct AnimatedVec2<C> {
    begun: Vec2,
    value: Vec2,
    goal: Vec2,
    timing: Option<Timing>,
    progress: f64,
    on_end: Option<C>,
}

impl<C> AnimatedVec2<C> {
    fn new(value: Vec2) -> Self {
        Self {
            begun: value,
            value,
            goal: value,
            timing: None,
            progress: 1.0,
            on_end: None,
        }
    }

    pub fn value(&self) -> Vec2 {
        self.value
    }

    pub fn goal(&self) -> Vec2 {
        self.goal
    }

    /// Linear time progress of the running transition in `[0, 1]`; `1.0`
    /// when idle.
    pub fn percent(&self) -> f64 {
        self.progress
    }

    pub fn is_animating(&self) -> bool {
        self.timing.is_some()
    }

    /// Jump to `value`, cancelling any running transition and its pending
    /// completion.
    fn warp(&mut self, value: Vec2) -> bool {
        let changed = self.value != value;
        self.begun = value;
        self.value = value;
        self.goal = value;
        self.timing = None;
        self.progress = 1.0;
        self.on_end = None;
        changed
    }

    fn animate_to(&mut self, goal: Vec2, timing: Timing, on_end: Option<C>) {
        self.begun = self.value;
        self.goal = goal;
        self.timing = Some(timing);
        self.progress = 0.0;
        self.on_end = on_end;
    }

    /// Advance to `now`.  Returns whether the value changed and, when the
    /// transition just finished, its completion token.
    fn tick(&mut self, now: Instant) -> (bool, Option<C>) {
        let Some(timing) = self.timing else {
            return (false, None);
        };
        let elapsed = now.saturating_duration_since(timing.start);
        let t = if timing.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / timing.duration.as_secs_f64()).min(1.0)
        };

        let before = self.value;
        self.progress = t;
        if t >= 1.0 {
            self.value = self.goal;
            self.timing = None;
            return (before != self.value, self.on_end.take());
        }
        self.value = self.begun.lerp(self.goal, timing.curve.ease(t));
        (before != self.value, None)
    }
}

/// Owns the `size` and `position` channels and decides which driver moves
/// them.
#[derive(Debug)]
pub struct TransitionAnimator<C> {
    size: AnimatedVec2<C>,
    position: AnimatedVec2<C>,
    mode: AnimationMode,
    swipe_range: Option<SwipeRange>,
    events: mpsc::Sender<AnimationEvent<C>>,
}

impl<C> TransitionAnimator<C> {
    /// Create an idle animator holding `size` and `position`.
    pub fn new(size: Vec2, position: Vec2, events: mpsc::Sender<AnimationEvent<C>>) -> Self {
        Self {
            size: AnimatedVec2::new(size),
            position: AnimatedVec2::new(position),
            mode: AnimationMode::Idle,
            swipe_range: None,
            events,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.size.value()
    }

    pub fn position(&self) -> Vec2 {
        self.position.value()
    }

    pub fn size_channel(&self) -> &AnimatedVec2<C> {
        &self.size
    }

    pub fn position_channel(&self) -> &AnimatedVec2<C> {
        &self.position
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    /// Time progress of the current transition, read from the size channel.
    pub fn percent(&self) -> f64 {
        self.size.percent()
    }

    pub fn is_animating(&self) -> bool {
        self.mode == AnimationMode::Timed
    }

    /// Set both channels immediately.  Any running transition is dropped
    /// without firing its completion.
    pub fn warp(&mut self, size: Vec2, position: Vec2) {
        let size_changed = self.size.warp(size);
        let position_changed = self.position.warp(position);
        self.mode = AnimationMode::Idle;
        self.notify(size_changed, position_changed);
    }

    /// Ease both channels to (`size`, `position`) under one curve.
    ///
    /// `on_complete` comes back as [`AnimationEvent::Finished`] exactly once
    /// when the values reach their targets, unless another `begin…`, a warp
    /// or a gesture supersedes the transition first.
    pub fn begin_timed_transition(
        &mut self,
        size: Vec2,
        position: Vec2,
        curve: TransitionCurve,
        on_complete: C,
        now: Instant,
    ) {
        let timing = Timing {
            start: now,
            duration: curve.duration,
            curve: curve.curve,
        };
        self.size.animate_to(size, timing, Some(on_complete));
        self.position.animate_to(position, timing, None);
        self.mode = AnimationMode::Timed;
        debug!("timed transition to size {} position {} over {:?}", size, position, curve.duration);
    }

    /// Advance a timed transition to `now`.  Does nothing in gesture mode.
    pub fn tick(&mut self, now: Instant) {
        if self.mode != AnimationMode::Timed {
            return;
        }
        let (size_changed, finished) = self.size.tick(now);
        let (position_changed, _) = self.position.tick(now);
        self.notify(size_changed, position_changed);

        if !self.size.is_animating() && !self.position.is_animating() {
            self.mode = AnimationMode::Idle;
        }
        if let Some(token) = finished {
            let _ = self.events.send(AnimationEvent::Finished(token));
        }
    }

    //  Gesture driver

    /// Set the endpoints the swipe interpolates between.
    pub fn set_swipe_range(&mut self, range: SwipeRange) {
        self.swipe_range = Some(range);
    }

    pub fn swipe_range(&self) -> Option<SwipeRange> {
        self.swipe_range
    }

    /// Drive both channels straight from finger travel.
    ///
    /// `percent = 1 - clamp(delta / max_delta, 0, 1)`; both channels are set
    /// to the linear interpolation of their swipe endpoints at that percent.
    /// Returns the percent, or `None` when no swipe range is set.
    pub fn drive_by_swipe_delta(&mut self, delta: f64, max_delta: f64) -> Option<f64> {
        let range = self.swipe_range?;
        let percent = swipe_percent(delta, max_delta);

        let size_changed = self.size.warp(range.size_min.lerp(range.size_max, percent));
        let position_changed = self
            .position
            .warp(range.position_min.lerp(range.position_max, percent));
        self.mode = AnimationMode::Gesture;
        self.notify(size_changed, position_changed);
        Some(percent)
    }

    /// Where the size channel sits between the swipe endpoints, measured
    /// along x: `0` is the open grid, `1` the focused window.
    pub fn swipe_position(&self) -> f64 {
        let Some(range) = self.swipe_range else {
            return 0.0;
        };
        let span = range.size_max.x - range.size_min.x;
        if span == 0.0 {
            return 0.0;
        }
        (self.size.value().x - range.size_min.x) / span
    }

    /// Decide how a released swipe settles.
    pub fn end_swipe(&self, threshold: f64) -> SwipeDecision {
        if self.swipe_position() > threshold {
            SwipeDecision::Commit
        } else {
            SwipeDecision::Revert
        }
    }

    fn notify(&self, size_changed: bool, position_changed: bool) {
        if size_changed {
            let _ = self.events.send(AnimationEvent::Updated(Channel::Size));
        }
        if position_changed {
            let _ = self.events.send(AnimationEvent::Updated(Channel::Position));
        }
    }
}

/// Default release threshold for [`TransitionAnimator::end_swipe`].
pub const SWIPE_COMMIT_THRESHOLD: f64 = 0.5;

/// `1 - clamp(delta / max_delta, 0, 1)`.
pub fn swipe_percent(delta: f64, max_delta: f64) -> f64 {
    if !(max_delta > 0.0) {
        return 0.0;
    }
    let ratio = delta / max_delta;
    if ratio.is_nan() {
        return 1.0;
    }
    1.0 - ratio.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Token {
        Done,
        Other,
    }

    const GRID: Vec2 = Vec2::new(1920.0, 1080.0);
    const ZOOMED: Vec2 = Vec2::new(5760.0, 3240.0);
    const ZOOMED_POS: Vec2 = Vec2::new(-1920.0, -1080.0);

    fn curve(ms: u64) -> TransitionCurve {
        TransitionCurve {
            duration: Duration::from_millis(ms),
            curve: BezierCurve::css_ease(),
        }
    }

    fn range() -> SwipeRange {
        SwipeRange {
            size_min: GRID,
            size_max: ZOOMED,
            position_min: Vec2::ZERO,
            position_max: ZOOMED_POS,
        }
    }

    fn animator() -> (TransitionAnimator<Token>, mpsc::Receiver<AnimationEvent<Token>>) {
        let (tx, rx) = mpsc::channel();
        (TransitionAnimator::new(ZOOMED, ZOOMED_POS, tx), rx)
    }

    fn finished(rx: &mpsc::Receiver<AnimationEvent<Token>>) -> Vec<Token> {
        rx.try_iter()
            .filter_map(|e| match e {
                AnimationEvent::Finished(t) => Some(t),
                AnimationEvent::Updated(_) => None,
            })
            .collect()
    }

    #[test]
    fn timed_transition_reaches_target_and_completes_once() {
        let (mut a, rx) = animator();
        let t0 = Instant::now();
        a.begin_timed_transition(GRID, Vec2::ZERO, curve(100), Token::Done, t0);
        assert_eq!(a.mode(), AnimationMode::Timed);
        assert!(a.is_animating());
        assert_eq!(a.size_channel().goal(), GRID);
        assert_eq!(a.position_channel().goal(), Vec2::ZERO);

        a.tick(t0 + Duration::from_millis(50));
        assert!(a.size().x < ZOOMED.x && a.size().x > GRID.x);
        assert!(finished(&rx).is_empty());

        a.tick(t0 + Duration::from_millis(100));
        assert_eq!(a.size(), GRID);
        assert_eq!(a.position(), Vec2::ZERO);
        assert_eq!(a.mode(), AnimationMode::Idle);
        assert!(!a.is_animating());
        assert_eq!(finished(&rx), vec![Token::Done]);

        a.tick(t0 + Duration::from_millis(500));
        assert!(finished(&rx).is_empty(), "completion must fire only once");
    }

    #[test]
    fn channels_move_in_lockstep() {
        let (mut a, _rx) = animator();
        let t0 = Instant::now();
        a.begin_timed_transition(GRID, Vec2::ZERO, curve(400), Token::Done, t0);
        for ms in [40, 120, 250, 399] {
            a.tick(t0 + Duration::from_millis(ms));
            let size_progress = (ZOOMED.x - a.size().x) / (ZOOMED.x - GRID.x);
            let pos_progress = (a.position().x - ZOOMED_POS.x) / (0.0 - ZOOMED_POS.x);
            assert!((size_progress - pos_progress).abs() < 1e-9, "drift at {} ms", ms);
            assert_eq!(a.size_channel().percent(), a.position_channel().percent());
        }
    }

    #[test]
    fn percent_is_linear_time_progress() {
        let (mut a, _rx) = animator();
        let t0 = Instant::now();
        assert_eq!(a.percent(), 1.0);
        a.begin_timed_transition(GRID, Vec2::ZERO, curve(200), Token::Done, t0);
        assert_eq!(a.percent(), 0.0);
        a.tick(t0 + Duration::from_millis(50));
        assert!((a.percent() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn superseded_transition_never_completes() {
        let (mut a, rx) = animator();
        let t0 = Instant::now();
        a.begin_timed_transition(GRID, Vec2::ZERO, curve(100), Token::Other, t0);
        a.begin_timed_transition(ZOOMED, ZOOMED_POS, curve(100), Token::Done, t0);
        a.tick(t0 + Duration::from_millis(200));
        assert_eq!(finished(&rx), vec![Token::Done]);
    }

    #[test]
    fn every_mutation_notifies() {
        let (mut a, rx) = animator();
        a.warp(GRID, Vec2::ZERO);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                AnimationEvent::Updated(Channel::Size),
                AnimationEvent::Updated(Channel::Position)
            ]
        );
    }

    #[test]
    fn swipe_percent_is_monotonic() {
        let mut last = f64::INFINITY;
        for i in 0..=300 {
            let p = swipe_percent(i as f64, 300.0);
            assert!(p <= last);
            last = p;
        }
        assert_eq!(swipe_percent(0.0, 300.0), 1.0);
        assert_eq!(swipe_percent(300.0, 300.0), 0.0);
        assert_eq!(swipe_percent(-10.0, 300.0), 1.0);
        assert_eq!(swipe_percent(900.0, 300.0), 0.0);
    }

    #[test]
    fn swipe_assigns_values_directly() {
        let (mut a, _rx) = animator();
        a.set_swipe_range(range());
        assert_eq!(a.swipe_range().map(|r| r.size_max), Some(ZOOMED));
        let p = a.drive_by_swipe_delta(150.0, 300.0).unwrap();
        assert_eq!(p, 0.5);
        assert_eq!(a.size(), GRID.lerp(ZOOMED, 0.5));
        assert_eq!(a.position(), Vec2::ZERO.lerp(ZOOMED_POS, 0.5));
        assert_eq!(a.mode(), AnimationMode::Gesture);
    }

    #[test]
    fn swipe_suspends_timed_transition() {
        let (mut a, rx) = animator();
        let t0 = Instant::now();
        a.set_swipe_range(range());
        a.begin_timed_transition(GRID, Vec2::ZERO, curve(100), Token::Done, t0);
        a.drive_by_swipe_delta(30.0, 300.0);
        let held = a.size();
        a.tick(t0 + Duration::from_millis(500));
        assert_eq!(a.size(), held, "gesture mode must ignore ticks");
        assert!(finished(&rx).is_empty());
    }

    #[test]
    fn release_below_threshold_reverts() {
        let (mut a, _rx) = animator();
        a.set_swipe_range(range());
        a.drive_by_swipe_delta(0.6 * 300.0, 300.0);
        assert!((a.swipe_position() - 0.4).abs() < 1e-9);
        assert_eq!(a.end_swipe(SWIPE_COMMIT_THRESHOLD), SwipeDecision::Revert);
    }

    #[test]
    fn release_above_threshold_commits() {
        let (mut a, _rx) = animator();
        a.set_swipe_range(range());
        a.drive_by_swipe_delta(0.2 * 300.0, 300.0);
        assert_eq!(a.end_swipe(SWIPE_COMMIT_THRESHOLD), SwipeDecision::Commit);
    }

    #[test]
    fn swipe_without_range_is_ignored() {
        let (mut a, _rx) = animator();
        assert!(a.swipe_range().is_none());
        assert_eq!(a.drive_by_swipe_delta(10.0, 300.0), None);
        assert_eq!(a.size(), ZOOMED);
    }
}
