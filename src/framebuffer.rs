//! Per-tile off-screen render targets.
//!
//! [`TileFramebufferCache`] keeps at most one framebuffer per tile and is
//! the only place the overview binds a non-default render target.  Binding
//! goes through a [`RenderPass`] guard whose `Drop` ends the pass, so a
//! begin is always paired with an end, whatever path the render closure
//! takes out.
//!
//! The cache cannot free GPU memory on its own (that needs the host's
//! renderer), so the owner must call [`TileFramebufferCache::release_all`]
//! before dropping it.  Dropping a cache with live allocations logs a
//! warning.

use crate::command::{Color, MonitorInfo, PixelFormat, Vec2, WindowId};
use crate::traits::Renderer;
use log::{debug, warn};
use std::time::Instant;

/// Failure to back a tile with storage.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("framebuffer allocation for tile {tile} at {size} failed: {message}")]
    Alloc {
        tile: usize,
        size: Vec2,
        message: String,
    },
}

/// An active off-screen pass.  Ends the pass when dropped.
pub struct RenderPass<'a, R: Renderer> {
    renderer: &'a mut R,
}

impl<'a, R: Renderer> RenderPass<'a, R> {
    fn begin(renderer: &'a mut R, monitor: &MonitorInfo, framebuffer: &mut R::Framebuffer) -> Self {
        renderer.begin_offscreen(monitor, framebuffer);
        Self { renderer }
    }

    pub fn clear(&mut self, color: Color) {
        self.renderer.clear(color);
    }

    /// Draw `window`'s current content into the bound framebuffer.
    pub fn render_window(&mut self, window: WindowId, monitor: &MonitorInfo, now: Instant) {
        self.renderer.render_window(window, monitor, now);
    }
}

impl<R: Renderer> Drop for RenderPass<'_, R> {
    fn drop(&mut self) {
        self.renderer.end_offscreen();
    }
}

struct Slot<F> {
    framebuffer: F,
    size: Vec2,
    format: PixelFormat,
}

/// One optional framebuffer per tile, indexed by tile.
pub struct TileFramebufferCache<F> {
    slots: Vec<Option<Slot<F>>>,
}

impl<F> TileFramebufferCache<F> {
    /// An empty cache for `tiles` tiles; nothing is allocated yet.
    pub fn new(tiles: usize) -> Self {
        Self {
            slots: (0..tiles).map(|_| None).collect(),
        }
    }

    /// Number of tiles the cache covers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Framebuffer of `tile`, if allocated.
    pub fn get(&self, tile: usize) -> Option<&F> {
        self.slots.get(tile)?.as_ref().map(|s| &s.framebuffer)
    }

    /// Allocated size of `tile`'s framebuffer.
    pub fn size_of(&self, tile: usize) -> Option<Vec2> {
        self.slots.get(tile)?.as_ref().map(|s| s.size)
    }

    /// Number of framebuffers currently allocated.
    pub fn live_allocations(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Make sure `tile` has a framebuffer of exactly `size` and `format`.
    ///
    /// Returns `Ok(true)` when a (re)allocation happened; the framebuffer's
    /// previous contents are gone in that case.  On resize the old storage
    /// is released before the new one is allocated.  On failure the tile is
    /// left without storage.
    pub fn ensure<R>(
        &mut self,
        renderer: &mut R,
        tile: usize,
        size: Vec2,
        format: PixelFormat,
    ) -> Result<bool, CacheError>
    where
        R: Renderer<Framebuffer = F>,
    {
        let Some(slot) = self.slots.get_mut(tile) else {
            return Ok(false);
        };
        if let Some(existing) = slot {
            if existing.size == size && existing.format == format {
                return Ok(false);
            }
            debug!("tile {}: resizing framebuffer {} -> {}", tile, existing.size, size);
        }
        if let Some(old) = slot.take() {
            renderer.release_framebuffer(old.framebuffer);
        }

        let framebuffer = renderer
            .alloc_framebuffer(size, format)
            .map_err(|e| CacheError::Alloc {
                tile,
                size,
                message: e.to_string(),
            })?;
        *slot = Some(Slot {
            framebuffer,
            size,
            format,
        });
        Ok(true)
    }

    /// Run `draw` inside an off-screen pass bound to `tile`'s framebuffer,
    /// after clearing it to transparent.
    ///
    /// Returns `false` (and draws nothing) when the tile has no storage.
    pub fn render_into<R, D>(
        &mut self,
        renderer: &mut R,
        tile: usize,
        monitor: &MonitorInfo,
        draw: D,
    ) -> bool
    where
        R: Renderer<Framebuffer = F>,
        D: FnOnce(&mut RenderPass<'_, R>),
    {
        let Some(Some(slot)) = self.slots.get_mut(tile) else {
            return false;
        };
        let mut pass = RenderPass::begin(renderer, monitor, &mut slot.framebuffer);
        pass.clear(Color::TRANSPARENT);
        draw(&mut pass);
        true
    }

    /// Free `tile`'s framebuffer, if any.
    pub fn release<R>(&mut self, renderer: &mut R, tile: usize)
    where
        R: Renderer<Framebuffer = F>,
    {
        if let Some(slot) = self.slots.get_mut(tile).and_then(Option::take) {
            renderer.release_framebuffer(slot.framebuffer);
        }
    }

    /// Free every framebuffer.  The cache keeps its tile count.
    pub fn release_all<R>(&mut self, renderer: &mut R)
    where
        R: Renderer<Framebuffer = F>,
    {
        for tile in 0..self.slots.len() {
            self.release(renderer, tile);
        }
    }
}

impl<F> Drop for TileFramebufferCache<F> {
    fn drop(&mut self) {
        let live = self.live_allocations();
        if live > 0 {
            warn!("framebuffer cache dropped with {} live allocation(s); GPU memory leaked", live);
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Alloc(u32, Vec2),
        Release(u32),
        Begin(u32),
        Clear(Color),
        Window(WindowId),
        End,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("out of memory")]
    struct Oom;

    #[derive(Default)]
    struct RecordingRenderer {
        next_id: u32,
        log: Vec<Call>,
        fail_allocs: bool,
    }

    impl RecordingRenderer {
        fn live(&self) -> i64 {
            self.log
                .iter()
                .map(|c| match c {
                    Call::Alloc(..) => 1,
                    Call::Release(_) => -1,
                    _ => 0,
                })
                .sum()
        }
    }

    impl Renderer for RecordingRenderer {
        type Framebuffer = u32;
        type Error = Oom;

        fn make_current(&mut self) {}

        fn alloc_framebuffer(&mut self, size: Vec2, _: PixelFormat) -> Result<u32, Oom> {
            if self.fail_allocs {
                return Err(Oom);
            }
            self.next_id += 1;
            self.log.push(Call::Alloc(self.next_id, size));
            Ok(self.next_id)
        }

        fn release_framebuffer(&mut self, fb: u32) {
            self.log.push(Call::Release(fb));
        }

        fn begin_offscreen(&mut self, _: &MonitorInfo, fb: &mut u32) {
            self.log.push(Call::Begin(*fb));
        }

        fn clear(&mut self, color: Color) {
            self.log.push(Call::Clear(color));
        }

        fn render_window(&mut self, window: WindowId, _: &MonitorInfo, _: Instant) {
            self.log.push(Call::Window(window));
        }

        fn end_offscreen(&mut self) {
            self.log.push(Call::End);
        }

        fn draw_framebuffer(&mut self, _: &u32, _: crate::command::Rect) {}

        fn mark_blur_dirty(&mut self, _: &MonitorInfo) {}
    }

    fn monitor() -> MonitorInfo {
        MonitorInfo {
            name: "TEST-1".into(),
            position: Vec2::ZERO,
            size: Vec2::new(1920.0, 1080.0),
            pixel_size: Vec2::new(1920.0, 1080.0),
            scale: 1.0,
            format: PixelFormat::XRGB8888,
        }
    }

    const FULL: Vec2 = Vec2::new(1920.0, 1080.0);
    const LOW: Vec2 = Vec2::new(1280.0, 720.0);

    #[test]
    fn ensure_allocates_once_per_size() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(2);
        assert!(cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap());
        assert!(!cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap());
        assert_eq!(cache.live_allocations(), 1);
        assert_eq!(cache.size_of(0), Some(FULL));
        cache.release_all(&mut r);
    }

    #[test]
    fn resize_releases_before_allocating() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(1);
        cache.ensure(&mut r, 0, LOW, PixelFormat::XRGB8888).unwrap();
        cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap();
        assert_eq!(
            r.log,
            vec![Call::Alloc(1, LOW), Call::Release(1), Call::Alloc(2, FULL)]
        );
        assert_eq!(cache.live_allocations(), 1);
        cache.release_all(&mut r);
        assert_eq!(r.live(), 0);
    }

    #[test]
    fn failed_allocation_leaves_tile_empty() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(1);
        cache.ensure(&mut r, 0, LOW, PixelFormat::XRGB8888).unwrap();
        r.fail_allocs = true;
        let err = cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap_err();
        assert!(matches!(err, CacheError::Alloc { tile: 0, .. }));
        assert_eq!(cache.live_allocations(), 0);
        assert_eq!(r.live(), 0, "old storage must still be released");
    }

    #[test]
    fn render_into_clears_and_pairs_begin_end() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(1);
        cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap();
        r.log.clear();

        let m = monitor();
        let drawn = cache.render_into(&mut r, 0, &m, |pass| {
            pass.render_window(WindowId(9), &m, Instant::now());
        });
        assert!(drawn);
        assert_eq!(
            r.log,
            vec![Call::Begin(1), Call::Clear(Color::TRANSPARENT), Call::Window(WindowId(9)), Call::End]
        );
        cache.release_all(&mut r);
    }

    #[test]
    fn render_pass_ends_even_when_draw_panics() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(1);
        cache.ensure(&mut r, 0, FULL, PixelFormat::XRGB8888).unwrap();
        let m = monitor();

        let result = catch_unwind(AssertUnwindSafe(|| {
            cache.render_into(&mut r, 0, &m, |_| panic!("window vanished"));
        }));
        assert!(result.is_err());
        assert_eq!(r.log.last(), Some(&Call::End));
        cache.release_all(&mut r);
    }

    #[test]
    fn render_into_without_storage_does_nothing() {
        let mut r = RecordingRenderer::default();
        let mut cache: TileFramebufferCache<u32> = TileFramebufferCache::new(3);
        let m = monitor();
        assert!(!cache.render_into(&mut r, 1, &m, |_| unreachable!()));
        assert!(!cache.render_into(&mut r, 7, &m, |_| unreachable!()));
        assert!(r.log.is_empty());
    }

    #[test]
    fn release_all_frees_everything() {
        let mut r = RecordingRenderer::default();
        let mut cache = TileFramebufferCache::new(4);
        for tile in 0..4 {
            cache.ensure(&mut r, tile, LOW, PixelFormat::XRGB8888).unwrap();
        }
        assert_eq!(cache.live_allocations(), 4);
        cache.release_all(&mut r);
        assert_eq!(cache.live_allocations(), 0);
        assert_eq!(r.live(), 0);
        assert_eq!(cache.len(), 4);
    }
}
