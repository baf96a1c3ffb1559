//! CSS-like cubic Bézier easing curves for timed transitions.

/// A cubic Bézier easing curve with endpoints fixed at `(0,0)` and `(1,1)`.
///
/// Control points are `(x1,y1)` and `(x2,y2)`, exactly as in CSS
/// `cubic-bezier(x1, y1, x2, y2)`.  The polynomial coefficients are
/// computed once so evaluating the curve every frame stays cheap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierCurve {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl BezierCurve {
    /// CSS `ease`.
    pub fn css_ease() -> Self {
        Self::new(0.25, 0.10, 0.25, 1.00)
    }

    /// Straight line; `ease(u) == u`.
    pub fn linear() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        // B(t) = ((a*t + b)*t + c)*t with P0 = (0,0) and P3 = (1,1).
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let ax = 1.0 - cx - bx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        let ay = 1.0 - cy - by;
        Self { ax, bx, cx, ay, by, cy }
    }

    /// Map normalized time `u` (clamped to `[0,1]`) to eased progress.
    ///
    /// The result may leave `[0,1]` for curves whose `y` control points do
    /// (overshoot), but `ease(0) == 0` and `ease(1) == 1` always hold.
    pub fn ease(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        if u == 0.0 || u == 1.0 {
            return u;
        }
        let t = self.solve_t_for_x(u);
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    /// Solve `x(t) = u` for `t` in `[0,1]`.
    fn solve_t_for_x(&self, u: f64) -> f64 {
        // Newton-Raphson from a good initial guess.
        let mut t = u;
        for _ in 0..8 {
            let x = self.sample_x(t) - u;
            if x.abs() < 1e-7 {
                return t;
            }
            let dx = (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx;
            if dx.abs() < 1e-7 {
                break;
            }
            t -= x / dx;
            if !(0.0..=1.0).contains(&t) {
                break;
            }
        }

        // Bisection fallback; x(t) is monotonic for x control points in [0,1].
        let (mut lo, mut hi) = (0.0, 1.0);
        t = u;
        for _ in 0..32 {
            let x = self.sample_x(t);
            if (x - u).abs() < 1e-9 {
                break;
            }
            if x < u {
                lo = t;
            } else {
                hi = t;
            }
            t = 0.5 * (lo + hi);
        }
        t
    }
}

impl Default for BezierCurve {
    fn default() -> Self {
        BezierCurve::css_ease()
    }
}
