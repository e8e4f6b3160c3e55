use euclid::{Box2D, Point2D, UnknownUnit};

/// Axis-aligned rectangle in screen (or font/SDF) space.
///
/// **Y-axis goes down.** Unbounded edges are expressed with `f32::INFINITY`.
pub type Bound = Box2D<f32, UnknownUnit>;

/// Shorthand constructor from edge coordinates.
pub fn bound(x1: f32, y1: f32, x2: f32, y2: f32) -> Bound {
    Box2D::new(Point2D::new(x1, y1), Point2D::new(x2, y2))
}

/// Zero-sized rectangle at the origin.
pub fn empty_bound() -> Bound {
    bound(0.0, 0.0, 0.0, 0.0)
}

/// Intersects an optional clip with a rectangle.
///
/// `None` as the clip means "unclipped". The result is `None` when nothing
/// of `rect` survives.
pub fn clip_bound(rect: &Bound, clip: Option<&Bound>) -> Option<Bound> {
    match clip {
        Some(clip) => rect.intersection(clip),
        None if rect.is_empty() => None,
        None => Some(*rect),
    }
}

/// Divides every edge by `ratio`, mapping screen space into font space.
pub fn scale_bound(rect: &Bound, ratio: f32) -> Bound {
    bound(
        rect.min.x / ratio,
        rect.min.y / ratio,
        rect.max.x / ratio,
        rect.max.y / ratio,
    )
}

/// Visible portion of a text element, cached until a position, size or clip
/// property changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementBounds {
    /// Element rectangle intersected with its clip rect and the renderer
    /// bounds. `None` when nothing is visible.
    pub visible: Option<Bound>,
    pub valid: bool,
}

impl Default for ElementBounds {
    fn default() -> Self {
        Self {
            visible: None,
            valid: false,
        }
    }
}

impl ElementBounds {
    /// Marks the cached bounds stale.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Recomputes the visible rectangle.
    ///
    /// `element` may extend to infinity on axes the element does not
    /// constrain; the renderer bounds always cut it down to something finite.
    pub fn update(&mut self, element: &Bound, clip: Option<&Bound>, renderer: &Bound) {
        self.visible = clip_bound(element, clip).and_then(|b| b.intersection(renderer));
        self.valid = true;
    }
}
