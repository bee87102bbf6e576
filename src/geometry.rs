//! Rectangles and ICCCM size-hint arithmetic.
//!
//! Nothing in here talks to the X server: hints arrive as the raw 32-bit
//! WM_NORMAL_HINTS words and all clamping is plain integer math, so the
//! placement rules can be exercised without a display.

// WM_NORMAL_HINTS flag bits (ICCCM 4.1.2.3)
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

/// Number of 32-bit words in a complete WM_NORMAL_HINTS property.
pub const NORMAL_HINTS_LEN: usize = 18;

/// An X window / screen position: top left corner + extent
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rectangle {
    /// Create a new Rectangle.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Rectangle {
        Rectangle { x, y, w, h }
    }

    /// Destructure this Rectangle into its component values (x, y, w, h).
    pub fn values(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.w, self.h)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    /// Area shared with `other`, zero when they do not overlap.
    pub fn intersection_area(&self, other: &Rectangle) -> i32 {
        let w = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let h = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        w.max(0) * h.max(0)
    }

    /// True if only the origin differs from `other`.
    pub fn same_size(&self, other: &Rectangle) -> bool {
        self.w == other.w && self.h == other.h
    }
}

/**
 * Size constraints advertised by a client through WM_NORMAL_HINTS.
 *
 * Values are already normalised the way placement wants them: a missing
 * base size falls back to the minimum size and vice versa, and absent limits
 * are zero.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeHints {
    pub base_w: i32,
    pub base_h: i32,
    pub inc_w: i32,
    pub inc_h: i32,
    pub max_w: i32,
    pub max_h: i32,
    pub min_w: i32,
    pub min_h: i32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl SizeHints {
    /// Decode the raw property words. A short or empty property yields
    /// unconstrained hints.
    pub fn from_raw(raw: &[u32]) -> SizeHints {
        if raw.len() < NORMAL_HINTS_LEN {
            return SizeHints::default();
        }
        let flags = raw[0];
        let word = |i: usize| raw[i] as i32;
        let mut hints = SizeHints::default();

        if flags & P_BASE_SIZE != 0 {
            hints.base_w = word(15);
            hints.base_h = word(16);
        } else if flags & P_MIN_SIZE != 0 {
            hints.base_w = word(5);
            hints.base_h = word(6);
        }
        if flags & P_RESIZE_INC != 0 {
            hints.inc_w = word(9);
            hints.inc_h = word(10);
        }
        if flags & P_MAX_SIZE != 0 {
            hints.max_w = word(7);
            hints.max_h = word(8);
        }
        if flags & P_MIN_SIZE != 0 {
            hints.min_w = word(5);
            hints.min_h = word(6);
        } else if flags & P_BASE_SIZE != 0 {
            hints.min_w = word(15);
            hints.min_h = word(16);
        }
        if flags & P_ASPECT != 0 {
            let (min_x, min_y) = (word(11), word(12));
            let (max_x, max_y) = (word(13), word(14));
            if min_x > 0 {
                hints.min_aspect = min_y as f32 / min_x as f32;
            }
            if max_y > 0 {
                hints.max_aspect = max_x as f32 / max_y as f32;
            }
        }
        hints
    }

    /// A window whose minimum and maximum sizes coincide cannot be resized.
    pub fn is_fixed(&self) -> bool {
        self.max_w != 0 && self.max_h != 0 && self.max_w == self.min_w && self.max_h == self.min_h
    }
}

/// The space a client may be placed in.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// Size of the whole X screen, used for interactive placement.
    pub screen_w: i32,
    pub screen_h: i32,
    /// Usable area of the client's monitor.
    pub area: Rectangle,
    /// Smallest width/height a client may shrink to.
    pub min_dim: i32,
}

/**
 * Clamp a requested geometry for a client currently at `current` with
 * border width `bw`.
 *
 * The window is kept reachable (inside the screen when `interact`, inside its
 * monitor's usable area otherwise) and never smaller than `min_dim`. When
 * `hints` is given the client's base/increment/aspect/min/max constraints are
 * honoured as well. Returns the adjusted rectangle and whether it differs
 * from `current`.
 */
pub fn apply_size_hints(
    requested: Rectangle,
    current: Rectangle,
    bw: i32,
    hints: Option<&SizeHints>,
    interact: bool,
    bounds: &Bounds,
) -> (Rectangle, bool) {
    let Rectangle { mut x, mut y, mut w, mut h } = requested;
    let outer_w = current.w + 2 * bw;
    let outer_h = current.h + 2 * bw;

    w = w.max(1);
    h = h.max(1);
    if interact {
        if x > bounds.screen_w {
            x = bounds.screen_w - outer_w;
        }
        if y > bounds.screen_h {
            y = bounds.screen_h - outer_h;
        }
        if x + w + 2 * bw < 0 {
            x = 0;
        }
        if y + h + 2 * bw < 0 {
            y = 0;
        }
    } else {
        let area = bounds.area;
        if x >= area.x + area.w {
            x = area.x + area.w - outer_w;
        }
        if y >= area.y + area.h {
            y = area.y + area.h - outer_h;
        }
        if x + w + 2 * bw <= area.x {
            x = area.x;
        }
        if y + h + 2 * bw <= area.y {
            y = area.y;
        }
    }
    h = h.max(bounds.min_dim);
    w = w.max(bounds.min_dim);

    if let Some(hints) = hints {
        // ICCCM 4.1.2.3: base size doubles as the minimum only when they match
        let base_is_min = hints.base_w == hints.min_w && hints.base_h == hints.min_h;
        if !base_is_min {
            w -= hints.base_w;
            h -= hints.base_h;
        }
        if hints.min_aspect > 0.0 && hints.max_aspect > 0.0 {
            if hints.max_aspect < w as f32 / h as f32 {
                w = (h as f32 * hints.max_aspect + 0.5) as i32;
            } else if hints.min_aspect < h as f32 / w as f32 {
                h = (w as f32 * hints.min_aspect + 0.5) as i32;
            }
        }
        if base_is_min {
            w -= hints.base_w;
            h -= hints.base_h;
        }
        if hints.inc_w > 0 {
            w -= w % hints.inc_w;
        }
        if hints.inc_h > 0 {
            h -= h % hints.inc_h;
        }
        w = (w + hints.base_w).max(hints.min_w);
        h = (h + hints.base_h).max(hints.min_h);
        if hints.max_w > 0 {
            w = w.min(hints.max_w);
        }
        if hints.max_h > 0 {
            h = h.min(hints.max_h);
        }
    }

    let result = Rectangle::new(x, y, w, h);
    (result, result != current)
}
