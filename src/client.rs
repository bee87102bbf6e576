use xcb::Window;

use crate::geometry::{Rectangle, SizeHints};

/// Title given to windows that report none.
pub const BROKEN: &str = "broken";

/**
 * Meta-data around a client window that we are handling.
 *
 * Primarily state flags and information used when determining which clients
 * to show for a given monitor and how they are placed. Which monitor owns
 * the client is recorded as an index into the window manager's monitor list;
 * the monitor itself keeps the list and stack orderings.
 */
#[derive(Debug, PartialEq, Clone)]
pub struct Client {
    id: Window,
    pub(crate) name: String,
    pub(crate) class: String,
    pub(crate) instance: String,
    /// Current geometry, border excluded.
    pub(crate) geom: Rectangle,
    /// Geometry to return to when leaving fullscreen.
    pub(crate) old_geom: Rectangle,
    pub(crate) bw: i32,
    pub(crate) old_bw: i32,
    pub(crate) hints: SizeHints,
    /// Cleared whenever WM_NORMAL_HINTS changes; hints are re-read on next use.
    pub(crate) hints_valid: bool,
    pub(crate) tags: u32,
    pub(crate) mon: usize,
    // state flags
    pub(crate) fixed: bool,
    pub(crate) floating: bool,
    pub(crate) urgent: bool,
    pub(crate) never_focus: bool,
    pub(crate) fullscreen: bool,
    /// Floating state from before fullscreen was entered.
    pub(crate) old_state: bool,
}

impl Client {
    /// Track a new client window placed at `geom` with border width `bw`.
    pub fn new(id: Window, geom: Rectangle, bw: i32, mon: usize) -> Client {
        Client {
            id,
            name: String::new(),
            class: BROKEN.to_string(),
            instance: BROKEN.to_string(),
            geom,
            old_geom: geom,
            bw,
            old_bw: bw,
            hints: SizeHints::default(),
            hints_valid: false,
            tags: 0,
            mon,
            fixed: false,
            floating: false,
            urgent: false,
            never_focus: false,
            fullscreen: false,
            old_state: false,
        }
    }

    /// The X window ID of this client
    pub fn id(&self) -> Window {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class part of WM_CLASS
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The instance part of WM_CLASS
    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn tags(&self) -> u32 {
        self.tags
    }

    pub fn monitor(&self) -> usize {
        self.mon
    }

    pub fn geometry(&self) -> Rectangle {
        self.geom
    }

    pub fn is_floating(&self) -> bool {
        self.floating
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    /// Outer width, borders included.
    pub fn width(&self) -> i32 {
        self.geom.w + 2 * self.bw
    }

    /// Outer height, borders included.
    pub fn height(&self) -> i32 {
        self.geom.h + 2 * self.bw
    }

    /// Name used when announcing this client: the instance, or the class for
    /// windows without one.
    pub fn app_name(&self) -> &str {
        if self.instance == BROKEN {
            &self.class
        } else {
            &self.instance
        }
    }
}
