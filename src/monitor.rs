use std::collections::VecDeque;

use xcb::Window;

use crate::geometry::Rectangle;

/// How a monitor positions its tiled clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Every visible tiled client fills the usable area.
    Monocle,
    /// Clients keep whatever geometry they ask for.
    Floating,
}

impl Layout {
    pub fn symbol(&self) -> &'static str {
        match self {
            Layout::Monocle => "[M]",
            Layout::Floating => "><>",
        }
    }

    /// False for the floating layout, which leaves geometry to the clients.
    pub fn arranges(&self) -> bool {
        *self != Layout::Floating
    }
}

/**
 * One display area and its tag-view state.
 *
 * A monitor owns two independent orderings of the windows assigned to it:
 * the client list (insertion order, newest first) used for layout and
 * focus cycling, and the stack (most recently focused first) used for
 * focus fallback and Z-order. Both must be maintained explicitly.
 */
#[derive(Debug, Clone)]
pub struct Monitor {
    num: usize,
    /// Full geometry of the output.
    pub(crate) screen: Rectangle,
    /// Geometry left for clients once the bar is accounted for.
    pub(crate) area: Rectangle,
    pub(crate) seltags: usize,
    pub(crate) tagset: [u32; 2],
    pub(crate) sellt: usize,
    pub(crate) layouts: [Layout; 2],
    pub(crate) sel: Option<Window>,
    clients: VecDeque<Window>,
    stack: VecDeque<Window>,
}

impl Monitor {
    pub fn new(num: usize, screen: Rectangle, layouts: [Layout; 2]) -> Monitor {
        Monitor {
            num,
            screen,
            area: screen,
            seltags: 0,
            tagset: [1, 1],
            sellt: 0,
            layouts,
            sel: None,
            clients: VecDeque::new(),
            stack: VecDeque::new(),
        }
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn screen(&self) -> Rectangle {
        self.screen
    }

    pub fn area(&self) -> Rectangle {
        self.area
    }

    pub fn selected(&self) -> Option<Window> {
        self.sel
    }

    /// The tag mask currently on display.
    pub fn view(&self) -> u32 {
        self.tagset[self.seltags]
    }

    pub fn layout(&self) -> Layout {
        self.layouts[self.sellt]
    }

    /// Recompute the usable area, reserving `bar_height` at the top or bottom
    /// when a bar is shown.
    pub fn update_area(&mut self, show_bar: bool, top_bar: bool, bar_height: i32) {
        self.area = self.screen;
        if show_bar {
            self.area.h -= bar_height;
            if top_bar {
                self.area.y += bar_height;
            }
        }
    }

    /// Client list, newest first.
    pub fn clients(&self) -> impl Iterator<Item = &Window> {
        self.clients.iter()
    }

    /// Focus stack, most recently focused first.
    pub fn stack(&self) -> impl Iterator<Item = &Window> {
        self.stack.iter()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn has_client(&self, win: Window) -> bool {
        self.clients.contains(&win)
    }

    pub fn in_stack(&self, win: Window) -> bool {
        self.stack.contains(&win)
    }

    pub fn attach(&mut self, win: Window) {
        self.clients.push_front(win);
    }

    pub fn detach(&mut self, win: Window) -> bool {
        match self.clients.iter().position(|&w| w == win) {
            Some(i) => {
                self.clients.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn attach_stack(&mut self, win: Window) {
        self.stack.push_front(win);
    }

    /// Remove `win` from the stack, clearing the selection if it pointed at it.
    pub fn detach_stack(&mut self, win: Window) -> bool {
        match self.stack.iter().position(|&w| w == win) {
            Some(i) => {
                self.stack.remove(i);
                if self.sel == Some(win) {
                    self.sel = None;
                }
                true
            }
            None => false,
        }
    }

    /// Move `win` to the top of the stack.
    pub fn raise_in_stack(&mut self, win: Window) {
        self.detach_stack_keep_sel(win);
        self.stack.push_front(win);
    }

    fn detach_stack_keep_sel(&mut self, win: Window) {
        if let Some(i) = self.stack.iter().position(|&w| w == win) {
            self.stack.remove(i);
        }
    }
}
