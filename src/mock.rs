//! An in-memory display server for exercising the window manager without X.
use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
};

use xcb::Window;

use crate::{
    bindings::ModMask,
    geometry::Rectangle,
    keysym::Keysym,
    spawn::Spawner,
    xconnection::{
        ConfigureRequest, TextProperty, WindowAttributes, WmHints, WmProtocol, WmState, XConn,
        XError, XEvent, XcbKey,
    },
};

pub const ROOT: Window = 1;
pub const NUMLOCK: ModMask = xcb::MOD_MASK_2 as ModMask;

/// Requests worth asserting on.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Configure(Window, Rectangle, i32),
    ConfigureUnmanaged(ConfigureRequest),
    SyntheticNotify(Window, Rectangle, i32),
    Move(Window, i32, i32),
    Raise(Window),
    Lower(Window),
    Map(Window),
    Protocol(Window, WmProtocol),
    Kill(Window),
}

#[derive(Debug, Clone, Default)]
pub struct MockWindow {
    pub class: Option<(String, String)>,
    pub title: Option<String>,
    pub geom: Rectangle,
    pub bw: i32,
    pub override_redirect: bool,
    pub viewable: bool,
    pub normal_hints: Vec<u32>,
    pub hints: Option<WmHints>,
    pub transient_for: Option<Window>,
    pub dialog: bool,
    pub fullscreen: bool,
    pub protocols: Vec<WmProtocol>,
    pub wm_state: Option<WmState>,
    pub border_color: Option<u32>,
    pub watched: bool,
    pub command: Option<String>,
    pub state: Option<String>,
}

pub struct MockXConn {
    screen: Cell<(i32, i32)>,
    monitors: RefCell<Vec<Rectangle>>,
    windows: RefCell<HashMap<Window, MockWindow>>,
    events: RefCell<VecDeque<XEvent>>,
    calls: RefCell<Vec<Call>>,
    focused: Cell<Option<Window>>,
    grabs: RefCell<Vec<(u16, u8)>>,
    keymap: RefCell<Vec<Keysym>>,
    client_list: RefCell<Vec<Window>>,
    pointer: Cell<Option<(i32, i32)>>,
    other_wm: Cell<bool>,
}

impl MockXConn {
    pub fn new(monitors: Vec<Rectangle>) -> MockXConn {
        let w = monitors.iter().map(|r| r.x + r.w).max().unwrap_or(0);
        let h = monitors.iter().map(|r| r.y + r.h).max().unwrap_or(0);
        MockXConn {
            screen: Cell::new((w, h)),
            monitors: RefCell::new(monitors),
            windows: RefCell::new(HashMap::new()),
            events: RefCell::new(VecDeque::new()),
            calls: RefCell::new(Vec::new()),
            focused: Cell::new(None),
            grabs: RefCell::new(Vec::new()),
            keymap: RefCell::new(Vec::new()),
            client_list: RefCell::new(Vec::new()),
            pointer: Cell::new(None),
            other_wm: Cell::new(false),
        }
    }

    pub fn single() -> MockXConn {
        MockXConn::new(vec![Rectangle::new(0, 0, 1920, 1080)])
    }

    pub fn dual() -> MockXConn {
        MockXConn::new(vec![Rectangle::new(0, 0, 1920, 1080), Rectangle::new(1920, 0, 1280, 1024)])
    }

    /// Register a window the way a client would before mapping it.
    pub fn add_window(&self, win: Window, class: &str, instance: &str) {
        let w = MockWindow {
            class: Some((class.to_string(), instance.to_string())),
            title: Some(format!("{} window", instance)),
            geom: Rectangle::new(10, 10, 640, 480),
            protocols: vec![WmProtocol::DeleteWindow],
            ..MockWindow::default()
        };
        self.windows.borrow_mut().insert(win, w);
    }

    pub fn update<F: FnOnce(&mut MockWindow)>(&self, win: Window, f: F) {
        if let Some(w) = self.windows.borrow_mut().get_mut(&win) {
            f(w);
        }
    }

    pub fn window(&self, win: Window) -> MockWindow {
        self.windows.borrow().get(&win).cloned().unwrap_or_default()
    }

    pub fn geometry(&self, win: Window) -> Rectangle {
        self.window(win).geom
    }

    pub fn set_screen(&self, monitors: Vec<Rectangle>, size: (i32, i32)) {
        *self.monitors.borrow_mut() = monitors;
        self.screen.set(size);
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.pointer.set(Some((x, y)));
    }

    pub fn claim_by_other_wm(&self) {
        self.other_wm.set(true);
    }

    pub fn push_event(&self, event: XEvent) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn focused(&self) -> Option<Window> {
        self.focused.get()
    }

    pub fn grabs(&self) -> Vec<(u16, u8)> {
        self.grabs.borrow().clone()
    }

    pub fn client_list(&self) -> Vec<Window> {
        self.client_list.borrow().clone()
    }

    /// A key press for `sym` with raw modifier state `mods`.
    pub fn key_press(&self, mods: ModMask, sym: Keysym) -> XEvent {
        let code = self.keycodes_for(sym).first().copied().unwrap_or(0);
        XEvent::KeyPress {
            key: XcbKey { mod_mask: mods, code },
        }
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl XConn for MockXConn {
    fn root(&self) -> Window {
        ROOT
    }

    fn screen_size(&self) -> (i32, i32) {
        self.screen.get()
    }

    fn monitor_geometries(&self) -> Vec<Rectangle> {
        self.monitors.borrow().clone()
    }

    fn become_wm(&self) -> Result<(), XError> {
        if self.other_wm.get() {
            Err(XError::OtherWmRunning)
        } else {
            Ok(())
        }
    }

    fn cleanup(&self) {
        self.grabs.borrow_mut().clear();
        self.focused.set(None);
    }

    fn flush(&self) {}

    fn wait_for_event(&self) -> Result<XEvent, XError> {
        self.events.borrow_mut().pop_front().ok_or(XError::ConnectionClosed)
    }

    fn drop_enter_events(&self) {
        self.events
            .borrow_mut()
            .retain(|e| !matches!(e, XEvent::EnterNotify { .. }));
    }

    fn query_tree(&self) -> Vec<Window> {
        let mut wins: Vec<Window> = self.windows.borrow().keys().copied().collect();
        wins.sort_unstable();
        wins
    }

    fn pointer_position(&self) -> Option<(i32, i32)> {
        self.pointer.get()
    }

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes> {
        self.windows.borrow().get(&win).map(|w| WindowAttributes {
            override_redirect: w.override_redirect,
            viewable: w.viewable,
        })
    }

    fn window_geometry(&self, win: Window) -> Option<(Rectangle, i32)> {
        self.windows.borrow().get(&win).map(|w| (w.geom, w.bw))
    }

    fn window_class(&self, win: Window) -> Option<(String, String)> {
        self.windows.borrow().get(&win).and_then(|w| w.class.clone())
    }

    fn window_title(&self, win: Window) -> Option<String> {
        self.windows.borrow().get(&win).and_then(|w| w.title.clone())
    }

    fn normal_hints(&self, win: Window) -> Vec<u32> {
        self.window(win).normal_hints
    }

    fn wm_hints(&self, win: Window) -> Option<WmHints> {
        self.window(win).hints
    }

    fn set_urgency_hint(&self, win: Window, urgent: bool) {
        self.update(win, |w| {
            let mut hints = w.hints.unwrap_or_default();
            hints.urgent = urgent;
            w.hints = Some(hints);
        });
    }

    fn transient_for(&self, win: Window) -> Option<Window> {
        self.window(win).transient_for
    }

    fn is_dialog(&self, win: Window) -> bool {
        self.window(win).dialog
    }

    fn requests_fullscreen(&self, win: Window) -> bool {
        self.window(win).fullscreen
    }

    fn wm_state(&self, win: Window) -> Option<WmState> {
        self.window(win).wm_state
    }

    fn select_client_events(&self, win: Window) {
        self.update(win, |w| w.watched = true);
    }

    fn configure(&self, win: Window, geom: Rectangle, bw: i32) {
        self.update(win, |w| {
            w.geom = geom;
            w.bw = bw;
        });
        self.record(Call::Configure(win, geom, bw));
    }

    fn configure_unmanaged(&self, req: &ConfigureRequest) {
        self.update(req.id, |w| {
            for (field, value) in req.values() {
                match field {
                    crate::xconnection::CONFIG_WINDOW_X => w.geom.x = value as i32,
                    crate::xconnection::CONFIG_WINDOW_Y => w.geom.y = value as i32,
                    crate::xconnection::CONFIG_WINDOW_WIDTH => w.geom.w = value as i32,
                    crate::xconnection::CONFIG_WINDOW_HEIGHT => w.geom.h = value as i32,
                    crate::xconnection::CONFIG_WINDOW_BORDER_WIDTH => w.bw = value as i32,
                    _ => {}
                }
            }
        });
        self.record(Call::ConfigureUnmanaged(*req));
    }

    fn set_border_width(&self, win: Window, bw: i32) {
        self.update(win, |w| w.bw = bw);
    }

    fn move_window(&self, win: Window, x: i32, y: i32) {
        self.update(win, |w| {
            w.geom.x = x;
            w.geom.y = y;
        });
        self.record(Call::Move(win, x, y));
    }

    fn send_configure_notify(&self, win: Window, geom: Rectangle, bw: i32) {
        self.record(Call::SyntheticNotify(win, geom, bw));
    }

    fn raise(&self, win: Window) {
        self.record(Call::Raise(win));
    }

    fn lower(&self, win: Window) {
        self.record(Call::Lower(win));
    }

    fn map(&self, win: Window) {
        self.update(win, |w| w.viewable = true);
        self.record(Call::Map(win));
    }

    fn set_border_color(&self, win: Window, color: u32) {
        self.update(win, |w| w.border_color = Some(color));
    }

    fn set_wm_state(&self, win: Window, state: WmState) {
        self.update(win, |w| w.wm_state = Some(state));
    }

    fn set_fullscreen_state(&self, win: Window, fullscreen: bool) {
        self.update(win, |w| w.fullscreen = fullscreen);
    }

    fn set_client_list(&self, wins: &[Window]) {
        *self.client_list.borrow_mut() = wins.to_vec();
    }

    fn focus(&self, win: Window) {
        self.focused.set(Some(win));
    }

    fn focus_root(&self) {
        self.focused.set(None);
    }

    fn send_protocol(&self, win: Window, protocol: WmProtocol) -> bool {
        if self.window(win).protocols.contains(&protocol) {
            self.record(Call::Protocol(win, protocol));
            true
        } else {
            false
        }
    }

    fn kill(&self, win: Window) {
        self.record(Call::Kill(win));
    }

    fn grab_keys(&self, grabs: &[(u16, u8)]) {
        *self.grabs.borrow_mut() = grabs.to_vec();
    }

    fn keysym_for(&self, code: u8) -> Keysym {
        let index = usize::from(code).wrapping_sub(8);
        self.keymap.borrow().get(index).copied().unwrap_or(0)
    }

    // Keycodes are handed out on first use, starting at 8 like a real server.
    fn keycodes_for(&self, sym: Keysym) -> Vec<u8> {
        let mut keymap = self.keymap.borrow_mut();
        let index = match keymap.iter().position(|&s| s == sym) {
            Some(i) => i,
            None => {
                keymap.push(sym);
                keymap.len() - 1
            }
        };
        vec![(index + 8) as u8]
    }

    fn numlock_mask(&self) -> u16 {
        NUMLOCK
    }

    fn watch_properties(&self, win: Window) {
        self.update(win, |w| w.watched = true);
    }

    fn text_property(&self, win: Window, prop: TextProperty) -> Option<String> {
        let w = self.window(win);
        match prop {
            TextProperty::IpcCommand => w.command,
            TextProperty::IpcState => w.state,
        }
    }

    fn set_text_property(&self, win: Window, prop: TextProperty, value: &str) {
        self.update(win, |w| match prop {
            TextProperty::IpcCommand => w.command = Some(value.to_string()),
            TextProperty::IpcState => w.state = Some(value.to_string()),
        });
    }
}

/// Keeps every command instead of running it.
#[derive(Default)]
pub struct RecordingSpawner {
    commands: RefCell<Vec<String>>,
}

impl RecordingSpawner {
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, cmd: &str) {
        self.commands.borrow_mut().push(cmd.to_string());
    }
}
