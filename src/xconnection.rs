//! The display server boundary.
//!
//! [`XConn`] lists every request the window manager makes of the X server;
//! [`XcbConnection`] implements it on top of xcb. Raw xcb events are turned
//! into [`XEvent`]s here so that nothing past this module compares atoms or
//! casts event pointers.
use std::{cell::RefCell, collections::VecDeque};

use anyhow::{Context, Result};
use thiserror::Error;
use xcb::{randr, xinerama, Atom, Window};
use xcb_util::{ewmh, icccm, keysyms::KeySymbols};

use crate::{geometry::Rectangle, keysym::Keysym};

// Mask out the most significant bit, which indicates if it's a send_event
const XCB_RESPONSE_TYPE_MASK: u8 = 0x7F;
const XCB_SEND_EVENT_MASK: u8 = 0x80;
const GRAB_MODE_ASYNC: u8 = xcb::GRAB_MODE_ASYNC as u8;
const ROOT_EVENT_MASK: &[(u32, u32)] = &[(
    xcb::CW_EVENT_MASK,
    xcb::EVENT_MASK_SUBSTRUCTURE_REDIRECT
        | xcb::EVENT_MASK_SUBSTRUCTURE_NOTIFY
        | xcb::EVENT_MASK_POINTER_MOTION
        | xcb::EVENT_MASK_ENTER_WINDOW
        | xcb::EVENT_MASK_LEAVE_WINDOW
        | xcb::EVENT_MASK_STRUCTURE_NOTIFY
        | xcb::EVENT_MASK_PROPERTY_CHANGE,
)];
const CLIENT_EVENT_MASK: &[(u32, u32)] = &[(
    xcb::CW_EVENT_MASK,
    xcb::EVENT_MASK_ENTER_WINDOW
        | xcb::EVENT_MASK_FOCUS_CHANGE
        | xcb::EVENT_MASK_PROPERTY_CHANGE
        | xcb::EVENT_MASK_STRUCTURE_NOTIFY,
)];
const PROPERTY_EVENT_MASK: &[(u32, u32)] = &[(xcb::CW_EVENT_MASK, xcb::EVENT_MASK_PROPERTY_CHANGE)];
const INPUT_FOCUS_POINTER_ROOT: u8 = xcb::INPUT_FOCUS_POINTER_ROOT as u8;
const PROP_MODE_REPLACE: u8 = xcb::PROP_MODE_REPLACE as u8;
const WINDOW_CLASS_INPUT_ONLY: u16 = xcb::WINDOW_CLASS_INPUT_ONLY as u16;

pub const CONFIG_WINDOW_X: u16 = xcb::CONFIG_WINDOW_X as u16;
pub const CONFIG_WINDOW_Y: u16 = xcb::CONFIG_WINDOW_Y as u16;
pub const CONFIG_WINDOW_WIDTH: u16 = xcb::CONFIG_WINDOW_WIDTH as u16;
pub const CONFIG_WINDOW_HEIGHT: u16 = xcb::CONFIG_WINDOW_HEIGHT as u16;
pub const CONFIG_WINDOW_BORDER_WIDTH: u16 = xcb::CONFIG_WINDOW_BORDER_WIDTH as u16;
pub const CONFIG_WINDOW_SIBLING: u16 = xcb::CONFIG_WINDOW_SIBLING as u16;
pub const CONFIG_WINDOW_STACK_MODE: u16 = xcb::CONFIG_WINDOW_STACK_MODE as u16;

// WM_HINTS flag bits (ICCCM 4.1.2.4)
const INPUT_HINT: u32 = 1;
const URGENCY_HINT: u32 = 1 << 8;

const XK_NUM_LOCK: Keysym = 0xff7f;

// X protocol error codes
const BAD_WINDOW: u8 = 3;
const BAD_MATCH: u8 = 8;
const BAD_DRAWABLE: u8 = 9;
const BAD_ACCESS: u8 = 10;

// X protocol request opcodes
const X_CONFIGURE_WINDOW: u8 = 12;
const X_GRAB_BUTTON: u8 = 28;
const X_GRAB_KEY: u8 = 33;
const X_SET_INPUT_FOCUS: u8 = 42;
const X_COPY_AREA: u8 = 62;
const X_POLY_SEGMENT: u8 = 66;
const X_POLY_FILL_RECTANGLE: u8 = 70;
const X_POLY_TEXT8: u8 = 74;

macro_rules! atoms {
    ( $( $name:ident ),+ ) => {
        #[allow(non_snake_case)]
        pub struct InternedAtoms {
            $(
                pub $name: xcb::Atom
            ),*
        }

        impl InternedAtoms {
            pub fn new(conn: &xcb::Connection) -> Result<InternedAtoms> {
                Ok(InternedAtoms {
                    $(
                        $name: xcb::intern_atom(conn, false, stringify!($name)).get_reply()?.atom()
                    ),*
                })
            }
        }
    };
    // Allow trailing comma:
    ( $( $name:ident ),+ , ) => (atoms!($( $name ),+);)
}

// Intern atoms that are not built-in in the core protocol
atoms!(
    WM_PROTOCOLS,
    WM_DELETE_WINDOW,
    WM_STATE,
    WM_TAKE_FOCUS,
    UTF8_STRING,
    _NET_SUPPORTED,
    _NET_WM_NAME,
    _NET_WM_STATE,
    _NET_WM_STATE_FULLSCREEN,
    _NET_ACTIVE_WINDOW,
    _NET_WM_WINDOW_TYPE,
    _NET_WM_WINDOW_TYPE_DIALOG,
    _NET_CLIENT_LIST,
    _NET_SUPPORTING_WM_CHECK,
    _DINA_IPC_COMMAND,
    _DINA_IPC_STATE,
);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XError {
    #[error("unable to connect to the X server: {0}")]
    Connect(String),
    #[error("another window manager is already running")]
    OtherWmRunning,
    #[error("the X server closed the connection")]
    ConnectionClosed,
    #[error("X protocol error {code} on request {request}")]
    Protocol { request: u8, code: u8 },
}

impl XError {
    pub fn from_generic(e: &xcb::GenericError) -> XError {
        XError::Protocol {
            request: unsafe { (*e.ptr).major_code },
            code: e.error_code(),
        }
    }

    /// Errors caused by windows vanishing between an event and its handling
    /// (or by requests racing with other clients) are harmless.
    pub fn is_ignorable(&self) -> bool {
        match *self {
            XError::Protocol { request, code } => {
                code == BAD_WINDOW
                    || (code == BAD_MATCH && (request == X_SET_INPUT_FOCUS || request == X_CONFIGURE_WINDOW))
                    || (code == BAD_DRAWABLE
                        && matches!(
                            request,
                            X_POLY_TEXT8 | X_POLY_FILL_RECTANGLE | X_POLY_SEGMENT | X_COPY_AREA
                        ))
                    || (code == BAD_ACCESS && (request == X_GRAB_BUTTON || request == X_GRAB_KEY))
            }
            _ => false,
        }
    }
}

/// An X key-code along with a modifier mask
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct XcbKey {
    /// Modifier key bit mask
    pub mod_mask: u16,
    /// X key code
    pub code: xcb::Keycode,
}

impl XcbKey {
    /// Build a new XcbKey from an XCB KeyPressEvent
    pub fn from_key_press(k: &xcb::KeyPressEvent) -> XcbKey {
        XcbKey {
            mod_mask: k.state(),
            code: k.detail(),
        }
    }
}

/// Properties whose changes the window manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Name,
    NormalHints,
    Hints,
    TransientFor,
    WindowType,
    IpcCommand,
    IpcState,
    Other,
}

/// Text properties used by the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProperty {
    IpcCommand,
    IpcState,
}

/// `_NET_WM_STATE` change actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn from_raw(action: u32) -> Option<StateAction> {
        match action {
            0 => Some(StateAction::Remove),
            1 => Some(StateAction::Add),
            2 => Some(StateAction::Toggle),
            _ => None,
        }
    }

    /// Whether the state ends up set, given whether it is set now.
    pub fn apply(&self, current: bool) -> bool {
        match self {
            StateAction::Remove => false,
            StateAction::Add => true,
            StateAction::Toggle => !current,
        }
    }
}

/// Client messages the window manager understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    Fullscreen(StateAction),
    Activate,
}

/// ICCCM WM_STATE values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmProtocol {
    DeleteWindow,
    TakeFocus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub viewable: bool,
}

/// The parts of WM_HINTS in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WmHints {
    pub urgent: bool,
    /// The input field, if the client set one.
    pub input: Option<bool>,
}

impl WmHints {
    pub fn from_raw(raw: &[u32]) -> Option<WmHints> {
        let flags = *raw.first()?;
        Some(WmHints {
            urgent: flags & URGENCY_HINT != 0,
            input: if flags & INPUT_HINT != 0 {
                raw.get(1).map(|&i| i != 0)
            } else {
                None
            },
        })
    }
}

/// A configure request: only the fields named in `value_mask` were asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub id: Window,
    pub value_mask: u16,
    pub geom: Rectangle,
    pub bw: i32,
    pub sibling: Window,
    pub stack_mode: u8,
}

impl ConfigureRequest {
    pub fn has(&self, field: u16) -> bool {
        self.value_mask & field != 0
    }

    /// The (field, value) list to forward unchanged.
    pub fn values(&self) -> Vec<(u16, u32)> {
        vec![
            (CONFIG_WINDOW_X, self.geom.x as u32),
            (CONFIG_WINDOW_Y, self.geom.y as u32),
            (CONFIG_WINDOW_WIDTH, self.geom.w as u32),
            (CONFIG_WINDOW_HEIGHT, self.geom.h as u32),
            (CONFIG_WINDOW_BORDER_WIDTH, self.bw as u32),
            (CONFIG_WINDOW_SIBLING, self.sibling),
            (CONFIG_WINDOW_STACK_MODE, u32::from(self.stack_mode)),
        ]
        .into_iter()
        .filter(|&(field, _)| self.has(field))
        .collect()
    }
}

/**
 * Wrapper around the low level XCB event types that require casting to work with.
 * Only the events the window manager handles are represented; everything
 * else is dropped during conversion.
 *
 * https://tronche.com/gui/x/xlib/events/types.html
 */
#[derive(Debug, Clone, PartialEq)]
pub enum XEvent {
    /// xcb docs: https://www.mankier.com/3/xcb_key_press_event_t
    KeyPress { key: XcbKey },

    /// xcb docs: https://www.mankier.com/3/xcb_map_request_event_t
    MapRequest { id: Window },

    /// xcb docs: https://www.mankier.com/3/xcb_unmap_notify_event_t
    UnmapNotify {
        id: Window,
        /// Sent by a client through SendEvent (ICCCM withdraw).
        synthetic: bool,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_destroy_notify_event_t
    DestroyNotify { id: Window },

    /// xcb docs: https://www.mankier.com/3/xcb_configure_request_event_t
    ConfigureRequest(ConfigureRequest),

    /// xcb docs: https://www.mankier.com/3/xcb_configure_notify_event_t
    ConfigureNotify {
        id: Window,
        geom: Rectangle,
        is_root: bool,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_enter_notify_event_t
    EnterNotify {
        id: Window,
        /// Pointer position relative to the root window
        x: i32,
        y: i32,
        /// False for grab related crossings and moves into a child window
        crossing: bool,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_motion_notify_event_t
    MotionNotify { id: Window, x: i32, y: i32 },

    /// xcb docs: https://www.mankier.com/3/xcb_focus_in_event_t
    FocusIn { id: Window },

    /// xcb docs: https://www.mankier.com/3/xcb_property_notify_event_t
    PropertyNotify {
        id: Window,
        property: Property,
        deleted: bool,
        is_root: bool,
    },

    /// https://www.mankier.com/3/xcb_client_message_event_t
    ClientMessage { id: Window, request: ClientRequest },

    /// xcb docs: https://www.mankier.com/3/xcb_mapping_notify_event_t
    KeyboardMapping,
}

/// Everything the window manager needs from the display server.
pub trait XConn {
    fn root(&self) -> Window;
    fn screen_size(&self) -> (i32, i32);
    /// One rectangle per distinct output.
    fn monitor_geometries(&self) -> Vec<Rectangle>;
    /// Claim substructure redirection on the root window.
    fn become_wm(&self) -> Result<(), XError>;
    fn cleanup(&self);
    fn flush(&self);
    /// Block until the next event the window manager handles arrives.
    fn wait_for_event(&self) -> Result<XEvent, XError>;
    /// Round-trip to the server and discard the enter events a restack caused.
    fn drop_enter_events(&self);
    fn query_tree(&self) -> Vec<Window>;
    fn pointer_position(&self) -> Option<(i32, i32)>;

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes>;
    /// Geometry and border width.
    fn window_geometry(&self, win: Window) -> Option<(Rectangle, i32)>;
    /// (class, instance) from WM_CLASS.
    fn window_class(&self, win: Window) -> Option<(String, String)>;
    fn window_title(&self, win: Window) -> Option<String>;
    /// Raw WM_NORMAL_HINTS words, empty when unset.
    fn normal_hints(&self, win: Window) -> Vec<u32>;
    fn wm_hints(&self, win: Window) -> Option<WmHints>;
    fn set_urgency_hint(&self, win: Window, urgent: bool);
    fn transient_for(&self, win: Window) -> Option<Window>;
    fn is_dialog(&self, win: Window) -> bool;
    fn requests_fullscreen(&self, win: Window) -> bool;
    fn wm_state(&self, win: Window) -> Option<WmState>;

    fn select_client_events(&self, win: Window);
    fn configure(&self, win: Window, geom: Rectangle, bw: i32);
    /// Forward a request for a window we do not manage.
    fn configure_unmanaged(&self, req: &ConfigureRequest);
    fn set_border_width(&self, win: Window, bw: i32);
    fn move_window(&self, win: Window, x: i32, y: i32);
    fn send_configure_notify(&self, win: Window, geom: Rectangle, bw: i32);
    fn raise(&self, win: Window);
    fn lower(&self, win: Window);
    fn map(&self, win: Window);
    fn set_border_color(&self, win: Window, color: u32);
    fn set_wm_state(&self, win: Window, state: WmState);
    fn set_fullscreen_state(&self, win: Window, fullscreen: bool);
    fn set_client_list(&self, wins: &[Window]);
    /// Give `win` the input focus and mark it active.
    fn focus(&self, win: Window);
    fn focus_root(&self);
    /// Send a WM_PROTOCOLS message if the client supports it.
    fn send_protocol(&self, win: Window, protocol: WmProtocol) -> bool;
    fn kill(&self, win: Window);

    /// Replace every key grab on the root window.
    fn grab_keys(&self, grabs: &[(u16, u8)]);
    fn keysym_for(&self, code: u8) -> Keysym;
    fn keycodes_for(&self, sym: Keysym) -> Vec<u8>;
    fn numlock_mask(&self) -> u16;

    fn watch_properties(&self, win: Window);
    fn text_property(&self, win: Window, prop: TextProperty) -> Option<String>;
    fn set_text_property(&self, win: Window, prop: TextProperty, value: &str);
}

/// Handles communication with an X server via xcb
pub struct XcbConnection {
    conn: ewmh::Connection,
    preferred_screen: i32,
    root: Window,
    atoms: InternedAtoms,
    check_win: Window,
    pending: RefCell<VecDeque<xcb::GenericEvent>>,
}

impl XcbConnection {
    pub fn new() -> Result<XcbConnection> {
        let (conn, preferred_screen) =
            xcb::Connection::connect(None).map_err(|e| XError::Connect(e.to_string()))?;
        let conn = ewmh::Connection::connect(conn).map_err(|(e, _)| XError::from_generic(&e))?;
        let root = conn
            .get_setup()
            .roots()
            .nth(preferred_screen as usize)
            .context("Unable to get the root window of the preferred screen")?
            .root();
        let atoms = InternedAtoms::new(&conn).context("Failed to intern atoms")?;

        Ok(XcbConnection {
            check_win: conn.generate_id(),
            conn,
            preferred_screen,
            root,
            atoms,
            pending: RefCell::new(VecDeque::new()),
        })
    }

    pub fn raw_conn(&self) -> &ewmh::Connection {
        &self.conn
    }

    pub fn atoms(&self) -> &InternedAtoms {
        &self.atoms
    }

    /// Returns the Atom identifier associated with the atom_name str.
    pub fn intern_atom(&self, atom_name: &str) -> Result<Atom> {
        Ok(xcb::intern_atom(&self.conn, false, atom_name).get_reply()?.atom())
    }

    /// Create a 1x1 input only window, used by the control client.
    pub fn create_input_window(&self, name: &str, class: &str) -> Result<Window> {
        let win = self.conn.generate_id();
        xcb::create_window_checked(
            &self.conn,                        // xcb connection to X11
            xcb::COPY_FROM_PARENT as u8,       // new window's depth
            win,                               // ID to be used for referring to the window
            self.root,                         // parent window
            0,                                 // x-coordinate
            0,                                 // y-coordinate
            1,                                 // width, can't be 0
            1,                                 // height, can't be 0
            0,                                 // border width
            WINDOW_CLASS_INPUT_ONLY,           // class
            xcb::COPY_FROM_PARENT,             // visual
            PROPERTY_EVENT_MASK,               // value list
        )
        .request_check()
        .map_err(|e| XError::from_generic(&e))
        .context("Failed to create an input window")?;
        ewmh::set_wm_name(&self.conn, win, name);
        icccm::set_wm_class(&self.conn, win, class, class);
        Ok(win)
    }

    /// Ask the window manager to look at `win` by requesting a move.
    pub fn request_configure(&self, win: Window) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_X, 0)]);
    }

    pub fn destroy_window(&self, win: Window) {
        xcb::destroy_window(&self.conn, win);
    }

    fn text_atom(&self, prop: TextProperty) -> Atom {
        match prop {
            TextProperty::IpcCommand => self.atoms._DINA_IPC_COMMAND,
            TextProperty::IpcState => self.atoms._DINA_IPC_STATE,
        }
    }

    fn u32_property(&self, win: Window, prop: Atom, type_: Atom, len: u32) -> Vec<u32> {
        // xcb docs: https://www.mankier.com/3/xcb_get_property
        xcb::get_property(&self.conn, false, win, prop, type_, 0, len)
            .get_reply()
            .ok()
            .filter(|r| r.format() == 32)
            .map(|r| r.value::<u32>().to_vec())
            .unwrap_or_default()
    }

    fn property_of(&self, atom: Atom) -> Property {
        match atom {
            xcb::ATOM_WM_NAME => Property::Name,
            xcb::ATOM_WM_NORMAL_HINTS => Property::NormalHints,
            xcb::ATOM_WM_HINTS => Property::Hints,
            xcb::ATOM_WM_TRANSIENT_FOR => Property::TransientFor,
            a if a == self.atoms._NET_WM_NAME => Property::Name,
            a if a == self.atoms._NET_WM_WINDOW_TYPE => Property::WindowType,
            a if a == self.atoms._DINA_IPC_COMMAND => Property::IpcCommand,
            a if a == self.atoms._DINA_IPC_STATE => Property::IpcState,
            _ => Property::Other,
        }
    }

    fn client_request(&self, e: &xcb::ClientMessageEvent) -> Option<ClientRequest> {
        let data = e.data().data32();
        if e.type_() == self.atoms._NET_WM_STATE {
            let fullscreen = self.atoms._NET_WM_STATE_FULLSCREEN;
            if data[1] == fullscreen || data[2] == fullscreen {
                return StateAction::from_raw(data[0]).map(ClientRequest::Fullscreen);
            }
            None
        } else if e.type_() == self.atoms._NET_ACTIVE_WINDOW {
            Some(ClientRequest::Activate)
        } else {
            None
        }
    }

    fn convert(&self, event: &xcb::GenericEvent) -> Option<Result<XEvent, XError>> {
        let synthetic = event.response_type() & XCB_SEND_EVENT_MASK != 0;
        let etype = event.response_type() & XCB_RESPONSE_TYPE_MASK;

        let converted = match etype {
            0 => {
                let e: &xcb::GenericError = unsafe { xcb::cast_event(event) };
                return Some(Err(XError::from_generic(e)));
            }

            xcb::KEY_PRESS => {
                let e: &xcb::KeyPressEvent = unsafe { xcb::cast_event(event) };
                XEvent::KeyPress {
                    key: XcbKey::from_key_press(e),
                }
            }

            xcb::MAP_REQUEST => {
                let e: &xcb::MapRequestEvent = unsafe { xcb::cast_event(event) };
                XEvent::MapRequest { id: e.window() }
            }

            xcb::UNMAP_NOTIFY => {
                let e: &xcb::UnmapNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::UnmapNotify {
                    id: e.window(),
                    synthetic,
                }
            }

            xcb::DESTROY_NOTIFY => {
                let e: &xcb::DestroyNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::DestroyNotify { id: e.window() }
            }

            xcb::CONFIGURE_REQUEST => {
                let e: &xcb::ConfigureRequestEvent = unsafe { xcb::cast_event(event) };
                XEvent::ConfigureRequest(ConfigureRequest {
                    id: e.window(),
                    value_mask: e.value_mask(),
                    geom: Rectangle::new(
                        i32::from(e.x()),
                        i32::from(e.y()),
                        i32::from(e.width()),
                        i32::from(e.height()),
                    ),
                    bw: i32::from(e.border_width()),
                    sibling: e.sibling(),
                    stack_mode: e.stack_mode(),
                })
            }

            xcb::CONFIGURE_NOTIFY => {
                let e: &xcb::ConfigureNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::ConfigureNotify {
                    id: e.window(),
                    geom: Rectangle::new(
                        i32::from(e.x()),
                        i32::from(e.y()),
                        i32::from(e.width()),
                        i32::from(e.height()),
                    ),
                    is_root: e.window() == self.root,
                }
            }

            xcb::ENTER_NOTIFY => {
                let e: &xcb::EnterNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::EnterNotify {
                    id: e.event(),
                    x: i32::from(e.root_x()),
                    y: i32::from(e.root_y()),
                    crossing: u32::from(e.mode()) == xcb::NOTIFY_MODE_NORMAL
                        && u32::from(e.detail()) != xcb::NOTIFY_DETAIL_INFERIOR,
                }
            }

            xcb::MOTION_NOTIFY => {
                let e: &xcb::MotionNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::MotionNotify {
                    id: e.event(),
                    x: i32::from(e.root_x()),
                    y: i32::from(e.root_y()),
                }
            }

            xcb::FOCUS_IN => {
                let e: &xcb::FocusInEvent = unsafe { xcb::cast_event(event) };
                XEvent::FocusIn { id: e.event() }
            }

            xcb::PROPERTY_NOTIFY => {
                let e: &xcb::PropertyNotifyEvent = unsafe { xcb::cast_event(event) };
                XEvent::PropertyNotify {
                    id: e.window(),
                    property: self.property_of(e.atom()),
                    deleted: u32::from(e.state()) == xcb::PROPERTY_DELETE,
                    is_root: e.window() == self.root,
                }
            }

            xcb::CLIENT_MESSAGE => {
                let e: &xcb::ClientMessageEvent = unsafe { xcb::cast_event(event) };
                XEvent::ClientMessage {
                    id: e.window(),
                    request: self.client_request(e)?,
                }
            }

            xcb::MAPPING_NOTIFY => {
                let e: &xcb::MappingNotifyEvent = unsafe { xcb::cast_event(event) };
                if u32::from(e.request()) != xcb::MAPPING_KEYBOARD {
                    return None;
                }
                XEvent::KeyboardMapping
            }

            // NOTE: ignoring other event types
            _ => return None,
        };
        Some(Ok(converted))
    }

    fn next_raw_event(&self) -> Option<xcb::GenericEvent> {
        let queued = self.pending.borrow_mut().pop_front();
        queued.or_else(|| self.conn.wait_for_event())
    }
}

/// Outputs mirroring each other share one monitor.
fn push_unique(found: &mut Vec<Rectangle>, r: Rectangle) {
    if r.w > 0 && r.h > 0 && !found.contains(&r) {
        found.push(r);
    }
}

impl XConn for XcbConnection {
    fn root(&self) -> Window {
        self.root
    }

    fn screen_size(&self) -> (i32, i32) {
        self.conn
            .get_setup()
            .roots()
            .nth(self.preferred_screen as usize)
            .map(|s| (i32::from(s.width_in_pixels()), i32::from(s.height_in_pixels())))
            .unwrap_or((0, 0))
    }

    fn monitor_geometries(&self) -> Vec<Rectangle> {
        let mut found: Vec<Rectangle> = Vec::new();

        if let Ok(resources) = randr::get_screen_resources(&self.conn, self.root).get_reply() {
            // timestamp 0 is CurrentTime; disabled crtcs report a zero size
            resources
                .crtcs()
                .iter()
                .flat_map(|c| randr::get_crtc_info(&self.conn, *c, 0).get_reply())
                .filter(|c| c.width() > 0 && c.height() > 0)
                .map(|c| Rectangle::new(i32::from(c.x()), i32::from(c.y()), i32::from(c.width()), i32::from(c.height())))
                .for_each(|r| push_unique(&mut found, r));
        }

        if found.is_empty() {
            let active = xinerama::is_active(&self.conn)
                .get_reply()
                .map(|r| r.state() != 0)
                .unwrap_or(false);
            if active {
                if let Ok(screens) = xinerama::query_screens(&self.conn).get_reply() {
                    screens
                        .screen_info()
                        .map(|s| Rectangle::new(i32::from(s.x_org()), i32::from(s.y_org()), i32::from(s.width()), i32::from(s.height())))
                        .for_each(|r| push_unique(&mut found, r));
                }
            }
        }

        if found.is_empty() {
            let (w, h) = self.screen_size();
            found.push(Rectangle::new(0, 0, w, h));
        }
        info!("detected monitors: {:?}", found);
        found
    }

    fn become_wm(&self) -> Result<(), XError> {
        // Register for substructure redirection
        // https://jichu4n.com/posts/how-x-window-managers-work-and-how-to-write-one-part-i/#substructure-redirection
        xcb::change_window_attributes_checked(&self.conn, self.root, ROOT_EVENT_MASK)
            .request_check()
            .map_err(|e| match XError::from_generic(&e) {
                XError::Protocol { code: BAD_ACCESS, .. } => XError::OtherWmRunning,
                other => other,
            })?;

        xcb::create_window(
            &self.conn,
            xcb::COPY_FROM_PARENT as u8,
            self.check_win,
            self.root,
            0,
            0,
            1,
            1,
            0,
            WINDOW_CLASS_INPUT_ONLY,
            xcb::COPY_FROM_PARENT,
            &[],
        );
        for &win in &[self.check_win, self.root] {
            xcb::change_property(
                &self.conn,
                PROP_MODE_REPLACE,
                win,
                self.atoms._NET_SUPPORTING_WM_CHECK,
                xcb::ATOM_WINDOW,
                32,
                &[self.check_win],
            );
        }
        ewmh::set_wm_name(&self.conn, self.check_win, "dina");

        let supported = [
            self.atoms._NET_SUPPORTED,
            self.atoms._NET_WM_NAME,
            self.atoms._NET_WM_STATE,
            self.atoms._NET_WM_STATE_FULLSCREEN,
            self.atoms._NET_ACTIVE_WINDOW,
            self.atoms._NET_WM_WINDOW_TYPE,
            self.atoms._NET_WM_WINDOW_TYPE_DIALOG,
            self.atoms._NET_CLIENT_LIST,
            self.atoms._NET_SUPPORTING_WM_CHECK,
        ];
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            self.root,
            self.atoms._NET_SUPPORTED,
            xcb::ATOM_ATOM,
            32,
            &supported,
        );
        xcb::delete_property(&self.conn, self.root, self.atoms._NET_CLIENT_LIST);
        self.conn.flush();
        Ok(())
    }

    // - Release all of the keybindings we are holding on to
    // - destroy the check window
    // - mark ourselves as no longer being the active root window
    fn cleanup(&self) {
        // xcb docs: https://www.mankier.com/3/xcb_ungrab_key
        xcb::ungrab_key(&self.conn, xcb::GRAB_ANY as u8, self.root, xcb::MOD_MASK_ANY as u16);
        xcb::destroy_window(&self.conn, self.check_win);
        self.focus_root();
        self.conn.flush();
    }

    fn flush(&self) {
        self.conn.flush();
    }

    fn wait_for_event(&self) -> Result<XEvent, XError> {
        loop {
            let event = self.next_raw_event().ok_or(XError::ConnectionClosed)?;
            if let Some(converted) = self.convert(&event) {
                return converted;
            }
        }
    }

    fn drop_enter_events(&self) {
        // a reply forces every earlier request to be processed
        if xcb::get_input_focus(&self.conn).get_reply().is_err() {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        while let Some(event) = self.conn.poll_for_event() {
            if event.response_type() & XCB_RESPONSE_TYPE_MASK != xcb::ENTER_NOTIFY {
                pending.push_back(event);
            }
        }
    }

    fn query_tree(&self) -> Vec<Window> {
        xcb::query_tree(&self.conn, self.root)
            .get_reply()
            .map(|r| r.children().to_vec())
            .unwrap_or_default()
    }

    fn pointer_position(&self) -> Option<(i32, i32)> {
        xcb::query_pointer(&self.conn, self.root)
            .get_reply()
            .ok()
            .map(|r| (i32::from(r.root_x()), i32::from(r.root_y())))
    }

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes> {
        xcb::get_window_attributes(&self.conn, win)
            .get_reply()
            .ok()
            .map(|r| WindowAttributes {
                override_redirect: r.override_redirect(),
                viewable: u32::from(r.map_state()) == xcb::MAP_STATE_VIEWABLE,
            })
    }

    fn window_geometry(&self, win: Window) -> Option<(Rectangle, i32)> {
        xcb::get_geometry(&self.conn, win).get_reply().ok().map(|g| {
            (
                Rectangle::new(i32::from(g.x()), i32::from(g.y()), i32::from(g.width()), i32::from(g.height())),
                i32::from(g.border_width()),
            )
        })
    }

    fn window_class(&self, win: Window) -> Option<(String, String)> {
        icccm::get_wm_class(&self.conn, win)
            .get_reply()
            .ok()
            .map(|r| (r.class().to_string(), r.instance().to_string()))
    }

    fn window_title(&self, win: Window) -> Option<String> {
        ewmh::get_wm_name(&self.conn, win)
            .get_reply()
            .ok()
            .map(|r| r.string().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                icccm::get_wm_name(&self.conn, win)
                    .get_reply()
                    .ok()
                    .map(|r| r.name().to_string())
            })
    }

    fn normal_hints(&self, win: Window) -> Vec<u32> {
        self.u32_property(win, xcb::ATOM_WM_NORMAL_HINTS, xcb::ATOM_WM_SIZE_HINTS, 18)
    }

    fn wm_hints(&self, win: Window) -> Option<WmHints> {
        WmHints::from_raw(&self.u32_property(win, xcb::ATOM_WM_HINTS, xcb::ATOM_WM_HINTS, 9))
    }

    fn set_urgency_hint(&self, win: Window, urgent: bool) {
        let mut raw = self.u32_property(win, xcb::ATOM_WM_HINTS, xcb::ATOM_WM_HINTS, 9);
        if let Some(flags) = raw.first_mut() {
            if urgent {
                *flags |= URGENCY_HINT;
            } else {
                *flags &= !URGENCY_HINT;
            }
            xcb::change_property(
                &self.conn,
                PROP_MODE_REPLACE,
                win,
                xcb::ATOM_WM_HINTS,
                xcb::ATOM_WM_HINTS,
                32,
                &raw,
            );
        }
    }

    fn transient_for(&self, win: Window) -> Option<Window> {
        self.u32_property(win, xcb::ATOM_WM_TRANSIENT_FOR, xcb::ATOM_WINDOW, 1)
            .first()
            .copied()
            .filter(|&w| w != xcb::NONE)
    }

    fn is_dialog(&self, win: Window) -> bool {
        self.u32_property(win, self.atoms._NET_WM_WINDOW_TYPE, xcb::ATOM_ATOM, 32)
            .contains(&self.atoms._NET_WM_WINDOW_TYPE_DIALOG)
    }

    fn requests_fullscreen(&self, win: Window) -> bool {
        self.u32_property(win, self.atoms._NET_WM_STATE, xcb::ATOM_ATOM, 32)
            .contains(&self.atoms._NET_WM_STATE_FULLSCREEN)
    }

    fn wm_state(&self, win: Window) -> Option<WmState> {
        match self.u32_property(win, self.atoms.WM_STATE, self.atoms.WM_STATE, 2).first() {
            Some(0) => Some(WmState::Withdrawn),
            Some(1) => Some(WmState::Normal),
            Some(3) => Some(WmState::Iconic),
            _ => None,
        }
    }

    fn select_client_events(&self, win: Window) {
        xcb::change_window_attributes(&self.conn, win, CLIENT_EVENT_MASK);
    }

    fn configure(&self, win: Window, geom: Rectangle, bw: i32) {
        xcb::configure_window(
            &self.conn,
            win,
            &[
                (CONFIG_WINDOW_X, geom.x as u32),
                (CONFIG_WINDOW_Y, geom.y as u32),
                (CONFIG_WINDOW_WIDTH, geom.w as u32),
                (CONFIG_WINDOW_HEIGHT, geom.h as u32),
                (CONFIG_WINDOW_BORDER_WIDTH, bw as u32),
            ],
        );
    }

    fn configure_unmanaged(&self, req: &ConfigureRequest) {
        xcb::configure_window(&self.conn, req.id, &req.values());
    }

    fn set_border_width(&self, win: Window, bw: i32) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_BORDER_WIDTH, bw as u32)]);
    }

    fn move_window(&self, win: Window, x: i32, y: i32) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_X, x as u32), (CONFIG_WINDOW_Y, y as u32)]);
    }

    fn send_configure_notify(&self, win: Window, geom: Rectangle, bw: i32) {
        let event = xcb::ConfigureNotifyEvent::new(
            win,
            win,
            xcb::NONE,
            geom.x as i16,
            geom.y as i16,
            geom.w as u16,
            geom.h as u16,
            bw as u16,
            false,
        );
        xcb::send_event(&self.conn, false, win, xcb::EVENT_MASK_STRUCTURE_NOTIFY, &event);
    }

    fn raise(&self, win: Window) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_STACK_MODE, xcb::STACK_MODE_ABOVE)]);
    }

    fn lower(&self, win: Window) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_STACK_MODE, xcb::STACK_MODE_BELOW)]);
    }

    fn map(&self, win: Window) {
        xcb::map_window(&self.conn, win);
    }

    fn set_border_color(&self, win: Window, color: u32) {
        xcb::change_window_attributes(&self.conn, win, &[(xcb::CW_BORDER_PIXEL, color)]);
    }

    fn set_wm_state(&self, win: Window, state: WmState) {
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            win,
            self.atoms.WM_STATE,
            self.atoms.WM_STATE,
            32,
            &[state as u32, xcb::NONE],
        );
    }

    fn set_fullscreen_state(&self, win: Window, fullscreen: bool) {
        let data: &[u32] = if fullscreen {
            &[self.atoms._NET_WM_STATE_FULLSCREEN]
        } else {
            &[]
        };
        xcb::change_property(&self.conn, PROP_MODE_REPLACE, win, self.atoms._NET_WM_STATE, xcb::ATOM_ATOM, 32, data);
    }

    fn set_client_list(&self, wins: &[Window]) {
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            self.root,
            self.atoms._NET_CLIENT_LIST,
            xcb::ATOM_WINDOW,
            32,
            wins,
        );
    }

    fn focus(&self, win: Window) {
        xcb::set_input_focus(
            &self.conn,               // xcb connection to X11
            INPUT_FOCUS_POINTER_ROOT, // focus the root when focus is lost
            win,                      // window to focus
            xcb::CURRENT_TIME,        // current time to avoid network race conditions
        );
        ewmh::set_active_window(&self.conn, self.preferred_screen, win);
    }

    /// Unsets EWMH's _NET_ACTIVE_WINDOW to indicate there is no active window.
    fn focus_root(&self) {
        xcb::set_input_focus(&self.conn, INPUT_FOCUS_POINTER_ROOT, self.root, xcb::CURRENT_TIME);
        xcb::delete_property(&self.conn, self.root, self.atoms._NET_ACTIVE_WINDOW);
    }

    fn send_protocol(&self, win: Window, protocol: WmProtocol) -> bool {
        let atom = match protocol {
            WmProtocol::DeleteWindow => self.atoms.WM_DELETE_WINDOW,
            WmProtocol::TakeFocus => self.atoms.WM_TAKE_FOCUS,
        };
        let supported = icccm::get_wm_protocols(&self.conn, win, self.atoms.WM_PROTOCOLS)
            .get_reply()
            .map(|r| r.atoms().contains(&atom))
            .unwrap_or(false);
        if supported {
            let data = xcb::ClientMessageData::from_data32([atom, xcb::CURRENT_TIME, 0, 0, 0]);
            let event = xcb::ClientMessageEvent::new(32, win, self.atoms.WM_PROTOCOLS, data);
            xcb::send_event(&self.conn, false, win, xcb::EVENT_MASK_NO_EVENT, &event);
        }
        supported
    }

    fn kill(&self, win: Window) {
        xcb::kill_client(&self.conn, win);
    }

    fn grab_keys(&self, grabs: &[(u16, u8)]) {
        xcb::ungrab_key(&self.conn, xcb::GRAB_ANY as u8, self.root, xcb::MOD_MASK_ANY as u16);
        for &(mods, code) in grabs {
            // xcb docs: https://www.mankier.com/3/xcb_grab_key
            xcb::grab_key(
                &self.conn,      // xcb connection to X11
                true,            // report the event to the focused client as well
                self.root,       // the window to grab: in this case the root window
                mods,            // modifiers to grab
                code,            // keycode to grab
                GRAB_MODE_ASYNC, // don't lock pointer input while grabbing
                GRAB_MODE_ASYNC, // don't lock keyboard input while grabbing
            );
        }
        self.conn.flush();
    }

    fn keysym_for(&self, code: u8) -> Keysym {
        KeySymbols::new(&self.conn).get_keysym(code, 0)
    }

    fn keycodes_for(&self, sym: Keysym) -> Vec<u8> {
        KeySymbols::new(&self.conn).get_keycode(sym).collect()
    }

    fn numlock_mask(&self) -> u16 {
        let numlock = self.keycodes_for(XK_NUM_LOCK);
        let reply = match xcb::get_modifier_mapping(&self.conn).get_reply() {
            Ok(r) => r,
            Err(_) => return 0,
        };
        let per_mod = reply.keycodes_per_modifier() as usize;
        if per_mod == 0 {
            return 0;
        }
        reply
            .keycodes()
            .chunks(per_mod)
            .enumerate()
            .find(|(_, codes)| codes.iter().any(|c| *c != 0 && numlock.contains(c)))
            .map(|(i, _)| 1 << i)
            .unwrap_or(0)
    }

    fn watch_properties(&self, win: Window) {
        xcb::change_window_attributes(&self.conn, win, PROPERTY_EVENT_MASK);
    }

    fn text_property(&self, win: Window, prop: TextProperty) -> Option<String> {
        icccm::get_text_property(&self.conn, win, self.text_atom(prop))
            .get_reply()
            .ok()
            .map(|r| r.name().trim_end_matches(char::from(0)).to_string())
    }

    fn set_text_property(&self, win: Window, prop: TextProperty, value: &str) {
        xcb::change_property(
            &self.conn,                 // xcb connection to X11
            PROP_MODE_REPLACE,          // discard current prop and replace
            win,                        // window to change prop on
            self.text_atom(prop),       // prop to change
            self.atoms.UTF8_STRING,     // type of prop
            8,                          // data format (8/16/32-bit)
            value.as_bytes(),           // data
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(request: u8, code: u8) -> XError {
        XError::Protocol { request, code }
    }

    #[test]
    fn vanished_windows_are_ignorable() {
        assert!(protocol(X_CONFIGURE_WINDOW, BAD_WINDOW).is_ignorable());
        assert!(protocol(1, BAD_WINDOW).is_ignorable());
    }

    #[test]
    fn only_listed_request_and_code_pairs_are_ignorable() {
        assert!(protocol(X_SET_INPUT_FOCUS, BAD_MATCH).is_ignorable());
        assert!(protocol(X_CONFIGURE_WINDOW, BAD_MATCH).is_ignorable());
        assert!(protocol(X_POLY_TEXT8, BAD_DRAWABLE).is_ignorable());
        assert!(protocol(X_COPY_AREA, BAD_DRAWABLE).is_ignorable());
        assert!(protocol(X_GRAB_KEY, BAD_ACCESS).is_ignorable());
        assert!(protocol(X_GRAB_BUTTON, BAD_ACCESS).is_ignorable());

        assert!(!protocol(X_GRAB_KEY, BAD_MATCH).is_ignorable());
        assert!(!protocol(X_SET_INPUT_FOCUS, BAD_ACCESS).is_ignorable());
        assert!(!protocol(2, BAD_ACCESS).is_ignorable());
        assert!(!XError::OtherWmRunning.is_ignorable());
        assert!(!XError::ConnectionClosed.is_ignorable());
    }

    #[test]
    fn wm_hints_decode_urgency_and_input() {
        assert_eq!(WmHints::from_raw(&[]), None);
        let hints = WmHints::from_raw(&[URGENCY_HINT | INPUT_HINT, 0]).unwrap();
        assert!(hints.urgent);
        assert_eq!(hints.input, Some(false));
        assert_eq!(WmHints::from_raw(&[0, 1]).unwrap().input, None);
    }

    #[test]
    fn state_actions_follow_the_ewmh_codes() {
        assert_eq!(StateAction::from_raw(3), None);
        assert!(!StateAction::from_raw(0).unwrap().apply(true));
        assert!(StateAction::from_raw(1).unwrap().apply(true));
        assert!(StateAction::from_raw(2).unwrap().apply(false));
        assert!(!StateAction::Toggle.apply(true));
    }

    #[test]
    fn configure_requests_forward_only_requested_fields() {
        let req = ConfigureRequest {
            id: 7,
            value_mask: CONFIG_WINDOW_WIDTH | CONFIG_WINDOW_STACK_MODE,
            geom: Rectangle::new(-5, 10, 300, 200),
            bw: 2,
            sibling: 0,
            stack_mode: 1,
        };
        assert_eq!(req.values(), vec![(CONFIG_WINDOW_WIDTH, 300), (CONFIG_WINDOW_STACK_MODE, 1)]);
        assert!(req.has(CONFIG_WINDOW_WIDTH));
        assert!(!req.has(CONFIG_WINDOW_X));
    }
}
