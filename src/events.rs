//! Routing of X events to the window manager.
use xcb::Window;

use crate::{
    bindings::{Dispatch, KeyMode},
    geometry::Rectangle,
    ipc::Reply,
    wm::WindowManager,
    xconnection::{
        ClientRequest, ConfigureRequest, Property, WmState, XConn, XEvent, XcbKey,
        CONFIG_WINDOW_BORDER_WIDTH, CONFIG_WINDOW_HEIGHT, CONFIG_WINDOW_WIDTH, CONFIG_WINDOW_X,
        CONFIG_WINDOW_Y,
    },
};

impl<'a, X: XConn> WindowManager<'a, X> {
    /// Apply one event. Events for unknown windows are dropped.
    pub fn handle_event(&mut self, event: XEvent) {
        trace!("event: {:?}", event);
        match event {
            XEvent::KeyPress { key } => self.handle_key_press(key),
            XEvent::MapRequest { id } => self.handle_map_request(id),
            XEvent::UnmapNotify { id, synthetic } => self.handle_unmap_notify(id, synthetic),
            XEvent::DestroyNotify { id } => self.handle_destroy_notify(id),
            XEvent::ConfigureRequest(req) => self.handle_configure_request(req),
            XEvent::ConfigureNotify { geom, is_root, .. } => {
                if is_root {
                    self.handle_screen_change(geom)
                }
            }
            XEvent::EnterNotify { id, crossing, .. } => self.handle_enter_notify(id, crossing),
            XEvent::MotionNotify { id, x, y } => self.handle_motion_notify(id, x, y),
            XEvent::FocusIn { id } => self.handle_focus_in(id),
            XEvent::PropertyNotify {
                id,
                property,
                deleted,
                is_root,
            } => self.handle_property_notify(id, property, deleted, is_root),
            XEvent::ClientMessage { id, request } => self.handle_client_message(id, request),
            XEvent::KeyboardMapping => self.grab_keys(),
        }
    }

    fn handle_key_press(&mut self, key: XcbKey) {
        let keysym = self.conn.keysym_for(key.code);
        match self.bindings.dispatch(key.mod_mask, keysym) {
            Dispatch::ResetMode => self.set_mode(KeyMode::Normal),
            Dispatch::Run(bound) => self.run_bound(bound),
            Dispatch::Unbound => trace!("unbound key {:#x} mask {:#x}", keysym, key.mod_mask),
        }
    }

    fn handle_map_request(&mut self, win: Window) {
        match self.conn.window_attributes(win) {
            Some(attrs) if !attrs.override_redirect && !self.clients.contains_key(&win) => {
                self.manage(win)
            }
            _ => (),
        }
    }

    /// A synthetic unmap is a client withdrawing itself: it stays managed
    /// until the real unmap arrives.
    fn handle_unmap_notify(&mut self, win: Window, synthetic: bool) {
        if !self.clients.contains_key(&win) {
            return;
        }
        if synthetic {
            self.conn.set_wm_state(win, WmState::Withdrawn);
        } else {
            self.unmanage(win, false);
        }
    }

    fn handle_destroy_notify(&mut self, win: Window) {
        self.ipc.forget(win);
        self.unmanage(win, true);
    }

    /**
     * Grant, adjust or refuse a geometry request.
     *
     * Floating windows (and any window on a monitor that does not arrange)
     * get what they ask for, pulled back onto their monitor if it would
     * leave it. Tiled windows only learn their current geometry again.
     * Windows we do not manage are configured as requested; a control
     * window uses the request to announce itself.
     */
    fn handle_configure_request(&mut self, req: ConfigureRequest) {
        let win = req.id;
        let c = match self.clients.get_mut(&win) {
            Some(c) => c,
            None => {
                self.ipc.accept(self.conn, win);
                self.conn.configure_unmanaged(&req);
                return;
            }
        };

        if req.has(CONFIG_WINDOW_BORDER_WIDTH) {
            c.bw = req.bw;
        }
        let m = c.mon;
        let arranges = self.monitors[m].layout().arranges();
        if !c.floating && arranges {
            let (geom, bw) = (c.geom, c.bw);
            self.conn.send_configure_notify(win, geom, bw);
            return;
        }

        let screen = self.monitors[m].screen;
        c.old_geom = c.geom;
        if req.has(CONFIG_WINDOW_X) {
            c.geom.x = screen.x + req.geom.x;
        }
        if req.has(CONFIG_WINDOW_Y) {
            c.geom.y = screen.y + req.geom.y;
        }
        if req.has(CONFIG_WINDOW_WIDTH) {
            c.geom.w = req.geom.w;
        }
        if req.has(CONFIG_WINDOW_HEIGHT) {
            c.geom.h = req.geom.h;
        }
        if c.floating {
            if c.geom.x + c.geom.w > screen.x + screen.w {
                c.geom.x = screen.x + (screen.w / 2 - c.width() / 2);
            }
            if c.geom.y + c.geom.h > screen.y + screen.h {
                c.geom.y = screen.y + (screen.h / 2 - c.height() / 2);
            }
        }
        let (geom, bw) = (c.geom, c.bw);
        let resized = req.has(CONFIG_WINDOW_WIDTH) || req.has(CONFIG_WINDOW_HEIGHT);
        let visible = self.is_visible(win);

        if resized {
            if visible {
                self.conn.configure(win, geom, bw);
            }
        } else {
            self.conn.send_configure_notify(win, geom, bw);
            if visible {
                self.conn.move_window(win, geom.x, geom.y);
            }
        }
    }

    /// The root window changed size: monitors are re-read and fullscreen
    /// windows follow their monitor.
    fn handle_screen_change(&mut self, geom: Rectangle) {
        let size = (geom.w, geom.h);
        let changed = size != self.screen;
        self.screen = size;
        if !self.update_geom() && !changed {
            return;
        }
        info!("screen changed to {}x{}", geom.w, geom.h);
        let fullscreen: Vec<(Window, Rectangle)> = self
            .clients
            .iter()
            .filter(|(_, c)| c.fullscreen)
            .map(|(&w, c)| (w, self.monitors[c.mon].screen))
            .collect();
        for (win, screen) in fullscreen {
            self.resize_client(win, screen);
        }
        self.focus(None);
        self.arrange(None);
    }

    fn handle_enter_notify(&mut self, win: Window, crossing: bool) {
        if !crossing && win != self.conn.root() {
            return;
        }
        let managed = self.clients.contains_key(&win);
        let m = self.win_to_mon(win);
        if m != self.selmon {
            if let Some(sel) = self.selected_client() {
                self.unfocus(sel, true);
            }
            self.selmon = m;
        } else if !managed || self.selected_client() == Some(win) {
            return;
        }
        self.focus(Some(win).filter(|_| managed));
    }

    /// Select the monitor the pointer moved onto. Motion that stays on the
    /// monitor of the previous motion leaves the selection alone, so a
    /// keyboard monitor switch survives small pointer moves.
    fn handle_motion_notify(&mut self, win: Window, x: i32, y: i32) {
        if win != self.conn.root() {
            return;
        }
        let m = self.rect_to_mon(&Rectangle::new(x, y, 1, 1));
        let crossed = self.motion_mon.map_or(false, |last| last != m);
        self.motion_mon = Some(m);
        if crossed && m != self.selmon {
            if let Some(sel) = self.selected_client() {
                self.unfocus(sel, true);
            }
            self.selmon = m;
            self.focus(None);
        }
    }

    /// Some clients grab focus themselves; hand it back to the selection.
    fn handle_focus_in(&mut self, win: Window) {
        if let Some(sel) = self.selected_client() {
            if sel != win {
                self.set_focus(sel);
            }
        }
    }

    fn handle_property_notify(&mut self, win: Window, property: Property, deleted: bool, is_root: bool) {
        if deleted || is_root {
            return;
        }
        if property == Property::IpcCommand {
            self.handle_ipc(win);
            return;
        }
        if !self.clients.contains_key(&win) {
            return;
        }
        match property {
            Property::Name => self.update_title(win),
            Property::Hints => self.update_wm_hints(win),
            Property::NormalHints => {
                if let Some(c) = self.clients.get_mut(&win) {
                    c.hints_valid = false;
                }
            }
            Property::TransientFor => {
                let parent_managed = self
                    .conn
                    .transient_for(win)
                    .map_or(false, |p| self.clients.contains_key(&p));
                let m = match self.clients.get_mut(&win) {
                    Some(c) if !c.floating && parent_managed => {
                        c.floating = true;
                        c.mon
                    }
                    _ => return,
                };
                self.arrange(Some(m));
            }
            Property::WindowType => self.update_window_type(win),
            _ => (),
        }
    }

    fn handle_client_message(&mut self, win: Window, request: ClientRequest) {
        let (fullscreen, urgent) = match self.clients.get(&win) {
            Some(c) => (c.fullscreen, c.urgent),
            None => return,
        };
        match request {
            ClientRequest::Fullscreen(action) => self.set_fullscreen(win, action.apply(fullscreen)),
            ClientRequest::Activate => {
                if self.selected_client() != Some(win) && !urgent {
                    self.set_urgent(win, true);
                }
            }
        }
    }

    fn handle_ipc(&mut self, win: Window) {
        let reply = match self.ipc.read_command(self.conn, win) {
            Some(Ok(command)) => {
                info!("ipc: {:?}", command);
                self.handle_command(command)
            }
            Some(Err(e)) => {
                warn!("ipc: {}", e);
                Reply::Error(e.to_string())
            }
            None => return,
        };
        self.ipc.reply(self.conn, win, reply);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bindings::{KeyMode, MOD_4},
        config::Config,
        geometry::Rectangle,
        ipc::{IPC_STATE_SERVER_READY, IPC_STATE_SUCCESS, IPC_WINDOW_CLASS},
        keysym::{keysym_from_name, XK_ESCAPE},
        mock::{Call, MockXConn, RecordingSpawner, NUMLOCK, ROOT},
        monitor::Layout,
        tag::tag,
        wm::WindowManager,
        xconnection::{
            ClientRequest, ConfigureRequest, Property, StateAction, TextProperty, WmState, XConn,
            XEvent, CONFIG_WINDOW_HEIGHT, CONFIG_WINDOW_WIDTH, CONFIG_WINDOW_X, CONFIG_WINDOW_Y,
        },
    };

    fn config() -> Config {
        Config {
            memory_path: None,
            ..Config::default()
        }
    }

    fn started<'a>(conn: &'a MockXConn, spawner: &'a RecordingSpawner, config: Config) -> WindowManager<'a, MockXConn> {
        let mut wm = WindowManager::new(conn, spawner, config).unwrap();
        wm.setup().unwrap();
        spawner.clear();
        wm
    }

    fn map(wm: &mut WindowManager<'_, MockXConn>, conn: &MockXConn, win: u32, class: &str) {
        conn.add_window(win, class, &class.to_lowercase());
        wm.handle_event(XEvent::MapRequest { id: win });
    }

    fn press(wm: &mut WindowManager<'_, MockXConn>, conn: &MockXConn, mods: u16, name: &str) {
        let sym = keysym_from_name(name).unwrap();
        wm.handle_event(conn.key_press(mods, sym));
    }

    fn request(id: u32, value_mask: u16, geom: Rectangle) -> ConfigureRequest {
        ConfigureRequest {
            id,
            value_mask,
            geom,
            bw: 0,
            sibling: 0,
            stack_mode: 0,
        }
    }

    #[test]
    fn map_requests_manage_each_window_once() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        wm.handle_event(XEvent::MapRequest { id: 10 });
        conn.add_window(11, "Menu", "menu");
        conn.update(11, |w| w.override_redirect = true);
        wm.handle_event(XEvent::MapRequest { id: 11 });

        assert_eq!(conn.client_list(), vec![10]);
        assert!(conn.window(10).viewable);
        assert!(wm.client(11).is_none());
    }

    #[test]
    fn mod_j_focuses_the_previous_window_once() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        for win in 10..13 {
            map(&mut wm, &conn, win, "URxvt");
        }
        // client list is 12, 11, 10
        press(&mut wm, &conn, MOD_4, "j");
        assert_eq!(wm.selected_client(), Some(10));
        press(&mut wm, &conn, MOD_4 | NUMLOCK, "j");
        assert_eq!(wm.selected_client(), Some(11));
    }

    #[test]
    fn escape_leaves_a_mode_without_running_anything() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        press(&mut wm, &conn, MOD_4, "w");
        assert_eq!(wm.bindings().mode(), KeyMode::Window);
        spawner.clear();

        wm.handle_event(conn.key_press(MOD_4, XK_ESCAPE));
        assert_eq!(wm.bindings().mode(), KeyMode::Normal);
        assert_eq!(spawner.commands(), vec![crate::notify::mode("Normal")]);
        assert_eq!(wm.selected_client(), Some(10));
    }

    #[test]
    fn window_mode_bindings_replace_normal_ones() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        press(&mut wm, &conn, MOD_4, "w");

        // M-k closes in normal mode but focuses the next window here
        press(&mut wm, &conn, MOD_4, "k");
        assert!(!conn.calls().iter().any(|c| matches!(c, Call::Protocol(..) | Call::Kill(_))));
        press(&mut wm, &conn, MOD_4, "q");
        assert!(conn.calls().iter().any(|c| matches!(c, Call::Protocol(10, _))));
    }

    #[test]
    fn commands_are_spawned() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        press(&mut wm, &conn, MOD_4, "Return");
        assert_eq!(spawner.commands(), vec!["alacritty".to_string()]);
    }

    #[test]
    fn synthetic_unmaps_keep_the_window_managed() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");

        wm.handle_event(XEvent::UnmapNotify { id: 10, synthetic: true });
        assert!(wm.client(10).is_some());
        assert_eq!(conn.window(10).wm_state, Some(WmState::Withdrawn));

        wm.handle_event(XEvent::UnmapNotify { id: 10, synthetic: false });
        assert!(wm.client(10).is_none());
        assert!(conn.client_list().is_empty());
    }

    #[test]
    fn destroyed_windows_are_forgotten() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        map(&mut wm, &conn, 11, "Firefox");
        wm.handle_event(XEvent::DestroyNotify { id: 11 });

        assert!(wm.client(11).is_none());
        assert_eq!(wm.selected_client(), Some(10));
        assert_eq!(conn.focused(), Some(10));
    }

    #[test]
    fn unmanaged_configure_requests_pass_through() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        conn.add_window(20, "Splash", "splash");
        let req = request(20, CONFIG_WINDOW_X | CONFIG_WINDOW_WIDTH, Rectangle::new(300, 0, 800, 0));
        wm.handle_event(XEvent::ConfigureRequest(req));

        assert_eq!(conn.calls(), vec![Call::ConfigureUnmanaged(req)]);
        assert_eq!(conn.geometry(20), Rectangle::new(300, 10, 800, 480));
    }

    #[test]
    fn tiled_windows_are_told_their_geometry() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        conn.clear_calls();

        let req = request(10, CONFIG_WINDOW_WIDTH | CONFIG_WINDOW_HEIGHT, Rectangle::new(0, 0, 300, 200));
        wm.handle_event(XEvent::ConfigureRequest(req));
        let geom = Rectangle::new(0, 0, 1918, 1078);
        assert_eq!(conn.calls(), vec![Call::SyntheticNotify(10, geom, 1)]);
        assert_eq!(wm.client(10).unwrap().geometry(), geom);
    }

    #[test]
    fn floating_windows_get_what_they_ask_for() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "Gimp");
        wm.toggle_floating();
        conn.clear_calls();

        let resize = request(10, CONFIG_WINDOW_WIDTH | CONFIG_WINDOW_HEIGHT, Rectangle::new(0, 0, 300, 200));
        wm.handle_event(XEvent::ConfigureRequest(resize));
        let geom = Rectangle::new(0, 0, 300, 200);
        assert_eq!(conn.calls(), vec![Call::Configure(10, geom, 1)]);

        conn.clear_calls();
        let mv = request(10, CONFIG_WINDOW_X | CONFIG_WINDOW_Y, Rectangle::new(100, 50, 0, 0));
        wm.handle_event(XEvent::ConfigureRequest(mv));
        let geom = Rectangle::new(100, 50, 300, 200);
        assert_eq!(
            conn.calls(),
            vec![Call::SyntheticNotify(10, geom, 1), Call::Move(10, 100, 50)]
        );
        assert_eq!(wm.client(10).unwrap().geometry(), geom);
    }

    #[test]
    fn oversized_floating_windows_are_recentred() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut config = config();
        config.layouts = vec![Layout::Floating];
        let mut wm = started(&conn, &spawner, config);
        map(&mut wm, &conn, 10, "Gimp");
        wm.toggle_floating();

        let req = request(10, CONFIG_WINDOW_X | CONFIG_WINDOW_WIDTH, Rectangle::new(1800, 0, 400, 0));
        wm.handle_event(XEvent::ConfigureRequest(req));
        assert_eq!(wm.client(10).unwrap().geometry().x, 960 - 201);
    }

    #[test]
    fn fullscreen_requests_toggle_and_restore() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "mpv");
        let tiled = wm.client(10).unwrap().geometry();

        let toggle = XEvent::ClientMessage {
            id: 10,
            request: ClientRequest::Fullscreen(StateAction::Toggle),
        };
        wm.handle_event(toggle.clone());
        assert!(wm.client(10).unwrap().is_fullscreen());
        assert_eq!(conn.geometry(10), Rectangle::new(0, 0, 1920, 1080));

        wm.handle_event(toggle);
        let c = wm.client(10).unwrap();
        assert!(!c.is_fullscreen());
        assert_eq!(c.geometry(), tiled);
        assert!(!conn.window(10).fullscreen);
    }

    #[test]
    fn activation_marks_background_windows_urgent() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "Slack");
        map(&mut wm, &conn, 11, "URxvt");

        wm.handle_event(XEvent::ClientMessage {
            id: 10,
            request: ClientRequest::Activate,
        });
        assert!(wm.client(10).unwrap().is_urgent());
        assert_eq!(wm.selected_client(), Some(11));
    }

    #[test]
    fn title_changes_are_picked_up() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        conn.update(10, |w| w.title = Some("vim".into()));
        wm.handle_event(XEvent::PropertyNotify {
            id: 10,
            property: Property::Name,
            deleted: false,
            is_root: false,
        });
        assert_eq!(wm.client(10).unwrap().name(), "vim");
    }

    #[test]
    fn focus_follows_the_pointer_across_monitors() {
        let conn = MockXConn::dual();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        assert_eq!(wm.selected_monitor(), 0);

        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 100, y: 100 });
        assert_eq!(wm.selected_monitor(), 0);
        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 2500, y: 500 });
        assert_eq!(wm.selected_monitor(), 1);
        assert_eq!(wm.selected_client(), None);
        assert_eq!(conn.focused(), None);

        wm.handle_event(XEvent::EnterNotify {
            id: 10,
            x: 100,
            y: 100,
            crossing: true,
        });
        assert_eq!(wm.selected_monitor(), 0);
        assert_eq!(conn.focused(), Some(10));
    }

    #[test]
    fn small_pointer_moves_keep_a_keyboard_monitor_switch() {
        let conn = MockXConn::dual();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 100, y: 100 });

        wm.focus_mon(1);
        assert_eq!(wm.selected_monitor(), 1);
        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 105, y: 102 });
        assert_eq!(wm.selected_monitor(), 1);
        assert_eq!(conn.focused(), None);

        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 2500, y: 500 });
        assert_eq!(wm.selected_monitor(), 1);
        wm.handle_event(XEvent::MotionNotify { id: ROOT, x: 100, y: 100 });
        assert_eq!(wm.selected_monitor(), 0);
        assert_eq!(conn.focused(), Some(10));
    }

    #[test]
    fn stolen_focus_is_returned() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "URxvt");
        map(&mut wm, &conn, 11, "URxvt");
        conn.focus(10);
        wm.handle_event(XEvent::FocusIn { id: 10 });
        assert_eq!(conn.focused(), Some(11));
    }

    #[test]
    fn screen_resize_rebuilds_monitors() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        map(&mut wm, &conn, 10, "mpv");
        wm.set_fullscreen(10, true);

        conn.set_screen(vec![Rectangle::new(0, 0, 2560, 1440)], (2560, 1440));
        wm.handle_event(XEvent::ConfigureNotify {
            id: ROOT,
            geom: Rectangle::new(0, 0, 2560, 1440),
            is_root: true,
        });
        assert_eq!(wm.monitors()[0].screen(), Rectangle::new(0, 0, 2560, 1440));
        assert_eq!(wm.client(10).unwrap().geometry(), Rectangle::new(0, 0, 2560, 1440));
    }

    fn ipc_command(wm: &mut WindowManager<'_, MockXConn>, conn: &MockXConn, win: u32, cmd: &str) -> Option<String> {
        conn.add_window(win, IPC_WINDOW_CLASS, IPC_WINDOW_CLASS);
        wm.handle_event(XEvent::ConfigureRequest(request(win, 0, Rectangle::default())));
        assert_eq!(conn.window(win).state.as_deref(), Some(IPC_STATE_SERVER_READY));
        conn.set_text_property(win, TextProperty::IpcCommand, cmd);
        wm.handle_event(XEvent::PropertyNotify {
            id: win,
            property: Property::IpcCommand,
            deleted: false,
            is_root: false,
        });
        conn.window(win).state
    }

    #[test]
    fn ipc_bindkey_takes_effect_immediately() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());
        let grabs = conn.grabs().len();

        let state = ipc_command(&mut wm, &conn, 50, "bindkey normal M-S-z exec slock");
        assert_eq!(state.as_deref(), Some(IPC_STATE_SUCCESS));
        assert!(conn.grabs().len() > grabs);

        press(&mut wm, &conn, MOD_4 | crate::bindings::MOD_SHIFT, "z");
        assert_eq!(spawner.commands(), vec!["slock".to_string()]);
    }

    #[test]
    fn ipc_errors_are_reported_back() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());

        let state = ipc_command(&mut wm, &conn, 50, "unbindkey normal M-S-z");
        assert_eq!(state.as_deref(), Some("error: no such binding"));
        let state = ipc_command(&mut wm, &conn, 51, "frobnicate");
        assert_eq!(state.as_deref(), Some("error: unknown command 'frobnicate'"));
    }

    #[test]
    fn ipc_mode_and_quit() {
        let conn = MockXConn::single();
        let spawner = RecordingSpawner::default();
        let mut wm = started(&conn, &spawner, config());

        ipc_command(&mut wm, &conn, 50, "mode tag");
        assert_eq!(wm.bindings().mode(), KeyMode::Tag);
        press(&mut wm, &conn, MOD_4, "3");
        assert_eq!(wm.monitors()[0].view(), tag(3));

        conn.push_event(XEvent::PropertyNotify {
            id: 51,
            property: Property::IpcCommand,
            deleted: false,
            is_root: false,
        });
        conn.add_window(51, IPC_WINDOW_CLASS, IPC_WINDOW_CLASS);
        wm.handle_event(XEvent::ConfigureRequest(request(51, 0, Rectangle::default())));
        conn.set_text_property(51, TextProperty::IpcCommand, "quit");
        wm.run().unwrap();
        assert!(!wm.is_running());
        assert_eq!(conn.window(51).state.as_deref(), Some(IPC_STATE_SUCCESS));
    }
}
