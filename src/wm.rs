//! The window manager context: every managed window, every monitor and the
//! focus/stack controller acting on them.
use std::collections::HashMap;

use anyhow::Result;
use xcb::Window;

use crate::{
    action::{Action, Bound},
    bindings::{Bindings, KeyMode},
    client::{Client, BROKEN},
    config::Config,
    geometry::{apply_size_hints, Bounds, Rectangle, SizeHints},
    ipc::{Command, IpcServer, Reply},
    memory::{Update, WorkspaceMemory},
    monitor::{Layout, Monitor},
    notify,
    rules::apply_rules,
    spawn::Spawner,
    tag::{first_tag, tag, TAGMASK},
    xconnection::{WmProtocol, WmState, XConn},
};

pub struct WindowManager<'a, X: XConn> {
    pub(crate) conn: &'a X,
    spawner: &'a dyn Spawner,
    pub(crate) config: Config,
    pub(crate) screen: (i32, i32),
    pub(crate) monitors: Vec<Monitor>,
    pub(crate) selmon: usize,
    /// Monitor under the pointer at the last root motion.
    pub(crate) motion_mon: Option<usize>,
    pub(crate) clients: HashMap<Window, Client>,
    pub(crate) memory: WorkspaceMemory,
    pub(crate) bindings: Bindings,
    pub(crate) ipc: IpcServer,
    running: bool,
}

impl<'a, X: XConn> WindowManager<'a, X> {
    /// Validate `config`, compile its bindings and load the workspace memory.
    /// Nothing is asked of the X server beyond its screen layout.
    pub fn new(conn: &'a X, spawner: &'a dyn Spawner, config: Config) -> Result<Self> {
        config.validate()?;
        let mut bindings = Bindings::new(config.keys.clone());
        let (mods, sym) = config.reset_key()?;
        bindings.set_reset_key(mods, sym);
        for binding in config.compile_bindings()? {
            bindings.register(binding)?;
        }
        let memory = match &config.memory_path {
            Some(path) => WorkspaceMemory::load(path),
            None => WorkspaceMemory::new(),
        };

        let mut wm = WindowManager {
            conn,
            spawner,
            config,
            screen: conn.screen_size(),
            monitors: Vec::new(),
            selmon: 0,
            motion_mon: None,
            clients: HashMap::new(),
            memory,
            bindings,
            ipc: IpcServer::new(),
            running: false,
        };
        wm.update_geom();
        Ok(wm)
    }

    /// Take over the display: claim the root window, grab keys and adopt the
    /// windows that are already mapped.
    pub fn setup(&mut self) -> Result<()> {
        self.conn.become_wm()?;
        self.bindings.set_numlock_mask(self.conn.numlock_mask());
        self.grab_keys();
        self.scan();
        self.focus(None);
        self.notify(notify::startup());
        self.conn.flush();
        info!(
            "managing {} windows on {} monitors",
            self.clients.len(),
            self.monitors.len()
        );
        Ok(())
    }

    /// Handle events until a quit is requested. Protocol errors caused by
    /// windows vanishing mid-request are skipped, anything else ends the loop.
    pub fn run(&mut self) -> Result<()> {
        self.running = true;
        while self.running {
            match self.conn.wait_for_event() {
                Ok(event) => self.handle_event(event),
                Err(e) if e.is_ignorable() => debug!("ignoring X error: {}", e),
                Err(e) => {
                    error!("fatal X error: {}", e);
                    return Err(e.into());
                }
            }
            self.conn.flush();
        }
        Ok(())
    }

    /// Release every window and the display, persisting the workspace memory.
    pub fn cleanup(&mut self) {
        if let Some(path) = &self.config.memory_path {
            if let Err(e) = self.memory.save(path) {
                warn!("{:#}", e);
            }
        }
        let wins: Vec<Window> = self.clients.keys().copied().collect();
        for win in wins {
            self.unmanage(win, false);
        }
        self.conn.cleanup();
        self.conn.flush();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn client(&self, win: Window) -> Option<&Client> {
        self.clients.get(&win)
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn selected_monitor(&self) -> usize {
        self.selmon
    }

    pub fn selected_client(&self) -> Option<Window> {
        self.monitors.get(self.selmon).and_then(|m| m.sel)
    }

    pub fn memory(&self) -> &WorkspaceMemory {
        &self.memory
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub(crate) fn notify(&self, cmd: String) {
        if self.config.audio_feedback {
            self.spawner.spawn(&cmd);
        }
    }

    pub(crate) fn is_visible(&self, win: Window) -> bool {
        self.clients
            .get(&win)
            .map_or(false, |c| c.tags & self.monitors[c.mon].view() != 0)
    }

    fn is_tiled(&self, win: Window) -> bool {
        self.is_visible(win) && self.clients.get(&win).map_or(false, |c| !c.floating)
    }

    /// The monitor overlapping `r` the most, or the selected one.
    pub(crate) fn rect_to_mon(&self, r: &Rectangle) -> usize {
        let mut best = self.selmon;
        let mut area = 0;
        for (i, m) in self.monitors.iter().enumerate() {
            let a = m.area.intersection_area(r);
            if a > area {
                area = a;
                best = i;
            }
        }
        best
    }

    /// The monitor showing `win`: its owner for clients, the one under the
    /// pointer for the root window.
    pub(crate) fn win_to_mon(&self, win: Window) -> usize {
        if win == self.conn.root() {
            if let Some((x, y)) = self.conn.pointer_position() {
                return self.rect_to_mon(&Rectangle::new(x, y, 1, 1));
            }
        }
        self.clients.get(&win).map_or(self.selmon, |c| c.mon)
    }

    fn dir_to_mon(&self, dir: i32) -> usize {
        let n = self.monitors.len();
        if dir > 0 {
            (self.selmon + 1) % n
        } else {
            (self.selmon + n - 1) % n
        }
    }

    /*
     * Client lifecycle
     */

    fn scan(&mut self) {
        let adoptable: Vec<Window> = self
            .conn
            .query_tree()
            .into_iter()
            .filter(|&w| match self.conn.window_attributes(w) {
                Some(a) if !a.override_redirect => {
                    a.viewable || self.conn.wm_state(w) == Some(WmState::Iconic)
                }
                _ => false,
            })
            .collect();
        let (transients, others): (Vec<Window>, Vec<Window>) = adoptable
            .into_iter()
            .partition(|&w| self.conn.transient_for(w).is_some());
        for win in others.into_iter().chain(transients) {
            self.manage(win);
        }
    }

    /**
     * Start managing `win`.
     *
     * Transient windows join their parent's monitor and tags; everything
     * else goes through the workspace memory and the rule table. The window
     * is kept inside its monitor, mapped off-screen first and shown by the
     * arrange pass so it never flashes at its requested position.
     */
    pub(crate) fn manage(&mut self, win: Window) {
        let (geom, bw) = match self.conn.window_geometry(win) {
            Some(g) => g,
            None => {
                debug!("window {} vanished before it could be managed", win);
                return;
            }
        };
        let mut c = Client::new(win, geom, bw, self.selmon);
        c.name = self.conn.window_title(win).unwrap_or_else(|| BROKEN.to_string());
        if let Some((class, instance)) = self.conn.window_class(win) {
            c.class = class;
            c.instance = instance;
        }

        let transient = self.conn.transient_for(win);
        match transient.and_then(|t| self.clients.get(&t)) {
            Some(parent) => {
                c.mon = parent.mon;
                c.tags = parent.tags;
            }
            None => {
                let placement = apply_rules(
                    &self.config.rules,
                    &self.memory,
                    &c.class,
                    &c.instance,
                    &c.name,
                    &self.monitors,
                    self.selmon,
                );
                c.mon = placement.monitor;
                c.tags = placement.tags;
                c.floating = placement.floating;
                if let Some(n) = placement.remembered {
                    info!("placing {} on remembered tag {}", c.app_name(), n);
                    if let Some(cmd) = notify::tag_placement(c.app_name(), n) {
                        self.notify(cmd);
                    }
                }
            }
        }

        let area = self.monitors[c.mon].area;
        if c.geom.x + c.width() > area.x + area.w {
            c.geom.x = area.x + area.w - c.width();
        }
        if c.geom.y + c.height() > area.y + area.h {
            c.geom.y = area.y + area.h - c.height();
        }
        c.geom.x = c.geom.x.max(area.x);
        c.geom.y = c.geom.y.max(area.y);
        c.bw = self.config.border_width_px as i32;

        debug!("managing {} ({}) on monitor {} tags {:#b}", win, c.app_name(), c.mon, c.tags);
        let (m, geom, bw) = (c.mon, c.geom, c.bw);
        self.clients.insert(win, c);

        self.conn.set_border_width(win, bw);
        self.conn.set_border_color(win, self.config.unfocused_border_color);
        self.conn.send_configure_notify(win, geom, bw);
        self.update_window_type(win);
        self.update_size_hints(win);
        self.update_wm_hints(win);
        self.conn.select_client_events(win);

        let floating = match self.clients.get_mut(&win) {
            Some(c) => {
                if !c.floating {
                    c.floating = transient.is_some() || c.fixed;
                    c.old_state = c.floating;
                }
                c.floating
            }
            None => return,
        };
        if floating {
            self.conn.raise(win);
        }

        self.monitors[m].attach(win);
        self.monitors[m].attach_stack(win);
        self.update_client_list();
        // mapped off-screen: the arrange pass moves it into place
        self.conn.move_window(win, geom.x + 2 * self.screen.0, geom.y);
        self.conn.set_wm_state(win, WmState::Normal);
        if m == self.selmon {
            if let Some(sel) = self.monitors[m].sel {
                self.unfocus(sel, false);
            }
        }
        self.monitors[m].sel = Some(win);
        self.arrange(Some(m));
        self.conn.map(win);
        self.focus(None);
    }

    /// Stop managing `win`. A destroyed window can no longer be restored.
    pub(crate) fn unmanage(&mut self, win: Window, destroyed: bool) {
        let c = match self.clients.remove(&win) {
            Some(c) => c,
            None => return,
        };
        let m = c.mon;
        self.monitors[m].detach(win);
        self.monitors[m].detach_stack(win);
        self.reselect(m);
        if !destroyed {
            self.conn.set_border_width(win, c.old_bw);
            self.conn.set_wm_state(win, WmState::Withdrawn);
        }
        debug!("unmanaged {} ({})", win, c.app_name());
        self.focus(None);
        self.update_client_list();
        self.arrange(Some(m));
    }

    /// Give monitor `m` a selection again after its selection left.
    fn reselect(&mut self, m: usize) {
        if self.monitors[m].sel.is_none() {
            let next = self.monitors[m].stack().copied().find(|&w| self.is_visible(w));
            self.monitors[m].sel = next;
        }
    }

    pub(crate) fn update_client_list(&self) {
        let wins: Vec<Window> = self
            .monitors
            .iter()
            .flat_map(|m| m.clients().copied())
            .collect();
        self.conn.set_client_list(&wins);
    }

    pub(crate) fn update_title(&mut self, win: Window) {
        let title = self.conn.window_title(win).unwrap_or_else(|| BROKEN.to_string());
        if let Some(c) = self.clients.get_mut(&win) {
            c.name = title;
        }
    }

    pub(crate) fn update_window_type(&mut self, win: Window) {
        if self.conn.requests_fullscreen(win) {
            self.set_fullscreen(win, true);
        }
        if self.conn.is_dialog(win) {
            if let Some(c) = self.clients.get_mut(&win) {
                c.floating = true;
            }
        }
    }

    pub(crate) fn update_size_hints(&mut self, win: Window) {
        let hints = SizeHints::from_raw(&self.conn.normal_hints(win));
        if let Some(c) = self.clients.get_mut(&win) {
            c.hints = hints;
            c.fixed = hints.is_fixed();
            c.hints_valid = true;
        }
    }

    pub(crate) fn update_wm_hints(&mut self, win: Window) {
        let hints = match self.conn.wm_hints(win) {
            Some(h) => h,
            None => return,
        };
        let selected = self.selected_client() == Some(win);
        if selected && hints.urgent {
            self.conn.set_urgency_hint(win, false);
        }
        if let Some(c) = self.clients.get_mut(&win) {
            if !selected {
                c.urgent = hints.urgent;
            }
            c.never_focus = hints.input == Some(false);
            if c.urgent {
                self.conn.set_border_color(win, self.config.urgent_border_color);
            }
        }
    }

    pub(crate) fn set_urgent(&mut self, win: Window, urgent: bool) {
        if let Some(c) = self.clients.get_mut(&win) {
            c.urgent = urgent;
            self.conn.set_urgency_hint(win, urgent);
            if urgent {
                self.conn.set_border_color(win, self.config.urgent_border_color);
            }
        }
    }

    /// Enter or leave fullscreen, saving and restoring the previous
    /// geometry, border and floating state.
    pub(crate) fn set_fullscreen(&mut self, win: Window, fullscreen: bool) {
        let c = match self.clients.get_mut(&win) {
            Some(c) => c,
            None => return,
        };
        if fullscreen && !c.fullscreen {
            c.fullscreen = true;
            c.old_state = c.floating;
            c.old_bw = c.bw;
            c.bw = 0;
            c.floating = true;
            let screen = self.monitors[c.mon].screen;
            self.conn.set_fullscreen_state(win, true);
            self.resize_client(win, screen);
            self.conn.raise(win);
        } else if !fullscreen && c.fullscreen {
            c.fullscreen = false;
            c.floating = c.old_state;
            c.bw = c.old_bw;
            c.geom = c.old_geom;
            let (m, geom) = (c.mon, c.geom);
            self.conn.set_fullscreen_state(win, false);
            self.resize_client(win, geom);
            self.arrange(Some(m));
        }
    }

    /*
     * Focus and stacking
     */

    /**
     * Focus `target`, or the most recently focused visible window on the
     * selected monitor when `target` is `None` or hidden.
     *
     * The previous selection loses focus first, so at most one window is
     * ever focused. Focusing a window on another monitor selects that
     * monitor.
     */
    pub fn focus(&mut self, target: Option<Window>) {
        let target = target.filter(|&w| self.is_visible(w)).or_else(|| {
            self.monitors[self.selmon]
                .stack()
                .copied()
                .find(|&w| self.is_visible(w))
        });
        if let Some(prev) = self.monitors[self.selmon].sel.filter(|&p| Some(p) != target) {
            self.unfocus(prev, false);
        }

        let picked = target.and_then(|w| self.clients.get(&w).map(|c| (w, c.mon, c.urgent)));
        match picked {
            Some((win, m, urgent)) => {
                self.selmon = m;
                if urgent {
                    self.set_urgent(win, false);
                }
                self.monitors[m].raise_in_stack(win);
                self.conn.set_border_color(win, self.config.focused_border_color);
                self.set_focus(win);
                self.monitors[m].sel = Some(win);
            }
            None => {
                self.conn.focus_root();
                self.monitors[self.selmon].sel = None;
            }
        }
    }

    pub(crate) fn unfocus(&mut self, win: Window, set_focus: bool) {
        if !self.clients.contains_key(&win) {
            return;
        }
        self.conn.set_border_color(win, self.config.unfocused_border_color);
        if set_focus {
            self.conn.focus_root();
        }
    }

    /// Hand input focus to `win`, unless it never takes input, and offer
    /// it WM_TAKE_FOCUS either way.
    pub(crate) fn set_focus(&mut self, win: Window) {
        let never_focus = self.clients.get(&win).map_or(true, |c| c.never_focus);
        if !never_focus {
            self.conn.focus(win);
        }
        self.conn.send_protocol(win, WmProtocol::TakeFocus);
    }

    /// Show, hide and lay out the windows of monitor `mon`, or of every
    /// monitor for `None`.
    pub fn arrange(&mut self, mon: Option<usize>) {
        match mon {
            Some(m) => {
                self.showhide(m);
                self.arrange_monitor(m);
                self.restack(m);
            }
            None => {
                for m in 0..self.monitors.len() {
                    self.showhide(m);
                }
                for m in 0..self.monitors.len() {
                    self.arrange_monitor(m);
                }
            }
        }
    }

    fn arrange_monitor(&mut self, m: usize) {
        match self.monitors[m].layout() {
            Layout::Monocle => self.monocle(m),
            Layout::Floating => {}
        }
    }

    /// Visible windows move on-screen top of the stack first, hidden ones
    /// move off-screen to the left bottom first.
    fn showhide(&mut self, m: usize) {
        let arranges = self.monitors[m].layout().arranges();
        let (shown, hidden): (Vec<Window>, Vec<Window>) = self.monitors[m]
            .stack()
            .copied()
            .partition(|&w| self.is_visible(w));

        for win in shown {
            let (geom, floating, fullscreen) = match self.clients.get(&win) {
                Some(c) => (c.geom, c.floating, c.fullscreen),
                None => continue,
            };
            self.conn.move_window(win, geom.x, geom.y);
            if (!arranges || floating) && !fullscreen {
                self.resize(win, geom, false);
            }
        }
        for win in hidden.into_iter().rev() {
            if let Some(c) = self.clients.get(&win) {
                self.conn.move_window(win, -2 * c.width(), c.geom.y);
            }
        }
    }

    /// Every visible tiled window fills the usable area, in list order.
    fn monocle(&mut self, m: usize) {
        let area = self.monitors[m].area;
        let tiled: Vec<Window> = self.monitors[m]
            .clients()
            .copied()
            .filter(|&w| self.is_tiled(w))
            .collect();
        for win in tiled {
            let bw = self.clients.get(&win).map_or(0, |c| c.bw);
            let r = Rectangle::new(area.x, area.y, area.w - 2 * bw, area.h - 2 * bw);
            self.resize(win, r, false);
        }
    }

    /// Raise a floating selection, keep tiled windows below in stack order.
    pub(crate) fn restack(&mut self, m: usize) {
        let sel = match self.monitors[m].sel {
            Some(sel) => sel,
            None => return,
        };
        let arranges = self.monitors[m].layout().arranges();
        if !arranges || self.clients.get(&sel).map_or(false, |c| c.floating) {
            self.conn.raise(sel);
        }
        if arranges {
            let tiled: Vec<Window> = self.monitors[m]
                .stack()
                .copied()
                .filter(|&w| self.is_tiled(w))
                .collect();
            for win in tiled {
                self.conn.lower(win);
            }
        }
        self.conn.drop_enter_events();
    }

    /*
     * Geometry
     */

    /// Resize `win` to `geom` after applying its size constraints. Nothing
    /// is sent when the constrained geometry matches the current one.
    pub(crate) fn resize(&mut self, win: Window, geom: Rectangle, interact: bool) {
        let (mon, floating, hints_valid) = match self.clients.get(&win) {
            Some(c) => (c.mon, c.floating, c.hints_valid),
            None => return,
        };
        let honour = self.config.resize_hints || floating || !self.monitors[mon].layout().arranges();
        if honour && !hints_valid {
            self.update_size_hints(win);
        }

        let c = match self.clients.get(&win) {
            Some(c) => c,
            None => return,
        };
        let bounds = Bounds {
            screen_w: self.screen.0,
            screen_h: self.screen.1,
            area: self.monitors[c.mon].area,
            min_dim: self.config.bar_height as i32,
        };
        let hints = if honour { Some(&c.hints) } else { None };
        let (r, changed) = apply_size_hints(geom, c.geom, c.bw, hints, interact, &bounds);
        if changed {
            self.resize_client(win, r);
        }
    }

    pub(crate) fn resize_client(&mut self, win: Window, r: Rectangle) {
        let bw = match self.clients.get_mut(&win) {
            Some(c) => {
                c.old_geom = c.geom;
                c.geom = r;
                c.bw
            }
            None => return,
        };
        self.conn.configure(win, r, bw);
        self.conn.send_configure_notify(win, r, bw);
    }

    /**
     * Re-read the monitor layout.
     *
     * New outputs get a fresh monitor, vanished ones hand their windows to
     * the first monitor. Returns whether anything changed.
     */
    pub(crate) fn update_geom(&mut self) -> bool {
        let mut geoms = self.conn.monitor_geometries();
        if geoms.is_empty() {
            geoms.push(Rectangle::new(0, 0, self.screen.0, self.screen.1));
        }
        let mut dirty = false;
        let layouts = self.config.layout_slots();

        for (i, &g) in geoms.iter().enumerate() {
            if i >= self.monitors.len() {
                self.monitors.push(Monitor::new(i, g, layouts));
                dirty = true;
            } else if self.monitors[i].screen != g {
                self.monitors[i].screen = g;
                dirty = true;
            } else {
                continue;
            }
            info!("monitor {}: {:?}", i, g);
            self.monitors[i].update_area(
                self.config.show_bar,
                self.config.top_bar,
                self.config.bar_height as i32,
            );
        }

        while self.monitors.len() > geoms.len() {
            let gone = self.monitors.len() - 1;
            let wins: Vec<Window> = self.monitors[gone].clients().copied().collect();
            for win in wins.into_iter().rev() {
                self.monitors[gone].detach(win);
                self.monitors[gone].detach_stack(win);
                if let Some(c) = self.clients.get_mut(&win) {
                    c.mon = 0;
                }
                self.monitors[0].attach(win);
                self.monitors[0].attach_stack(win);
            }
            info!("monitor {} removed", gone);
            self.monitors.pop();
            dirty = true;
        }

        if dirty {
            self.selmon = 0;
            self.selmon = self.win_to_mon(self.conn.root());
        }
        dirty
    }

    /*
     * Actions
     */

    pub fn run_bound(&mut self, bound: Bound) {
        if let Some(cmd) = bound.command {
            self.spawner.spawn(&cmd);
        } else if let Some(action) = bound.action {
            self.run_action(action);
        }
    }

    pub fn run_action(&mut self, action: Action) {
        debug!("running action {}", action);
        match action {
            Action::ViewTag(n) => self.view(tag(n)),
            Action::ViewLast => self.view(0),
            Action::MoveToTag(n) => self.tag(tag(n)),
            Action::FocusNext => self.focus_stack(1),
            Action::FocusPrevious => self.focus_stack(-1),
            Action::FocusMonitorNext => self.focus_mon(1),
            Action::FocusMonitorPrevious => self.focus_mon(-1),
            Action::SendToMonitorNext => self.tag_mon(1),
            Action::SendToMonitorPrevious => self.tag_mon(-1),
            Action::ToggleFloating => self.toggle_floating(),
            Action::CloseWindow => self.close_window(),
            Action::SetLayout(layout) => self.set_layout(layout),
            Action::SetMode(mode) => self.set_mode(mode),
            Action::ForgetWindow => self.forget_window(),
            Action::Quit => self.quit(),
        }
    }

    /// Show the tags in `mask` on the selected monitor. An empty mask swaps
    /// back to the previous view.
    pub fn view(&mut self, mask: u32) {
        let m = self.selmon;
        if mask & TAGMASK == self.monitors[m].view() {
            return;
        }
        self.monitors[m].seltags ^= 1;
        if mask & TAGMASK != 0 {
            let seltags = self.monitors[m].seltags;
            self.monitors[m].tagset[seltags] = mask & TAGMASK;
            if let Some(n) = first_tag(mask) {
                self.notify(notify::tag(n));
            }
        }
        self.focus(None);
        self.arrange(Some(m));
    }

    /// Move the selected window to the tags in `mask` and remember the
    /// choice for its application.
    pub fn tag(&mut self, mask: u32) {
        let win = match self.selected_client() {
            Some(win) if mask & TAGMASK != 0 => win,
            _ => return,
        };
        let (from, to, class, instance) = match self.clients.get_mut(&win) {
            Some(c) => {
                let from = first_tag(c.tags);
                c.tags = mask & TAGMASK;
                (from, first_tag(c.tags), c.class.clone(), c.instance.clone())
            }
            None => return,
        };
        if let (Some(from), Some(to)) = (from, to) {
            if from != to {
                self.notify(notify::window_move(from, to));
            }
        }
        if let Some(to) = to {
            if class != BROKEN {
                let update = self.memory.update(&class, &instance, to as i32);
                debug!("workspace memory {}/{} -> {}: {:?}", class, instance, to, update);
            }
        }
        self.focus(None);
        self.arrange(Some(self.selmon));
    }

    /// Cycle focus through the visible windows of the selected monitor in
    /// list order. A fullscreen window keeps focus when so configured.
    pub fn focus_stack(&mut self, dir: i32) {
        let sel = match self.selected_client() {
            Some(sel) => sel,
            None => return,
        };
        let fullscreen = self.clients.get(&sel).map_or(false, |c| c.fullscreen);
        if fullscreen && self.config.lock_fullscreen {
            return;
        }
        let visible: Vec<Window> = self.monitors[self.selmon]
            .clients()
            .copied()
            .filter(|&w| self.is_visible(w))
            .collect();
        let i = match visible.iter().position(|&w| w == sel) {
            Some(i) => i,
            None => return,
        };
        let n = visible.len();
        let next = if dir > 0 { visible[(i + 1) % n] } else { visible[(i + n - 1) % n] };
        if next != sel {
            self.focus(Some(next));
            self.restack(self.selmon);
        }
    }

    pub fn focus_mon(&mut self, dir: i32) {
        if self.monitors.len() < 2 {
            return;
        }
        let m = self.dir_to_mon(dir);
        if m == self.selmon {
            return;
        }
        if let Some(sel) = self.selected_client() {
            self.unfocus(sel, false);
        }
        self.selmon = m;
        self.focus(None);
    }

    pub fn tag_mon(&mut self, dir: i32) {
        if self.monitors.len() < 2 {
            return;
        }
        if let Some(win) = self.selected_client() {
            let m = self.dir_to_mon(dir);
            self.send_mon(win, m);
        }
    }

    /// Move `win` to monitor `m`, where it takes on the current view.
    pub(crate) fn send_mon(&mut self, win: Window, m: usize) {
        let from = match self.clients.get(&win) {
            Some(c) if c.mon != m => c.mon,
            _ => return,
        };
        self.unfocus(win, true);
        self.monitors[from].detach(win);
        self.monitors[from].detach_stack(win);
        self.reselect(from);
        if let Some(c) = self.clients.get_mut(&win) {
            c.mon = m;
            c.tags = self.monitors[m].view();
        }
        self.monitors[m].attach(win);
        self.monitors[m].attach_stack(win);
        debug!("sent {} from monitor {} to {}", win, from, m);
        self.focus(None);
        self.arrange(None);
    }

    pub fn toggle_floating(&mut self) {
        let win = match self.selected_client() {
            Some(win) => win,
            None => return,
        };
        let geom = match self.clients.get_mut(&win) {
            Some(c) if !c.fullscreen => {
                c.floating = !c.floating || c.fixed;
                if c.floating {
                    Some(c.geom)
                } else {
                    None
                }
            }
            _ => return,
        };
        if let Some(geom) = geom {
            self.resize(win, geom, false);
        }
        self.arrange(Some(self.selmon));
    }

    pub fn set_layout(&mut self, layout: Layout) {
        let m = self.selmon;
        if layout != self.monitors[m].layout() {
            self.monitors[m].sellt ^= 1;
        }
        let sellt = self.monitors[m].sellt;
        self.monitors[m].layouts[sellt] = layout;
        if self.monitors[m].sel.is_some() {
            self.arrange(Some(m));
        }
    }

    /// Switch key modes, announcing the new mode and re-grabbing keys.
    pub fn set_mode(&mut self, mode: KeyMode) {
        if self.bindings.set_mode(mode) {
            self.notify(notify::mode(&mode.to_string()));
            self.grab_keys();
        }
    }

    /// Drop the selected window's application from the workspace memory.
    pub fn forget_window(&mut self) {
        let c = match self.selected_client().and_then(|w| self.clients.get(&w)) {
            Some(c) => c,
            None => return,
        };
        let (class, instance, app) = (c.class.clone(), c.instance.clone(), c.app_name().to_string());
        match self.memory.update(&class, &instance, 0) {
            Update::Removed => {
                info!("forgot workspace for {}/{}", class, instance);
                self.notify(notify::window_untracked(&app));
            }
            _ => debug!("{}/{} was not remembered", class, instance),
        }
    }

    /// Ask the selected window to close, destroying it if it does not speak
    /// WM_DELETE_WINDOW.
    pub fn close_window(&mut self) {
        if let Some(win) = self.selected_client() {
            if !self.conn.send_protocol(win, WmProtocol::DeleteWindow) {
                self.conn.kill(win);
            }
        }
    }

    pub fn quit(&mut self) {
        info!("exit called, shutting down");
        self.running = false;
    }

    /// Re-derive every key grab for the active mode.
    pub(crate) fn grab_keys(&self) {
        let grabs = self.bindings.grab_set(|sym| self.conn.keycodes_for(sym));
        debug!("grabbing {} keys in {} mode", grabs.len(), self.bindings.mode());
        self.conn.grab_keys(&grabs);
    }

    /// Apply a control command and build the answer for the client.
    pub(crate) fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::BindKey(binding) => match self.bindings.register(binding) {
                Ok(()) => {
                    self.grab_keys();
                    Reply::Success
                }
                Err(e) => Reply::Error(e.to_string()),
            },
            Command::UnbindKey {
                mode,
                modifiers,
                keysym,
            } => {
                if self.bindings.unregister(modifiers, keysym, mode) == 0 {
                    Reply::Error("no such binding".to_string())
                } else {
                    self.grab_keys();
                    Reply::Success
                }
            }
            Command::Mode(mode) => {
                self.set_mode(mode);
                Reply::Success
            }
            Command::ListBindings => Reply::Text(self.bindings.describe()),
            Command::Quit => {
                self.quit();
                Reply::Success
            }
        }
    }
}
