//! Runtime control over X properties.
//!
//! A client creates a 1x1 input only window with the class [`IPC_WINDOW_CLASS`]
//! and asks for it to be configured. The window manager notices the request,
//! starts watching the window's properties and sets `_DINA_IPC_STATE` to
//! `server_ready`. The client then writes a command line into
//! `_DINA_IPC_COMMAND`; the answer comes back in `_DINA_IPC_STATE`, with any
//! reply text placed in `_DINA_IPC_COMMAND`.
use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};
use thiserror::Error;
use xcb::Window;

use crate::{
    action::Bound,
    bindings::{parse_key_binding, BindError, KeyBinding, KeyMode, ModMask},
    keysym::Keysym,
    xconnection::{Property, TextProperty, XConn, XEvent, XcbConnection},
};

pub const IPC_WINDOW_NAME: &str = "DINA_IPC";
pub const IPC_WINDOW_CLASS: &str = "DINA_IPC";
pub const IPC_STATE_SERVER_READY: &str = "server_ready";
pub const IPC_STATE_REPLY_READY: &str = "reply_ready";
pub const IPC_STATE_SUCCESS: &str = "success";
pub const IPC_STATE_ERROR_PREFIX: &str = "error: ";

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument '{0}'")]
    TrailingArgument(String),
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `bindkey <mode> <key-spec> <action...>`
    BindKey(KeyBinding),
    /// `unbindkey <mode> <key-spec>`
    UnbindKey {
        mode: KeyMode,
        modifiers: ModMask,
        keysym: Keysym,
    },
    /// `mode <name>`
    Mode(KeyMode),
    ListBindings,
    Quit,
}

fn no_more<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<(), IpcError> {
    match args.next() {
        Some(extra) => Err(IpcError::TrailingArgument(extra.to_string())),
        None => Ok(()),
    }
}

fn parse_mode(arg: Option<&str>) -> Result<KeyMode, IpcError> {
    Ok(arg.ok_or(IpcError::MissingArgument("mode"))?.parse()?)
}

impl FromStr for Command {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Command, IpcError> {
        let mut args = s.split_whitespace();
        let name = args.next().ok_or(IpcError::Empty)?;

        let command = match name {
            "bindkey" => {
                let mode = parse_mode(args.next())?;
                let spec = args.next().ok_or(IpcError::MissingArgument("key"))?;
                let action = args.collect::<Vec<_>>().join(" ");
                if action.is_empty() {
                    return Err(IpcError::MissingArgument("action"));
                }
                let bound: Bound = action.parse()?;
                Command::BindKey(KeyBinding::parse(spec, mode, bound)?)
            }
            "unbindkey" => {
                let mode = parse_mode(args.next())?;
                let spec = args.next().ok_or(IpcError::MissingArgument("key"))?;
                let (modifiers, keysym) = parse_key_binding(spec)?;
                no_more(args)?;
                Command::UnbindKey {
                    mode,
                    modifiers,
                    keysym,
                }
            }
            "mode" => {
                let mode = parse_mode(args.next())?;
                no_more(args)?;
                Command::Mode(mode)
            }
            "list_bindings" => {
                no_more(args)?;
                Command::ListBindings
            }
            "quit" => {
                no_more(args)?;
                Command::Quit
            }
            other => return Err(IpcError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// What goes back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success,
    Error(String),
    Text(String),
}

/// The window manager's end of the channel.
#[derive(Debug, Default)]
pub struct IpcServer {
    clients: HashSet<Window>,
}

impl IpcServer {
    pub fn new() -> IpcServer {
        IpcServer::default()
    }

    pub fn is_client(&self, win: Window) -> bool {
        self.clients.contains(&win)
    }

    /// Start talking to `win` if it is a control window. Returns false for
    /// any other window.
    pub fn accept<X: XConn>(&mut self, conn: &X, win: Window) -> bool {
        if self.is_client(win) {
            return true;
        }
        match conn.window_class(win) {
            Some((class, _)) if class == IPC_WINDOW_CLASS => {
                debug!("ipc client connected on window {}", win);
                self.clients.insert(win);
                conn.watch_properties(win);
                conn.set_text_property(win, TextProperty::IpcState, IPC_STATE_SERVER_READY);
                true
            }
            _ => false,
        }
    }

    /// The command a client just wrote, if `win` is a client.
    pub fn read_command<X: XConn>(&self, conn: &X, win: Window) -> Option<Result<Command, IpcError>> {
        if !self.is_client(win) {
            return None;
        }
        let text = conn.text_property(win, TextProperty::IpcCommand)?;
        debug!("ipc command from {}: {}", win, text);
        Some(text.parse())
    }

    /// Answer a client. Every client gets exactly one answer.
    pub fn reply<X: XConn>(&mut self, conn: &X, win: Window, reply: Reply) {
        // forget the client first: writing the reply text fires another
        // property change on the command property
        self.clients.remove(&win);
        match reply {
            Reply::Success => conn.set_text_property(win, TextProperty::IpcState, IPC_STATE_SUCCESS),
            Reply::Error(reason) => {
                let state = format!("{}{}", IPC_STATE_ERROR_PREFIX, reason);
                conn.set_text_property(win, TextProperty::IpcState, &state);
            }
            Reply::Text(text) => {
                conn.set_text_property(win, TextProperty::IpcCommand, &text);
                conn.set_text_property(win, TextProperty::IpcState, IPC_STATE_REPLY_READY);
            }
        }
    }

    pub fn forget(&mut self, win: Window) {
        self.clients.remove(&win);
    }
}

/// The `dinactl` end of the channel.
pub struct IpcClient {
    conn: XcbConnection,
    ipc_win: Window,
}

impl IpcClient {
    pub fn new() -> Result<IpcClient> {
        let conn = XcbConnection::new()?;
        let ipc_win = conn.create_input_window(IPC_WINDOW_NAME, IPC_WINDOW_CLASS)?;
        conn.flush();
        conn.request_configure(ipc_win);
        conn.flush();
        Ok(IpcClient { conn, ipc_win })
    }

    pub fn send_command(&self, command: &str) -> Result<()> {
        let state = self.wait_for_state()?;
        if state != IPC_STATE_SERVER_READY {
            return Err(anyhow!("unexpected IPC state '{}'", state));
        }
        debug!("ipc client: IPC server ready");
        self.conn
            .set_text_property(self.ipc_win, TextProperty::IpcCommand, command);
        self.conn.flush();
        Ok(())
    }

    pub fn get_reply(&self) -> Result<String> {
        let state = self.wait_for_state()?;
        match state.as_str() {
            // No reply required
            IPC_STATE_SUCCESS => Ok(IPC_STATE_SUCCESS.to_string()),
            IPC_STATE_REPLY_READY => self
                .conn
                .text_property(self.ipc_win, TextProperty::IpcCommand)
                .ok_or_else(|| anyhow!("reply announced but missing")),
            s => match s.strip_prefix(IPC_STATE_ERROR_PREFIX) {
                Some(reason) => Err(anyhow!("{}", reason)),
                None => Err(anyhow!("Got an invalid state '{}'", s)),
            },
        }
    }

    fn wait_for_state(&self) -> Result<String> {
        loop {
            if let XEvent::PropertyNotify {
                id,
                property: Property::IpcState,
                deleted: false,
                ..
            } = self.conn.wait_for_event()?
            {
                if id != self.ipc_win {
                    continue;
                }
                if let Some(state) = self.conn.text_property(id, TextProperty::IpcState) {
                    return Ok(state);
                }
            }
        }
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.conn.destroy_window(self.ipc_win);
        self.conn.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::Action,
        bindings::{MOD_4, MOD_SHIFT},
        keysym::keysym_from_name,
        mock::MockXConn,
    };

    #[test]
    fn bindkey_takes_the_rest_of_the_line_as_action() {
        let cmd: Command = "bindkey normal M-S-f exec firefox --private-window".parse().unwrap();
        let expected = KeyBinding::new(
            MOD_4 | MOD_SHIFT,
            keysym_from_name("f").unwrap(),
            KeyMode::Normal,
            Bound::command("firefox --private-window"),
        );
        assert_eq!(cmd, Command::BindKey(expected));

        let cmd: Command = "bindkey Window M-n focus_next".parse().unwrap();
        match cmd {
            Command::BindKey(b) => {
                assert_eq!(b.mode, KeyMode::Window);
                assert_eq!(b.bound, Bound::action(Action::FocusNext));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_commands_are_rejected() {
        assert!(matches!("".parse::<Command>(), Err(IpcError::Empty)));
        assert!(matches!("reload".parse::<Command>(), Err(IpcError::UnknownCommand(_))));
        assert!(matches!("bindkey normal M-x".parse::<Command>(), Err(IpcError::MissingArgument("action"))));
        assert!(matches!("mode insert".parse::<Command>(), Err(IpcError::Bind(_))));
        assert!(matches!("quit now".parse::<Command>(), Err(IpcError::TrailingArgument(_))));
        assert!(matches!("unbindkey tag Q-1".parse::<Command>(), Err(IpcError::Bind(_))));
    }

    #[test]
    fn only_control_windows_are_accepted() {
        let conn = MockXConn::single();
        conn.add_window(5, IPC_WINDOW_CLASS, IPC_WINDOW_CLASS);
        conn.add_window(6, "URxvt", "urxvt");
        let mut server = IpcServer::new();

        assert!(!server.accept(&conn, 6));
        assert!(server.accept(&conn, 5));
        assert!(conn.window(5).watched);
        assert_eq!(conn.window(5).state.as_deref(), Some(IPC_STATE_SERVER_READY));
    }

    #[test]
    fn replies_end_the_conversation() {
        let conn = MockXConn::single();
        conn.add_window(5, IPC_WINDOW_CLASS, IPC_WINDOW_CLASS);
        let mut server = IpcServer::new();
        server.accept(&conn, 5);
        conn.set_text_property(5, TextProperty::IpcCommand, "list_bindings");

        let cmd = server.read_command(&conn, 5).unwrap().unwrap();
        assert_eq!(cmd, Command::ListBindings);
        server.reply(&conn, 5, Reply::Text("normal M-Return exec alacritty\n".into()));

        assert_eq!(conn.window(5).state.as_deref(), Some(IPC_STATE_REPLY_READY));
        assert_eq!(conn.window(5).command.as_deref(), Some("normal M-Return exec alacritty\n"));
        assert!(server.read_command(&conn, 5).is_none());
    }

    #[test]
    fn errors_carry_their_reason() {
        let conn = MockXConn::single();
        conn.add_window(5, IPC_WINDOW_CLASS, IPC_WINDOW_CLASS);
        let mut server = IpcServer::new();
        server.accept(&conn, 5);
        server.reply(&conn, 5, Reply::Error("unknown command 'reload'".into()));
        assert_eq!(
            conn.window(5).state.as_deref(),
            Some("error: unknown command 'reload'")
        );
    }
}
