//! Everything a key binding or control command can ask the window manager
//! to do.
use std::{fmt, str::FromStr};

use crate::{
    bindings::{BindError, KeyMode},
    monitor::Layout,
    tag::NUM_TAGS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Show the 1-based tag.
    ViewTag(u32),
    /// Swap back to the previously shown tags.
    ViewLast,
    /// Move the focused window to the 1-based tag.
    MoveToTag(u32),
    FocusNext,
    FocusPrevious,
    FocusMonitorNext,
    FocusMonitorPrevious,
    SendToMonitorNext,
    SendToMonitorPrevious,
    ToggleFloating,
    CloseWindow,
    SetLayout(Layout),
    SetMode(KeyMode),
    /// Drop the focused window's application from the workspace memory.
    ForgetWindow,
    Quit,
}

fn numbered(s: &str, prefix: &str) -> Option<u32> {
    s.strip_prefix(prefix)
        .and_then(|n| n.parse().ok())
        .filter(|&n| n >= 1 && n <= NUM_TAGS)
}

impl FromStr for Action {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Action, BindError> {
        let action = match s {
            "view_last" => Action::ViewLast,
            "focus_next" => Action::FocusNext,
            "focus_previous" => Action::FocusPrevious,
            "focus_monitor_next" => Action::FocusMonitorNext,
            "focus_monitor_previous" => Action::FocusMonitorPrevious,
            "send_to_monitor_next" => Action::SendToMonitorNext,
            "send_to_monitor_previous" => Action::SendToMonitorPrevious,
            "toggle_floating" => Action::ToggleFloating,
            "close_window" => Action::CloseWindow,
            "layout_monocle" => Action::SetLayout(Layout::Monocle),
            "layout_floating" => Action::SetLayout(Layout::Floating),
            "forget_window" => Action::ForgetWindow,
            "quit" => Action::Quit,
            _ => {
                if let Some(n) = numbered(s, "view_tag_") {
                    Action::ViewTag(n)
                } else if let Some(n) = numbered(s, "move_to_tag_") {
                    Action::MoveToTag(n)
                } else if let Some(mode) = s.strip_prefix("mode_") {
                    Action::SetMode(mode.parse()?)
                } else {
                    return Err(BindError::UnknownAction(s.to_string()));
                }
            }
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ViewTag(n) => write!(f, "view_tag_{}", n),
            Action::ViewLast => f.write_str("view_last"),
            Action::MoveToTag(n) => write!(f, "move_to_tag_{}", n),
            Action::FocusNext => f.write_str("focus_next"),
            Action::FocusPrevious => f.write_str("focus_previous"),
            Action::FocusMonitorNext => f.write_str("focus_monitor_next"),
            Action::FocusMonitorPrevious => f.write_str("focus_monitor_previous"),
            Action::SendToMonitorNext => f.write_str("send_to_monitor_next"),
            Action::SendToMonitorPrevious => f.write_str("send_to_monitor_previous"),
            Action::ToggleFloating => f.write_str("toggle_floating"),
            Action::CloseWindow => f.write_str("close_window"),
            Action::SetLayout(Layout::Monocle) => f.write_str("layout_monocle"),
            Action::SetLayout(Layout::Floating) => f.write_str("layout_floating"),
            Action::SetMode(mode) => write!(f, "mode_{}", mode.name()),
            Action::ForgetWindow => f.write_str("forget_window"),
            Action::Quit => f.write_str("quit"),
        }
    }
}

/// What a binding runs: an external command, an action, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bound {
    pub command: Option<String>,
    pub action: Option<Action>,
}

impl Bound {
    pub fn action(action: Action) -> Bound {
        Bound {
            command: None,
            action: Some(action),
        }
    }

    pub fn command(cmd: impl Into<String>) -> Bound {
        Bound {
            command: Some(cmd.into()),
            action: None,
        }
    }
}

impl FromStr for Bound {
    type Err = BindError;

    /// `exec <shell command>`, an action name, or `none`.
    fn from_str(s: &str) -> Result<Bound, BindError> {
        let s = s.trim();
        if s.is_empty() || s == "none" {
            return Ok(Bound::default());
        }
        match s.strip_prefix("exec") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                let cmd = rest.trim();
                if cmd.is_empty() {
                    Err(BindError::EmptyCommand)
                } else {
                    Ok(Bound::command(cmd))
                }
            }
            _ => s.parse().map(Bound::action),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.command, &self.action) {
            (Some(cmd), _) => write!(f, "exec {}", cmd),
            (None, Some(action)) => write!(f, "{}", action),
            (None, None) => f.write_str("none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_actions_parse_in_range() {
        assert_eq!("view_tag_3".parse::<Action>().unwrap(), Action::ViewTag(3));
        assert_eq!("move_to_tag_9".parse::<Action>().unwrap(), Action::MoveToTag(9));
        assert!("view_tag_0".parse::<Action>().is_err());
        assert!("move_to_tag_10".parse::<Action>().is_err());
    }

    #[test]
    fn names_survive_display() {
        for name in &["focus_next", "mode_window", "layout_floating", "view_tag_2", "forget_window"] {
            assert_eq!(name.parse::<Action>().unwrap().to_string(), *name);
        }
    }

    #[test]
    fn exec_keeps_the_whole_command_line() {
        let bound: Bound = "exec spd-say -r -40 \"hello world\"".parse().unwrap();
        assert_eq!(bound.command.as_deref(), Some("spd-say -r -40 \"hello world\""));
        assert_eq!(bound.action, None);
    }

    #[test]
    fn bad_bindings_are_rejected() {
        assert!(matches!("exec".parse::<Bound>(), Err(BindError::EmptyCommand)));
        assert!(matches!("executioner".parse::<Bound>(), Err(BindError::UnknownAction(_))));
        assert!(matches!("mode_insert".parse::<Bound>(), Err(BindError::UnknownMode(_))));
        assert_eq!("none".parse::<Bound>().unwrap(), Bound::default());
    }
}
