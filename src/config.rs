use std::path::PathBuf;

use thiserror::Error;

use crate::{
    action::{Action, Bound},
    bindings::{parse_key_binding, BindError, Key, KeyBinding, KeyMode, ModMask, MOD_4, MOD_SHIFT},
    keysym::Keysym,
    memory::WorkspaceMemory,
    monitor::Layout,
    rules::Rule,
    tag::{NUM_TAGS, TAGMASK},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no fonts defined")]
    NoFonts,
    #[error("no layouts defined")]
    NoLayouts,
    #[error("expected {} tag names, found {0}", NUM_TAGS)]
    TagCount(usize),
    #[error("rule {index} uses tags {tags:#x} outside the tag mask")]
    RuleTags { index: usize, tags: u32 },
    #[error("legacy key {index} has no keysym")]
    LegacyKey { index: usize },
    #[error("bad binding '{key}': {source}")]
    Binding {
        key: String,
        #[source]
        source: BindError,
    },
}

/// A binding written the way users write them: `M-S-Return` plus an action
/// string such as `exec alacritty` or `focus_next`.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSpec {
    pub key: String,
    pub mode: KeyMode,
    pub action: String,
}

impl BindingSpec {
    pub fn new(key: &str, mode: KeyMode, action: &str) -> BindingSpec {
        BindingSpec {
            key: key.to_string(),
            mode,
            action: action.to_string(),
        }
    }

    pub fn compile(&self) -> Result<KeyBinding, ConfigError> {
        let err = |source| ConfigError::Binding {
            key: self.key.clone(),
            source,
        };
        let bound: Bound = self.action.parse().map_err(err)?;
        KeyBinding::parse(&self.key, self.mode, bound).map_err(err)
    }
}

/// The main user facing configuration details
#[derive(Debug, Clone)]
pub struct Config {
    /// Tag names, one per tag.
    pub tags: Vec<String>,
    /// Fonts for the (optional) bar. Must have at least one element.
    pub fonts: Vec<String>,
    /// The two layout slots a monitor toggles between.
    pub layouts: Vec<Layout>,
    /// The width of window borders in pixels
    pub border_width_px: u32,
    /// Focused border color
    pub focused_border_color: u32,
    /// Unfocused border color
    pub unfocused_border_color: u32,
    pub urgent_border_color: u32,
    /// Whether or not space should be reserved for a status bar
    pub show_bar: bool,
    /// True if the status bar should be at the top of the screen, false if it should be at the bottom
    pub top_bar: bool,
    /// Height of space reserved for status bars in pixels
    pub bar_height: u32,
    /// Honour size hints of tiled clients too, not just floating ones.
    pub resize_hints: bool,
    /// Keep focus on a fullscreen window when cycling.
    pub lock_fullscreen: bool,
    pub rules: Vec<Rule>,
    /// Static key table, active in normal mode behind the dynamic bindings.
    pub keys: Vec<Key>,
    /// Bindings registered with the keybinding engine at startup.
    pub bindings: Vec<BindingSpec>,
    /// Key that takes any mode back to normal. Grabbed in every mode.
    pub mode_reset_key: String,
    /// Play tones and speak announcements through `play` and `spd-say`.
    pub audio_feedback: bool,
    /// Where the workspace memory lives; `None` disables persistence.
    pub memory_path: Option<PathBuf>,
}

// Latin-1 keysyms are their character codes.
fn key(mods: ModMask, c: char, action: Action) -> Key {
    Key::new(mods, c as Keysym, action)
}

fn default_keys() -> Vec<Key> {
    let mut keys = vec![
        key(MOD_4, 'j', Action::FocusPrevious),
        key(MOD_4, 'l', Action::FocusNext),
        key(MOD_4, 'k', Action::CloseWindow),
    ];
    for n in 1..=NUM_TAGS {
        let digit = '0' as Keysym + n;
        keys.push(Key::new(MOD_4, digit, Action::ViewTag(n)));
        keys.push(Key::new(MOD_4 | MOD_SHIFT, digit, Action::MoveToTag(n)));
    }
    keys.push(key(MOD_4 | MOD_SHIFT, 'q', Action::Quit));
    keys
}

fn default_bindings() -> Vec<BindingSpec> {
    use KeyMode::*;

    let mut b = vec![
        BindingSpec::new("M-Escape", Normal, "none"),
        BindingSpec::new("M-Return", Normal, "exec alacritty"),
        BindingSpec::new("M-a", Normal, "exec ~/.local/bin/app-launcher"),
        BindingSpec::new("M-b", Normal, "exec ~/.local/bin/toggle-blackout"),
        BindingSpec::new("M-BackSpace", Normal, "exec ~/.local/bin/session-menu"),
        BindingSpec::new("M-c", Normal, "mode_command"),
        BindingSpec::new("M-w", Normal, "mode_window"),
        BindingSpec::new("M-t", Normal, "mode_tag"),
        BindingSpec::new("M-q", Command, "exec spd-say -r -40 \"Command: q is pressed\""),
        BindingSpec::new("M-w", Command, "exec spd-say -r -40 \"Command: w is pressed\""),
        BindingSpec::new("M-e", Command, "exec spd-say -r -40 \"Command: e is pressed\""),
        BindingSpec::new("M-h", Window, "focus_monitor_previous"),
        BindingSpec::new("M-l", Window, "focus_monitor_next"),
        BindingSpec::new("M-j", Window, "focus_previous"),
        BindingSpec::new("M-k", Window, "focus_next"),
        BindingSpec::new("M-S-h", Window, "send_to_monitor_previous"),
        BindingSpec::new("M-S-l", Window, "send_to_monitor_next"),
        BindingSpec::new("M-f", Window, "toggle_floating"),
        BindingSpec::new("M-m", Window, "layout_monocle"),
        BindingSpec::new("M-S-m", Window, "layout_floating"),
        BindingSpec::new("M-x", Window, "forget_window"),
        BindingSpec::new("M-q", Window, "close_window"),
        BindingSpec::new("M-Tab", Tag, "view_last"),
    ];
    for n in 1..=NUM_TAGS {
        b.push(BindingSpec::new(&format!("M-{}", n), Tag, &format!("view_tag_{}", n)));
        b.push(BindingSpec::new(&format!("M-S-{}", n), Tag, &format!("move_to_tag_{}", n)));
    }
    b
}

impl Default for Config {
    /// Initialise a default Config: a headless, all black setup driven by the
    /// keyboard and announced through speech.
    fn default() -> Config {
        Config {
            tags: (1..=NUM_TAGS).map(|n| n.to_string()).collect(),
            fonts: vec!["monospace:size=10".to_string()],
            layouts: vec![Layout::Monocle, Layout::Floating],
            border_width_px: 1,
            focused_border_color: 0x000000,
            unfocused_border_color: 0x000000,
            urgent_border_color: 0x000000,
            show_bar: false,
            top_bar: true,
            bar_height: 18,
            resize_hints: false,
            lock_fullscreen: true,
            rules: Vec::new(),
            keys: default_keys(),
            bindings: default_bindings(),
            mode_reset_key: "M-Escape".to_string(),
            audio_feedback: true,
            memory_path: WorkspaceMemory::default_path(),
        }
    }
}

impl Config {
    /// Check everything that would make the window manager unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fonts.is_empty() {
            return Err(ConfigError::NoFonts);
        }
        if self.layouts.is_empty() {
            return Err(ConfigError::NoLayouts);
        }
        if self.tags.len() != NUM_TAGS as usize {
            return Err(ConfigError::TagCount(self.tags.len()));
        }
        if let Some((index, rule)) = self.rules.iter().enumerate().find(|(_, r)| r.tags & !TAGMASK != 0) {
            return Err(ConfigError::RuleTags {
                index,
                tags: rule.tags,
            });
        }
        if let Some(index) = self.keys.iter().position(|k| k.keysym == 0) {
            return Err(ConfigError::LegacyKey { index });
        }
        self.reset_key()?;
        self.compile_bindings().map(|_| ())
    }

    pub fn reset_key(&self) -> Result<(ModMask, Keysym), ConfigError> {
        parse_key_binding(&self.mode_reset_key).map_err(|source| ConfigError::Binding {
            key: self.mode_reset_key.clone(),
            source,
        })
    }

    pub fn compile_bindings(&self) -> Result<Vec<KeyBinding>, ConfigError> {
        self.bindings.iter().map(BindingSpec::compile).collect()
    }

    /// Both layout slots, repeating the first when only one is configured.
    pub fn layout_slots(&self) -> [Layout; 2] {
        let first = self.layouts.first().copied().unwrap_or(Layout::Monocle);
        [first, self.layouts.get(1).copied().unwrap_or(first)]
    }
}
