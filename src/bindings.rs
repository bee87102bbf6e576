//! Modal keybinding engine.
//!
//! Bindings are (modifiers, keysym, mode) triples bound to an external
//! command or an [`Action`]. Only bindings of the active mode are grabbed and
//! dispatched; Escape always takes a non-normal mode back to normal and the
//! reset key (`M-Escape` unless configured otherwise) is grabbed in every
//! mode. A static legacy table is consulted in normal mode when no dynamic
//! binding matched.
use std::{collections::HashSet, collections::TryReserveError, fmt, str::FromStr};

use thiserror::Error;

use crate::{
    action::{Action, Bound},
    keysym::{keysym_from_name, keysym_name, Keysym, XK_ESCAPE},
};

pub type ModMask = u16;

pub const MOD_SHIFT: ModMask = xcb::MOD_MASK_SHIFT as ModMask;
pub const MOD_LOCK: ModMask = xcb::MOD_MASK_LOCK as ModMask;
pub const MOD_CONTROL: ModMask = xcb::MOD_MASK_CONTROL as ModMask;
pub const MOD_1: ModMask = xcb::MOD_MASK_1 as ModMask;
pub const MOD_4: ModMask = xcb::MOD_MASK_4 as ModMask;
const MOD_ALL: ModMask = (xcb::MOD_MASK_SHIFT
    | xcb::MOD_MASK_CONTROL
    | xcb::MOD_MASK_1
    | xcb::MOD_MASK_2
    | xcb::MOD_MASK_3
    | xcb::MOD_MASK_4
    | xcb::MOD_MASK_5) as ModMask;

#[derive(Error, Debug)]
pub enum BindError {
    #[error("invalid key binding '{0}'")]
    InvalidKeySpec(String),
    #[error("invalid key binding prefix '{0}'")]
    UnknownModifier(String),
    #[error("unknown key name '{0}'")]
    UnknownKey(String),
    #[error("unknown key mode '{0}'")]
    UnknownMode(String),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("exec needs a command to run")]
    EmptyCommand,
    #[error("unable to grow the binding table")]
    Alloc(#[from] TryReserveError),
}

/// The key mode decides which dynamic bindings are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    Normal,
    Command,
    Window,
    Tag,
}

impl KeyMode {
    pub const ALL: [KeyMode; 4] = [KeyMode::Normal, KeyMode::Command, KeyMode::Window, KeyMode::Tag];

    pub fn name(&self) -> &'static str {
        match self {
            KeyMode::Normal => "normal",
            KeyMode::Command => "command",
            KeyMode::Window => "window",
            KeyMode::Tag => "tag",
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        f.write_str(&name[..1].to_ascii_uppercase())?;
        f.write_str(&name[1..])
    }
}

impl FromStr for KeyMode {
    type Err = BindError;

    fn from_str(s: &str) -> Result<KeyMode, BindError> {
        KeyMode::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BindError::UnknownMode(s.to_string()))
    }
}

/// A runtime registered binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub modifiers: ModMask,
    pub keysym: Keysym,
    pub mode: KeyMode,
    pub bound: Bound,
}

impl KeyBinding {
    pub fn new(modifiers: ModMask, keysym: Keysym, mode: KeyMode, bound: Bound) -> KeyBinding {
        KeyBinding {
            modifiers,
            keysym,
            mode,
            bound,
        }
    }

    /// Build a binding from a key spec such as `M-S-Return`.
    pub fn parse(spec: &str, mode: KeyMode, bound: Bound) -> Result<KeyBinding, BindError> {
        let (modifiers, keysym) = parse_key_binding(spec)?;
        Ok(KeyBinding::new(modifiers, keysym, mode, bound))
    }
}

/// An entry of the static key table, live in normal mode only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub modifiers: ModMask,
    pub keysym: Keysym,
    pub action: Action,
}

impl Key {
    pub fn new(modifiers: ModMask, keysym: Keysym, action: Action) -> Key {
        Key {
            modifiers,
            keysym,
            action,
        }
    }
}

/// Outcome of looking a key press up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Escape in a non-normal mode: go back to normal and do nothing else.
    ResetMode,
    Run(Bound),
    Unbound,
}

/**
 * Convert user friendly key bindings into a modifier mask and keysym.
 *
 * Bindings are of the form '<MOD>-<key name>' with multiple modifiers being
 * allowed. Allowed modifiers are:
 *   M - Super
 *   A - Alt
 *   C - Ctrl
 *   S - Shift
 */
pub fn parse_key_binding(spec: &str) -> Result<(ModMask, Keysym), BindError> {
    let mut parts: Vec<&str> = spec.trim().split('-').collect();
    let key = parts.pop().filter(|k| !k.is_empty());
    let key = key.ok_or_else(|| BindError::InvalidKeySpec(spec.to_string()))?;
    let keysym = keysym_from_name(key).ok_or_else(|| BindError::UnknownKey(key.to_string()))?;
    let mask = parts.iter().try_fold(0, |acc, &m| {
        let bit = match m {
            "A" => MOD_1,
            "M" => MOD_4,
            "S" => MOD_SHIFT,
            "C" => MOD_CONTROL,
            _ => return Err(BindError::UnknownModifier(m.to_string())),
        };
        Ok(acc | bit)
    })?;
    Ok((mask, keysym))
}

/// Inverse of [`parse_key_binding`].
pub fn format_key_binding(modifiers: ModMask, keysym: Keysym) -> String {
    let mut spec = String::new();
    for &(bit, name) in &[(MOD_4, "M-"), (MOD_1, "A-"), (MOD_CONTROL, "C-"), (MOD_SHIFT, "S-")] {
        if modifiers & bit != 0 {
            spec.push_str(name);
        }
    }
    spec.push_str(&keysym_name(keysym));
    spec
}

#[derive(Debug, Clone)]
pub struct Bindings {
    bindings: Vec<KeyBinding>,
    legacy: Vec<Key>,
    mode: KeyMode,
    numlock: ModMask,
    reset: (ModMask, Keysym),
}

impl Bindings {
    pub fn new(legacy: Vec<Key>) -> Bindings {
        Bindings {
            bindings: Vec::new(),
            legacy,
            mode: KeyMode::Normal,
            numlock: 0,
            reset: (MOD_4, XK_ESCAPE),
        }
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Switch modes, returning false when `mode` was already active.
    pub fn set_mode(&mut self, mode: KeyMode) -> bool {
        if self.mode == mode {
            return false;
        }
        debug!("key mode {} -> {}", self.mode, mode);
        self.mode = mode;
        true
    }

    pub fn reset_key(&self) -> (ModMask, Keysym) {
        self.reset
    }

    pub fn set_reset_key(&mut self, modifiers: ModMask, keysym: Keysym) {
        self.reset = (modifiers, keysym);
    }

    pub fn numlock_mask(&self) -> ModMask {
        self.numlock
    }

    pub fn set_numlock_mask(&mut self, mask: ModMask) {
        self.numlock = mask;
    }

    /// Strip lock modifiers and anything that is not a real modifier key.
    pub fn clean_mask(&self, mask: ModMask) -> ModMask {
        mask & !(self.numlock | MOD_LOCK) & MOD_ALL
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn legacy(&self) -> &[Key] {
        &self.legacy
    }

    /// Append a binding. Earlier registrations for the same key and mode
    /// keep precedence at dispatch.
    pub fn register(&mut self, binding: KeyBinding) -> Result<(), BindError> {
        self.bindings.try_reserve(1)?;
        debug!(
            "binding {} in {} mode to {}",
            format_key_binding(binding.modifiers, binding.keysym),
            binding.mode,
            binding.bound
        );
        self.bindings.push(binding);
        Ok(())
    }

    /// Remove every binding for the key in `mode`, returning how many went.
    pub fn unregister(&mut self, modifiers: ModMask, keysym: Keysym, mode: KeyMode) -> usize {
        let before = self.bindings.len();
        self.bindings
            .retain(|b| !(b.modifiers == modifiers && b.keysym == keysym && b.mode == mode));
        before - self.bindings.len()
    }

    /// Look up a key press with raw modifier `state` in the active mode.
    pub fn dispatch(&self, state: ModMask, keysym: Keysym) -> Dispatch {
        if keysym == XK_ESCAPE && self.mode != KeyMode::Normal {
            return Dispatch::ResetMode;
        }
        let mask = self.clean_mask(state);
        let dynamic = self.bindings.iter().find(|b| {
            b.mode == self.mode && b.keysym == keysym && self.clean_mask(b.modifiers) == mask
        });
        if let Some(b) = dynamic {
            return Dispatch::Run(b.bound.clone());
        }
        if self.mode == KeyMode::Normal {
            let legacy = self
                .legacy
                .iter()
                .find(|k| k.keysym == keysym && self.clean_mask(k.modifiers) == mask);
            if let Some(k) = legacy {
                return Dispatch::Run(Bound::action(k.action));
            }
        }
        Dispatch::Unbound
    }

    /// The (modifiers, keysym) pairs that must be grabbed in the active mode:
    /// its own bindings, the legacy table in normal mode and the reset key.
    pub fn live_keys(&self) -> Vec<(ModMask, Keysym)> {
        let mut keys: Vec<(ModMask, Keysym)> = self
            .bindings
            .iter()
            .filter(|b| b.mode == self.mode)
            .map(|b| (b.modifiers, b.keysym))
            .collect();
        if self.mode == KeyMode::Normal {
            keys.extend(self.legacy.iter().map(|k| (k.modifiers, k.keysym)));
        }
        keys.push(self.reset);
        keys
    }

    /**
     * Every (modifiers, keycode) grab needed for the active mode.
     *
     * Each live key is grabbed under all four numlock/capslock combinations.
     * Duplicated bindings and keysyms sharing a keycode yield a single grab.
     */
    pub fn grab_set<F>(&self, keycodes: F) -> Vec<(ModMask, u8)>
    where
        F: Fn(Keysym) -> Vec<u8>,
    {
        let locks = [0, MOD_LOCK, self.numlock, self.numlock | MOD_LOCK];
        let mut seen = HashSet::new();
        let mut grabs = Vec::new();
        for (mods, sym) in self.live_keys() {
            for code in keycodes(sym) {
                for &lock in &locks {
                    let grab = (mods | lock, code);
                    if seen.insert(grab) {
                        grabs.push(grab);
                    }
                }
            }
        }
        grabs
    }

    /// One line per binding: `<mode> <key spec> <bound>`.
    pub fn describe(&self) -> String {
        self.bindings
            .iter()
            .map(|b| {
                format!(
                    "{} {} {}\n",
                    b.mode.name(),
                    format_key_binding(b.modifiers, b.keysym),
                    b.bound
                )
            })
            .collect()
    }
}
