//! X keysyms known to the key-spec parser.
//!
//! Names follow `xmodmap -pke` / `X11/keysymdef.h`, so a binding can be
//! written as `M-Return` or `M-S-1`.
use std::collections::HashMap;

pub type Keysym = u32;

pub const XK_BACKSPACE: Keysym = 0xff08;
pub const XK_TAB: Keysym = 0xff09;
pub const XK_RETURN: Keysym = 0xff0d;
pub const XK_ESCAPE: Keysym = 0xff1b;
pub const XK_DELETE: Keysym = 0xffff;
pub const XK_SPACE: Keysym = 0x0020;

lazy_static! {
    static ref KEYSYMS: HashMap<&'static str, Keysym> = {
        let mut m: HashMap<&'static str, Keysym> = [
            ("BackSpace", XK_BACKSPACE),
            ("Tab", XK_TAB),
            ("Return", XK_RETURN),
            ("Escape", XK_ESCAPE),
            ("Delete", XK_DELETE),
            ("space", XK_SPACE),
            ("Home", 0xff50),
            ("Left", 0xff51),
            ("Up", 0xff52),
            ("Right", 0xff53),
            ("Down", 0xff54),
            ("Prior", 0xff55),
            ("Next", 0xff56),
            ("End", 0xff57),
            ("Print", 0xff61),
            ("minus", 0x2d),
            ("equal", 0x3d),
            ("comma", 0x2c),
            ("period", 0x2e),
            ("slash", 0x2f),
            ("semicolon", 0x3b),
            ("apostrophe", 0x27),
            ("grave", 0x60),
            ("backslash", 0x5c),
            ("bracketleft", 0x5b),
            ("bracketright", 0x5d),
            ("XF86AudioLowerVolume", 0x1008_ff11),
            ("XF86AudioMute", 0x1008_ff12),
            ("XF86AudioRaiseVolume", 0x1008_ff13),
            ("XF86AudioPlay", 0x1008_ff14),
            ("XF86AudioStop", 0x1008_ff15),
            ("XF86AudioPrev", 0x1008_ff16),
            ("XF86AudioNext", 0x1008_ff17),
        ]
        .iter()
        .copied()
        .collect();

        const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        for (i, &name) in DIGITS.iter().enumerate() {
            m.insert(name, 0x30 + i as Keysym);
        }
        const LETTERS: [&str; 26] = [
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
            "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
        ];
        for (i, &name) in LETTERS.iter().enumerate() {
            m.insert(name, 0x61 + i as Keysym);
        }
        const FUNCTION_KEYS: [&str; 12] = [
            "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
        ];
        for (i, &name) in FUNCTION_KEYS.iter().enumerate() {
            m.insert(name, 0xffbe + i as Keysym);
        }
        m
    };
}

/// Keysym for a key name. Single upper case letters map to their lower case
/// keysym; shift is expressed through the modifier mask.
pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    KEYSYMS.get(name).copied().or_else(|| {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => {
                KEYSYMS.get(c.to_ascii_lowercase().to_string().as_str()).copied()
            }
            _ => None,
        }
    })
}

/// Name for a keysym, falling back to its hex value.
pub fn keysym_name(sym: Keysym) -> String {
    KEYSYMS
        .iter()
        .find(|(_, &s)| s == sym)
        .map(|(&name, _)| name.to_string())
        .unwrap_or_else(|| format!("0x{:x}", sym))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_to_keysyms() {
        assert_eq!(keysym_from_name("Return"), Some(XK_RETURN));
        assert_eq!(keysym_from_name("j"), Some(0x6a));
        assert_eq!(keysym_from_name("J"), Some(0x6a));
        assert_eq!(keysym_from_name("5"), Some(0x35));
        assert_eq!(keysym_from_name("F12"), Some(0xffc9));
        assert_eq!(keysym_from_name("Hyper_Q"), None);
    }

    #[test]
    fn keysyms_print_back_to_names() {
        assert_eq!(keysym_name(XK_ESCAPE), "Escape");
        assert_eq!(keysym_name(0x61), "a");
        assert_eq!(keysym_name(0xabcd), "0xabcd");
    }
}
