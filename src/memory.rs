//! Workspace memory: which tag an application was last sent to.
//!
//! Entries are keyed by the (class, instance) pair of WM_CLASS and persisted
//! as one tab separated `class instance tag` record per line, with
//! backslash, tab, newline and carriage return escaped C style inside the
//! names. The file is read once at startup and rewritten wholesale at
//! shutdown.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::tag::NUM_TAGS;

const MEMORY_DIR: &str = "dina";
const MEMORY_FILE: &str = "workspace_layout";

/// One remembered application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub class: String,
    pub instance: String,
    /// 1-based tag number; zero or negative marks a deletion.
    pub tag: i32,
}

impl Entry {
    pub fn new(class: impl Into<String>, instance: impl Into<String>, tag: i32) -> Entry {
        Entry {
            class: class.into(),
            instance: instance.into(),
            tag,
        }
    }
}

/// What an [`WorkspaceMemory::update`] call did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Inserted,
    Updated,
    Removed,
    Unchanged,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkspaceMemory {
    entries: Vec<Entry>,
}

impl WorkspaceMemory {
    pub fn new() -> WorkspaceMemory {
        WorkspaceMemory::default()
    }

    /// Build a table directly from entries, as if they had been recorded.
    pub fn from_entries(entries: Vec<Entry>) -> WorkspaceMemory {
        WorkspaceMemory { entries }
    }

    /// `$XDG_CONFIG_HOME/dina/workspace_layout`, or `~/.config/...` when
    /// no config directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|d| d.join(MEMORY_DIR).join(MEMORY_FILE))
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, class: &str, instance: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.class == class && e.instance == instance)
    }

    pub fn find(&self, class: &str, instance: &str) -> Option<&Entry> {
        self.position(class, instance).map(|i| &self.entries[i])
    }

    /// Remembered tag number for the pair, if a usable one is stored.
    pub fn tag_for(&self, class: &str, instance: &str) -> Option<u32> {
        self.find(class, instance)
            .filter(|e| e.tag > 0 && e.tag as u32 <= NUM_TAGS)
            .map(|e| e.tag as u32)
    }

    /// Insert, update or (for `tag <= 0`) remove the entry for the pair.
    pub fn update(&mut self, class: &str, instance: &str, tag: i32) -> Update {
        match (self.position(class, instance), tag > 0) {
            (Some(i), true) if self.entries[i].tag == tag => Update::Unchanged,
            (Some(i), true) => {
                self.entries[i].tag = tag;
                Update::Updated
            }
            (Some(i), false) => {
                self.entries.remove(i);
                Update::Removed
            }
            (None, true) => {
                self.entries.push(Entry::new(class, instance, tag));
                Update::Inserted
            }
            (None, false) => Update::Unchanged,
        }
    }

    /// Parse the on-disk layout. Lines that do not hold a class, an instance
    /// and a tag in 1..=9 are skipped, as are names with a bad escape.
    /// Names are taken verbatim, surrounding whitespace included.
    pub fn parse(text: &str) -> WorkspaceMemory {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split('\t');
                let class = unescape(fields.next()?)?;
                let instance = unescape(fields.next()?)?;
                let tag: i32 = fields.next()?.trim().parse().ok()?;
                if fields.next().is_some() || class.is_empty() || instance.is_empty() {
                    return None;
                }
                if tag <= 0 || tag as u32 > NUM_TAGS {
                    return None;
                }
                Some(Entry::new(class, instance, tag))
            })
            .collect();
        WorkspaceMemory { entries }
    }

    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .filter(|e| e.tag > 0)
            .map(|e| format!("{}\t{}\t{}\n", escape(&e.class), escape(&e.instance), e.tag))
            .collect()
    }

    /// Read the table from `path`. A missing or unreadable file gives an
    /// empty table.
    pub fn load(path: &Path) -> WorkspaceMemory {
        match fs::read_to_string(path) {
            Ok(text) => {
                let memory = WorkspaceMemory::parse(&text);
                info!("loaded {} workspace memory entries from {}", memory.len(), path.display());
                memory
            }
            Err(e) => {
                debug!("no workspace memory at {}: {}", path.display(), e);
                WorkspaceMemory::new()
            }
        }
    }

    /// Rewrite `path` with the current table, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        fs::write(path, self.serialize())
            .with_context(|| format!("Failed to write workspace memory to {}", path.display()))?;
        debug!("saved {} workspace memory entries", self.len());
        Ok(())
    }
}

fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            '\\' => '\\',
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            _ => return None,
        });
    }
    Some(out)
}
