//! Initial placement of newly managed windows.
//!
//! The workspace memory is consulted first; static rules fill in whatever it
//! leaves open. Every placement ends with a non-empty tag mask.

use crate::{
    memory::WorkspaceMemory,
    monitor::Monitor,
    tag::{tag, TAGMASK},
};

/// A static placement template. Unset match fields match anything; set ones
/// are substring matches against the window's properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rule {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub title: Option<String>,
    pub tags: u32,
    pub floating: bool,
    /// Index of the monitor to place the window on.
    pub monitor: Option<usize>,
}

impl Rule {
    pub fn for_class(class: &str) -> Rule {
        Rule {
            class: Some(class.to_string()),
            ..Rule::default()
        }
    }

    pub fn with_tags(mut self, tags: u32) -> Rule {
        self.tags = tags;
        self
    }

    pub fn floating(mut self) -> Rule {
        self.floating = true;
        self
    }

    pub fn on_monitor(mut self, monitor: usize) -> Rule {
        self.monitor = Some(monitor);
        self
    }

    pub fn matches(&self, class: &str, instance: &str, title: &str) -> bool {
        fn field(pattern: &Option<String>, value: &str) -> bool {
            pattern.as_ref().map_or(true, |p| value.contains(p.as_str()))
        }
        field(&self.title, title) && field(&self.class, class) && field(&self.instance, instance)
    }
}

/// Where a new window ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub tags: u32,
    pub floating: bool,
    pub monitor: usize,
    /// Tag number taken from the workspace memory, if that decided the tags.
    pub remembered: Option<u32>,
}

/**
 * Decide tags, floating state and monitor for a window with the given
 * WM_CLASS and title.
 *
 * A remembered tag for (class, instance) wins over the tags of matching
 * rules, but the floating and monitor fields of matching rules still apply.
 * Rules are applied in table order: tags accumulate, floating and monitor are
 * overwritten by each match. A rule naming a monitor that does not exist is
 * ignored for monitor selection. Windows without any tag land on the current
 * view of their monitor.
 */
pub fn apply_rules(
    rules: &[Rule],
    memory: &WorkspaceMemory,
    class: &str,
    instance: &str,
    title: &str,
    monitors: &[Monitor],
    selected: usize,
) -> Placement {
    let remembered = memory.tag_for(class, instance);
    let mut tags = remembered.map(tag).unwrap_or(0);
    let mut floating = false;
    let mut monitor = selected;

    for rule in rules.iter().filter(|r| r.matches(class, instance, title)) {
        trace!("rule {:?} matches {}/{}", rule, class, instance);
        floating = rule.floating;
        if remembered.is_none() {
            tags |= rule.tags;
        }
        if let Some(m) = rule.monitor.filter(|&m| m < monitors.len()) {
            monitor = m;
        }
    }

    tags &= TAGMASK;
    if tags == 0 {
        tags = monitors.get(monitor).map(|m| m.view()).unwrap_or(1);
    }

    Placement {
        tags,
        floating,
        monitor,
        remembered,
    }
}
