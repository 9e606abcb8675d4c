//! Persisted display preferences for the file details view.
//!
//! Font size picks the wrap width (a larger font fits fewer characters per
//! line); collapsed mode indents the body, expanded mode uses the full
//! width. The details view refuses to render until the preferences have
//! been rehydrated.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::output::{print_json, OutputMode};
use crate::persist::{Persisted, Snapshot};
use crate::storage::Storage;

pub const DISPLAY_STORAGE_KEY: &str = "file-details-storage";

/// Body indent when the view is not expanded.
pub const COLLAPSED_INDENT: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub fn wrap_width(&self) -> usize {
        match self {
            FontSize::Small => 100,
            FontSize::Medium => 80,
            FontSize::Large => 60,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FontSize::Small => "Small",
            FontSize::Medium => "Medium",
            FontSize::Large => "Large",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPrefs {
    pub font_size: FontSize,
    pub expanded: bool,
}

impl DisplayPrefs {
    pub fn indent(&self) -> usize {
        if self.expanded {
            0
        } else {
            COLLAPSED_INDENT
        }
    }
}

pub struct DisplayStore {
    persisted: Persisted<DisplayPrefs>,
}

impl DisplayStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            persisted: Persisted::new(storage, DISPLAY_STORAGE_KEY),
        }
    }

    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let mut store = Self::new(storage);
        store.persisted.rehydrate();
        store
    }

    pub fn rehydrate(&mut self) {
        self.persisted.rehydrate();
    }

    pub fn snapshot(&self) -> Snapshot<DisplayPrefs> {
        self.persisted.snapshot()
    }

    pub fn prefs(&self) -> &DisplayPrefs {
        self.persisted.state()
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        self.persisted.update(|p| p.font_size = size);
    }

    pub fn toggle_expanded(&mut self) -> bool {
        self.persisted.update(|p| {
            p.expanded = !p.expanded;
            p.expanded
        })
    }
}

pub fn run_prefs_show(store: &DisplayStore, mode: OutputMode) -> anyhow::Result<()> {
    let prefs = store.prefs();
    if mode == OutputMode::Json {
        return print_json(prefs);
    }
    println!(
        "font size:  {} (wraps at {} columns)",
        prefs.font_size.label(),
        prefs.font_size.wrap_width()
    );
    println!(
        "layout:     {}",
        if prefs.expanded { "expanded" } else { "collapsed" }
    );
    Ok(())
}

pub fn run_set_font_size(store: &mut DisplayStore, size: FontSize) -> anyhow::Result<()> {
    store.set_font_size(size);
    println!("Font size set to {}.", size.label());
    Ok(())
}

pub fn run_toggle_expanded(store: &mut DisplayStore) -> anyhow::Result<()> {
    let expanded = store.toggle_expanded();
    println!(
        "Details view is now {}.",
        if expanded { "expanded" } else { "collapsed" }
    );
    Ok(())
}

/// Word-wraps `text` to `width` columns (including `indent`), keeping blank
/// lines and leading markdown structure intact. Words longer than the
/// available width are placed on their own line unbroken.
pub fn wrap(text: &str, width: usize, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let avail = width.saturating_sub(indent).max(20);
    let mut out = String::with_capacity(text.len() + text.len() / 8);

    for line in text.lines() {
        if line.trim().is_empty() {
            out.push('\n');
            continue;
        }

        // Keep the line's own leading whitespace (lists, code) on every
        // wrapped row.
        let lead_len = line.len() - line.trim_start().len();
        let lead = &line[..lead_len];
        let mut current = String::new();

        for word in line.split_whitespace() {
            let needed = if current.is_empty() {
                lead.len() + word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if !current.is_empty() && needed > avail {
                out.push_str(&pad);
                out.push_str(&current);
                out.push('\n');
                current.clear();
            }
            if current.is_empty() {
                current.push_str(lead);
            } else {
                current.push(' ');
            }
            current.push_str(word);
        }

        out.push_str(&pad);
        out.push_str(&current);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn defaults_match_medium_collapsed() {
        let store = DisplayStore::open(Arc::new(MemoryStorage::new()));
        assert_eq!(store.prefs().font_size, FontSize::Medium);
        assert!(!store.prefs().expanded);
        assert_eq!(store.prefs().indent(), COLLAPSED_INDENT);
    }

    #[test]
    fn hydration_is_observable() {
        let mut store = DisplayStore::new(Arc::new(MemoryStorage::new()));
        assert!(!store.snapshot().hydrated);
        store.rehydrate();
        assert!(store.snapshot().hydrated);
    }

    #[test]
    fn prefs_persist() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = DisplayStore::open(storage.clone());
        store.set_font_size(FontSize::Large);
        assert!(store.toggle_expanded());

        let reloaded = DisplayStore::open(storage);
        assert_eq!(reloaded.prefs().font_size, FontSize::Large);
        assert!(reloaded.prefs().expanded);
        assert_eq!(reloaded.prefs().indent(), 0);
    }

    #[test]
    fn toggle_twice_restores() {
        let mut store = DisplayStore::open(Arc::new(MemoryStorage::new()));
        assert!(store.toggle_expanded());
        assert!(!store.toggle_expanded());
    }

    #[test]
    fn wrap_respects_width_and_indent() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let wrapped = wrap(text, 30, 4);
        for line in wrapped.lines() {
            assert!(line.starts_with("    "));
            assert!(line.chars().count() <= 30, "line too long: {:?}", line);
        }
        let rejoined: Vec<&str> = wrapped.split_whitespace().collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn wrap_keeps_blank_lines_and_list_indent() {
        let text = "# Title\n\n  - item with words";
        let wrapped = wrap(text, 80, 0);
        assert_eq!(wrapped, "# Title\n\n  - item with words\n");
    }

    #[test]
    fn wrap_does_not_split_long_words() {
        let long = "x".repeat(50);
        let wrapped = wrap(&format!("a {} b", long), 30, 0);
        assert!(wrapped.lines().any(|l| l == long));
    }
}
