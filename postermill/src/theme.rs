//! Visual themes (style parameters for the renderer).

use crate::error::RequestError;
use crate::providers::ThemeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Style parameters for one poster theme.
///
/// Colors are CSS-style hex strings; the renderer interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Theme identifier (e.g. "noir").
    pub name: String,
    /// Display name for galleries.
    pub display_name: String,
    /// Background color.
    pub bg: String,
    /// Text color.
    pub text: String,
    /// Water fill color.
    pub water: String,
    /// Park fill color.
    pub parks: String,
    /// Gradient fade color at the top/bottom edges.
    pub gradient: String,
}

impl Theme {
    /// The built-in default theme: high-contrast black and white.
    pub fn noir() -> Self {
        Self {
            name: "noir".to_string(),
            display_name: "Noir".to_string(),
            bg: "#0a0a0a".to_string(),
            text: "#f5f5f5".to_string(),
            water: "#1a1a2e".to_string(),
            parks: "#14281d".to_string(),
            gradient: "#0a0a0a".to_string(),
        }
    }

    /// Built-in alternative: white lines on architect blue.
    pub fn blueprint() -> Self {
        Self {
            name: "blueprint".to_string(),
            display_name: "Blueprint".to_string(),
            bg: "#102a5c".to_string(),
            text: "#e8eef7".to_string(),
            water: "#0b1f45".to_string(),
            parks: "#16356b".to_string(),
            gradient: "#102a5c".to_string(),
        }
    }
}

/// In-memory theme store.
///
/// The production deployment loads themes from disk behind the same trait;
/// this store covers embedded defaults and tests.
#[derive(Debug, Default)]
pub struct InMemoryThemeStore {
    themes: HashMap<String, Theme>,
}

impl InMemoryThemeStore {
    /// Creates a store seeded with the built-in themes.
    pub fn with_builtins() -> Self {
        let mut store = Self::default();
        store.insert(Theme::noir());
        store.insert(Theme::blueprint());
        store
    }

    /// Adds or replaces a theme, keyed by its name.
    pub fn insert(&mut self, theme: Theme) {
        self.themes.insert(theme.name.clone(), theme);
    }

    /// Returns the available theme names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.themes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ThemeStore for InMemoryThemeStore {
    fn load(&self, name: &str) -> Result<Theme, RequestError> {
        self.themes
            .get(name)
            .cloned()
            .ok_or_else(|| RequestError::UnknownTheme(name.to_string()))
    }
}
