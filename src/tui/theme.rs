use crate::parser::Category;
use ratatui::style::Color;
use std::collections::HashMap;

/// Resolved color map for the seven fixed categories, plus the timeline
/// background used for opacity pre-blending.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    colors: [Color; 7],
    pub background: (u8, u8, u8),
}

impl Theme {
    pub fn color(&self, category: Category) -> Color {
        self.colors[category as usize]
    }

    /// Category color as rgb, for blending. Named terminal colors fall
    /// back to a representative rgb value.
    pub fn rgb(&self, category: Category) -> (u8, u8, u8) {
        match self.color(category) {
            Color::Rgb(r, g, b) => (r, g, b),
            Color::Blue => (0x2b, 0x6c, 0xee),
            Color::Green => (0x2e, 0xa0, 0x43),
            Color::Yellow => (0xd4, 0xa7, 0x2d),
            Color::Magenta => (0xb0, 0x4c, 0xc9),
            Color::Cyan => (0x2a, 0xa8, 0xa8),
            Color::Red => (0xd0, 0x45, 0x45),
            _ => (0xc0, 0xc0, 0xc0),
        }
    }
}

fn default_colors() -> [Color; 7] {
    // Indexed by Category discriminant order
    [
        Color::Rgb(0x6b, 0xad, 0x68), // Code Unit
        Color::Rgb(0x51, 0xac, 0xc2), // Workflow
        Color::Rgb(0x2b, 0x6c, 0xee), // Method
        Color::Rgb(0x23, 0x7a, 0x72), // Flow
        Color::Rgb(0xb0, 0x4c, 0xc9), // DML
        Color::Rgb(0xd4, 0xa7, 0x2d), // SOQL
        Color::Rgb(0x8a, 0x8a, 0x8a), // System Method
    ]
}

fn legacy_colors() -> [Color; 7] {
    [
        Color::Green,
        Color::Cyan,
        Color::Blue,
        Color::Cyan,
        Color::Magenta,
        Color::Yellow,
        Color::Rgb(0x88, 0x88, 0x88),
    ]
}

/// Explicitly constructed, passed-around store of named themes. `get`
/// starts from the built-in base palette and deterministically applies a
/// named theme's overrides on top.
#[derive(Debug, Default)]
pub struct ThemeStore {
    themes: HashMap<String, HashMap<Category, Color>>,

    /// Select the legacy built-in palette as the base
    pub legacy: bool,
}

impl ThemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a named theme's category overrides
    pub fn add(&mut self, name: impl Into<String>, overrides: HashMap<Category, Color>) {
        self.themes.insert(name.into(), overrides);
    }

    /// Resolve a theme by name. Unknown names resolve to the base
    /// palette unchanged.
    pub fn get(&self, name: &str) -> Theme {
        let mut colors = if self.legacy {
            legacy_colors()
        } else {
            default_colors()
        };

        if let Some(overrides) = self.themes.get(name) {
            for category in Category::ALL {
                if let Some(&color) = overrides.get(&category) {
                    colors[category as usize] = color;
                }
            }
        }

        Theme {
            colors,
            background: (0x12, 0x12, 0x12),
        }
    }
}
