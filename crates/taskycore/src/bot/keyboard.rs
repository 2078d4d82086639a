//! Inline keyboard building blocks.

use serde::{Deserialize, Serialize};

/// Callback token of the pagination counter button; acknowledged, nothing else.
pub const NOOP_TOKEN: &str = "noop";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Grid of callback buttons, one `Vec` per row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Single-column keyboard
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn button(self, button: Button) -> Self {
        self.row(vec![button])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Every button, row-major
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.buttons().map(|b| b.token.as_str()).collect()
    }
}

/// Lays `buttons` out `n_cols` per row, with optional single-button
/// header and footer rows.
pub fn build_menu(buttons: Vec<Button>, n_cols: usize, header: Option<Button>, footer: Option<Button>) -> Keyboard {
    let n_cols = n_cols.max(1);
    let mut rows: Vec<Vec<Button>> = Vec::new();

    if let Some(header) = header {
        rows.push(vec![header]);
    }
    let mut buttons = buttons.into_iter().peekable();
    while buttons.peek().is_some() {
        rows.push(buttons.by_ref().take(n_cols).collect());
    }
    if let Some(footer) = footer {
        rows.push(vec![footer]);
    }

    Keyboard { rows }
}

/// `⬅️ Previous | 📄 i/N | Next ➡️` row; arrows only where a page exists.
///
/// `current` is 0-based; page tokens are `{prefix}:{page}`.
pub fn pagination_row(current: usize, total: usize, prefix: &str) -> Vec<Button> {
    let total = total.max(1);
    let mut row = Vec::with_capacity(3);

    if current > 0 {
        row.push(Button::new("⬅️ Previous", format!("{}:{}", prefix, current - 1)));
    }
    row.push(Button::new(format!("📄 {}/{}", current.saturating_add(1), total), NOOP_TOKEN));
    if current.checked_add(1).is_some_and(|next| next < total) {
        row.push(Button::new("Next ➡️", format!("{}:{}", prefix, current + 1)));
    }

    row
}

pub fn back_button(token: &str) -> Button {
    Button::new("🔙 Back", token)
}

pub fn cancel_button(token: &str) -> Button {
    Button::new("❌ Cancel", token)
}

/// Default tokens used when a screen has no better place to go back to
pub mod tokens {
    pub const BACK: &str = "back";
    pub const CANCEL: &str = "cancel";
    pub const MENU: &str = "menu";
}
