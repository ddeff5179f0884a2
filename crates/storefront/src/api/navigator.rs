//! View-layer hook used by the client for forced redirects.

use std::sync::{Mutex, PoisonError};

/// The part of the UI the HTTP client needs to know about: where the user
/// currently is, and how to send them back to the login entry point.
pub trait Navigator: Send + Sync {
    /// Path of the view currently shown.
    fn current_path(&self) -> String;

    /// Full navigation reset to `path`. In-memory view state does not survive
    /// this.
    fn reset_to(&self, path: &str);
}

/// A navigator without a real view: it remembers the current path and every
/// reset. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct HeadlessNavigator {
    current: Mutex<String>,
    resets: Mutex<Vec<String>>,
}

impl HeadlessNavigator {
    /// Start at `path`.
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self {
            current: Mutex::new(path.to_owned()),
            resets: Mutex::new(Vec::new()),
        }
    }

    /// Move to `path` without a reset (normal in-app navigation).
    pub fn navigate(&self, path: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = path.to_owned();
    }

    /// Every path passed to [`Navigator::reset_to`], oldest first.
    #[must_use]
    pub fn resets(&self) -> Vec<String> {
        self.resets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for HeadlessNavigator {
    fn current_path(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reset_to(&self, path: &str) {
        tracing::info!(path, "Navigation reset");
        self.navigate(path);
        self.resets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_moves_and_records() {
        let nav = HeadlessNavigator::at("/cart");
        nav.navigate("/products");
        assert_eq!(nav.current_path(), "/products");
        assert!(nav.resets().is_empty());

        nav.reset_to("/login");
        assert_eq!(nav.current_path(), "/login");
        assert_eq!(nav.resets(), vec!["/login".to_string()]);
    }
}
