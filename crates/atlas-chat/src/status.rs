//! Shared one-line status area.

use std::sync::{Arc, Mutex, MutexGuard};

/// The status line below the input panel, shared by the session and the job
/// scheduler. Cloning yields another handle to the same line.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    text: Arc<Mutex<String>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> String {
        self.lock().clone()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.lock() = text.into();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Clear only if the line still shows `expected`, so a newer message from
    /// another source is not wiped.
    pub fn clear_if(&self, expected: &str) {
        let mut text = self.lock();
        if *text == expected {
            text.clear();
        }
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
