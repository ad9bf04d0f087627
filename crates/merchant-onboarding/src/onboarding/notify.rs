//! User-facing notifications, passed explicitly to the adapters that raise them.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
}

/// Dismissible message. `retryable` toasts offer a "Try again" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub retryable: bool,
}

impl Toast {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            message: message.into(),
            retryable,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Collects the toasts raised while handling one request.
#[derive(Debug, Default)]
pub struct ToastBuffer {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastBuffer {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().expect("toast mutex poisoned").clone()
    }

    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.toasts.lock().expect("toast mutex poisoned"))
    }
}

impl Notifier for ToastBuffer {
    fn notify(&self, toast: Toast) {
        info!(level = ?toast.level, title = %toast.title, "toast raised");
        self.toasts.lock().expect("toast mutex poisoned").push(toast);
    }
}

/// Split a machine error name into capitalized words: `validationError` -> `Validation Error`.
pub fn humanize_error_name(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if matches!(c, '_' | '-' | ' ' | '.') {
            flush(&mut current, &mut words);
            previous = None;
            continue;
        }
        let boundary = c.is_uppercase()
            && previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
        if boundary {
            flush(&mut current, &mut words);
        }
        current.push(c);
        previous = Some(c);
    }
    flush(&mut current, &mut words);
    words.join(" ")
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let mut chars = current.chars();
    if let Some(first) = chars.next() {
        let word: String = first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect();
        words.push(word);
    }
    current.clear();
}
