//! Core traits for the toggle engine.

use super::error::ToggleError;

/// Channel for user-visible failures.
///
/// Invoked once per toggle that ultimately fails in a way the user must
/// learn about (see [`ToggleError::is_user_visible`]). The error's `Display`
/// is the human-readable message; presenting it is up to the UI layer.
///
/// Closures implement this trait:
///
/// ```
/// use toggle_sync::core::{ErrorNotifier, ToggleError};
///
/// let notifier = |err: &ToggleError| eprintln!("toast: {err}");
/// let boxed: Box<dyn ErrorNotifier> = Box::new(notifier);
/// # let _ = boxed;
/// ```
pub trait ErrorNotifier: Send + Sync {
    /// Report a user-visible failure.
    fn notify(&self, error: &ToggleError);
}

impl<F> ErrorNotifier for F
where
    F: Fn(&ToggleError) + Send + Sync,
{
    fn notify(&self, error: &ToggleError) {
        self(error)
    }
}

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl ErrorNotifier for SilentNotifier {
    fn notify(&self, _error: &ToggleError) {}
}
