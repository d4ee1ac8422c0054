//! Fallback tokio runtime for when engine operations are called outside
//! any runtime context (e.g. from a host UI thread). Shared across all
//! engine instances and never dropped.

use once_cell::sync::Lazy;

static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Current runtime if available, otherwise the global fallback.
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}
