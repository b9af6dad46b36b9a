//! Per-exchange correlation identifiers.
//!
//! The id lives in a task-local for the duration of the handler's future.
//! Code that runs after the handler returned (body streaming) re-enters a
//! captured id with [`scope_sync`].

use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Value reported outside any exchange.
pub const NO_CORRELATION_ID: &str = "-";

/// Correlation id of the current exchange, if any.
pub fn current() -> Option<String> {
    CORRELATION_ID.try_with(Clone::clone).ok()
}

/// Run `fut` with `id` as the current correlation id.
pub async fn scope<F>(id: String, fut: F) -> F::Output
where
    F: Future,
{
    CORRELATION_ID.scope(id, fut).await
}

/// Run `f` synchronously with `id` as the current correlation id.
pub fn scope_sync<R>(id: String, f: impl FnOnce() -> R) -> R {
    CORRELATION_ID.sync_scope(id, f)
}

/// A fresh id: UUIDv4 as 32 hex digits.
pub fn generate() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Incoming ids are only trusted when they parse as a UUID.
pub fn is_valid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_exposes_id() {
        assert_eq!(current(), None);
        let seen = scope("abc".to_string(), async { current() }).await;
        assert_eq!(seen.as_deref(), Some("abc"));
        assert_eq!(current(), None);
    }

    #[test]
    fn sync_scope_exposes_id() {
        let seen = scope_sync("def".to_string(), current);
        assert_eq!(seen.as_deref(), Some("def"));
    }

    #[test]
    fn generated_ids_are_hex_uuids() {
        let id = generate();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid(&id));
        assert!(!is_valid("not-a-uuid"));
    }
}
