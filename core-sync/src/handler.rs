//! Handler dispatch
//!
//! Each `(media level, data type)` pair is bound at startup to the handlers
//! that apply it. The engine pairs a local item with its remote counterpart
//! and the registry forwards the pair to every bound handler, in
//! registration order.

use crate::error::{Result, SyncError};
use crate::media::{SyncData, SyncMedia};
use crate::remote::{RemoteEpisode, RemoteMovie, RemoteShow};
use async_trait::async_trait;
use core_library::{LocalEpisode, LocalId, LocalMovie, LocalShow};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Local side of a matched pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalItem {
    Show(LocalShow),
    Episode(LocalEpisode),
    Movie(LocalMovie),
}

/// Remote side of a matched pair
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteItem {
    Show(RemoteShow),
    Episode(RemoteEpisode),
    Movie(RemoteMovie),
}

/// Applies one data type to a matched pair.
///
/// `remote` is `None` when the pk is known but the remote tree for this data
/// type has no node for it; handlers may still push local state.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn apply(
        &self,
        key: LocalId,
        local: LocalItem,
        remote: Option<RemoteItem>,
    ) -> anyhow::Result<()>;
}

/// What the run does when a handler fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandlerFailurePolicy {
    /// Stop the run and surface the error
    #[default]
    Abort,
    /// Report the failure and move on to the next unit
    SkipUnit,
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(SyncMedia, SyncData), Vec<Arc<dyn SyncHandler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bindings: Vec<String> = self
            .handlers
            .iter()
            .map(|((media, data), handlers)| format!("{}/{} x{}", media, data, handlers.len()))
            .collect();
        bindings.sort();

        f.debug_struct("HandlerRegistry")
            .field("bindings", &bindings)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        media: SyncMedia,
        data: SyncData,
        handler: Arc<dyn SyncHandler>,
    ) -> &mut Self {
        self.handlers.entry((media, data)).or_default().push(handler);
        self
    }

    pub fn handler_count(&self, media: SyncMedia, data: SyncData) -> usize {
        self.handlers.get(&(media, data)).map_or(0, Vec::len)
    }

    /// Run every handler bound to `(media, data)` and return how many ran.
    ///
    /// Zero means nothing is bound. Stops at the first failure and wraps it
    /// with the dispatch context.
    pub async fn execute(
        &self,
        media: SyncMedia,
        data: SyncData,
        key: LocalId,
        local: &LocalItem,
        remote: Option<&RemoteItem>,
    ) -> Result<usize> {
        let Some(handlers) = self.handlers.get(&(media, data)) else {
            trace!(media = %media, data = %data, key = %key, "No handler bound");
            return Ok(0);
        };

        for handler in handlers {
            handler
                .apply(key, local.clone(), remote.cloned())
                .await
                .map_err(|source| SyncError::Handler {
                    media: media.to_string(),
                    data: data.to_string(),
                    key: key.to_string(),
                    source,
                })?;
        }

        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteState;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Handler {}

        #[async_trait::async_trait]
        impl SyncHandler for Handler {
            async fn apply(
                &self,
                key: LocalId,
                local: LocalItem,
                remote: Option<RemoteItem>,
            ) -> anyhow::Result<()>;
        }
    }

    fn show() -> LocalItem {
        LocalItem::Show(LocalShow::new(10, 1, "Community", "tvdb://94571"))
    }

    #[tokio::test]
    async fn test_execute_calls_bound_handlers_in_order() {
        let mut seq = mockall::Sequence::new();

        let mut first = MockHandler::new();
        first
            .expect_apply()
            .with(eq(LocalId(10)), eq(show()), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut second = MockHandler::new();
        second
            .expect_apply()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut registry = HandlerRegistry::new();
        registry
            .register(SyncMedia::Shows, SyncData::Ratings, Arc::new(first))
            .register(SyncMedia::Shows, SyncData::Ratings, Arc::new(second));

        assert_eq!(registry.handler_count(SyncMedia::Shows, SyncData::Ratings), 2);

        let applied = registry
            .execute(SyncMedia::Shows, SyncData::Ratings, LocalId(10), &show(), None)
            .await
            .unwrap();
        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn test_execute_without_binding_is_noop() {
        let registry = HandlerRegistry::new();
        let remote = RemoteItem::Show(RemoteShow::new("P1").with_state(RemoteState::default()));

        let applied = registry
            .execute(
                SyncMedia::Shows,
                SyncData::Watched,
                LocalId(10),
                &show(),
                Some(&remote),
            )
            .await
            .unwrap();
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn test_execute_wraps_failure() {
        let mut failing = MockHandler::new();
        failing
            .expect_apply()
            .returning(|_, _, _| Err(anyhow::anyhow!("remote rejected rating")));

        let mut never = MockHandler::new();
        never.expect_apply().never();

        let mut registry = HandlerRegistry::new();
        registry
            .register(SyncMedia::Shows, SyncData::Ratings, Arc::new(failing))
            .register(SyncMedia::Shows, SyncData::Ratings, Arc::new(never));

        let err = registry
            .execute(SyncMedia::Shows, SyncData::Ratings, LocalId(10), &show(), None)
            .await
            .unwrap_err();

        match err {
            SyncError::Handler { media, data, key, source } => {
                assert_eq!(media, "shows");
                assert_eq!(data, "ratings");
                assert_eq!(key, "10");
                assert_eq!(source.to_string(), "remote rejected rating");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_lists_bindings() {
        let mut registry = HandlerRegistry::new();
        registry.register(SyncMedia::Episodes, SyncData::Watched, Arc::new(MockHandler::new()));
        assert!(format!("{:?}", registry).contains("episodes/watched x1"));
    }

    #[test]
    fn test_default_policy_aborts() {
        assert_eq!(HandlerFailurePolicy::default(), HandlerFailurePolicy::Abort);
    }
}
