//! Alert handlers.

use std::{borrow::Cow, future::Future, sync::Arc};

use crate::ws::Alert;

/// Handler can be registered to a [StreamClient](crate::StreamClient) and
/// will be invoked once per decoded alert, in frame-arrival order.
///
/// A plain async closure taking an [`Alert`] also works as a handler.
#[async_trait::async_trait]
pub trait AlertHandler: Send + Sync {
    /// handler name, used for log attribution
    fn name(&self) -> Cow<'static, str>;
    /// callback will be executed when the client decodes an alert frame
    async fn on_alert(self: Arc<Self>, alert: Alert);
}

#[async_trait::async_trait]
impl<F, Fut> AlertHandler for F
where
    F: Fn(Alert) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    fn name(&self) -> Cow<'static, str> {
        "Anonymous Fn Handler".into()
    }

    async fn on_alert(self: Arc<Self>, alert: Alert) {
        self(alert).await
    }
}
