//! Message router dispatching decoded messages by type filter.
//!
//! Consumers register with the set of message types they care about and are
//! invoked in registration order. A failing consumer is logged and never
//! prevents later consumers from running.
//!
//! # Example
//!
//! ```ignore
//! use homewire_client::dispatch::MessageRouter;
//! use homewire_client::protocol::MessageType;
//!
//! let mut router = MessageRouter::new();
//! router.register(&[MessageType::ValueStates], |msg| async move {
//!     println!("{} value updates", msg.len());
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::protocol::{DecodedMessage, MessageType};
use crate::BoxFuture;

/// Error type surfaced by consumer and observer callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for consumer callbacks.
pub type ConsumerResult = std::result::Result<(), CallbackError>;

/// Set of message types a registration is interested in.
///
/// The type space is a closed set of 8 codes, so a `u8` bitmask covers it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFilter(u8);

impl TypeFilter {
    /// Filter matching exactly the given types.
    pub fn of(types: &[MessageType]) -> Self {
        Self(types.iter().fold(0, |mask, ty| mask | 1 << ty.code()))
    }

    /// Filter matching every message type.
    pub fn all() -> Self {
        Self(u8::MAX)
    }

    /// Check whether a type is in the filter.
    #[inline]
    pub fn contains(&self, ty: MessageType) -> bool {
        self.0 & (1 << ty.code()) != 0
    }
}

/// Trait for message consumer callbacks.
pub trait MessageConsumer: Send + Sync + 'static {
    /// Consume one decoded message.
    fn call(&self, msg: Arc<DecodedMessage>) -> BoxFuture<'static, ConsumerResult>;
}

/// Wrapper turning an async closure into a [`MessageConsumer`].
struct FnConsumer<F, Fut>
where
    F: Fn(Arc<DecodedMessage>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ConsumerResult> + Send + 'static,
{
    f: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> MessageConsumer for FnConsumer<F, Fut>
where
    F: Fn(Arc<DecodedMessage>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ConsumerResult> + Send + 'static,
{
    fn call(&self, msg: Arc<DecodedMessage>) -> BoxFuture<'static, ConsumerResult> {
        Box::pin((self.f)(msg))
    }
}

struct Registration {
    filter: TypeFilter,
    consumer: Box<dyn MessageConsumer>,
}

/// Router mapping message types to ordered consumer lists.
#[derive(Default)]
pub struct MessageRouter {
    registrations: Vec<Registration>,
}

impl MessageRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer for the given message types.
    ///
    /// Invocation order for a message equals registration order.
    pub fn register<F, Fut>(&mut self, types: &[MessageType], consumer: F)
    where
        F: Fn(Arc<DecodedMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConsumerResult> + Send + 'static,
    {
        self.registrations.push(Registration {
            filter: TypeFilter::of(types),
            consumer: Box::new(FnConsumer {
                f: consumer,
                _phantom: PhantomData,
            }),
        });
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Check if no consumers are registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invoke every consumer whose filter contains the message type.
    ///
    /// Consumers run sequentially in registration order. Errors are logged
    /// per consumer and never propagate.
    pub async fn dispatch(&self, msg: Arc<DecodedMessage>) {
        for (idx, reg) in self.registrations.iter().enumerate() {
            if !reg.filter.contains(msg.msg_type) {
                continue;
            }
            if let Err(e) = reg.consumer.call(Arc::clone(&msg)).await {
                tracing::error!(
                    consumer = idx,
                    msg_type = ?msg.msg_type,
                    "message consumer failed: {}",
                    e
                );
            }
        }
    }
}
