//! Status-transition notifications.
//!
//! The engine reports successful status transitions to an external sender
//! (email, push, ...). Delivery is fire-and-forget relative to the state
//! change: a failed notification is logged and swallowed, never rolled
//! back into the transaction that moved the order.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use atrium_core::{Order, OrderStatus};

/// Notification delivery failure.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// External notification sender, invoked after status transitions commit.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Order confirmed (payment accepted, now processing).
    async fn confirmation_sent(&self, order: &Order) -> Result<(), NotifyError>;

    /// Order handed to the carrier.
    async fn shipping_notification_sent(&self, order: &Order) -> Result<(), NotifyError>;

    /// Order confirmed received.
    async fn delivery_confirmation_sent(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Dispatches the notification matching a committed transition and logs
/// (but never propagates) delivery failures.
pub(crate) async fn notify_transition(
    notifier: &dyn OrderNotifier,
    order: &Order,
    entered: OrderStatus,
) {
    let result = match entered {
        OrderStatus::Processing => notifier.confirmation_sent(order).await,
        OrderStatus::Shipped => notifier.shipping_notification_sent(order).await,
        OrderStatus::Delivered => notifier.delivery_confirmation_sent(order).await,
        // No customer-facing notification for the remaining states.
        OrderStatus::Pending | OrderStatus::Cancelled => return,
    };

    match result {
        Ok(()) => debug!(order_id = %order.id, status = %entered, "Notification dispatched"),
        Err(err) => {
            warn!(order_id = %order.id, status = %entered, error = %err, "Notification failed; status change stands")
        }
    }
}

/// Default notifier: does nothing.
///
/// The web layer installs the real sender; tests install a recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl OrderNotifier for NoopNotifier {
    async fn confirmation_sent(&self, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn shipping_notification_sent(&self, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn delivery_confirmation_sent(&self, _order: &Order) -> Result<(), NotifyError> {
        Ok(())
    }
}
