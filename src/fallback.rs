//! "Still working" messages for slow steps.

use crate::progress::Feedback;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Drive `operation` to completion, showing `messages[i]` once `delays[i]`
/// has elapsed without it finishing.
///
/// The operation and the timers are raced with `select!`; the operation
/// wins ties. When the operation finishes every pending timer is dropped,
/// so no message for this step can appear afterwards.
pub(crate) async fn with_fallback_messages<F>(
    operation: F,
    delays: &[Duration],
    messages: &[&str],
    feedback: &Feedback,
) -> F::Output
where
    F: Future,
{
    tokio::pin!(operation);
    let start = Instant::now();

    for (delay, message) in delays.iter().zip(messages) {
        tokio::select! {
            biased;
            output = &mut operation => return output,
            _ = sleep_until(start + *delay) => {
                tracing::debug!(text = *message, "step still running");
                feedback.message(message);
            }
        }
    }

    operation.await
}
