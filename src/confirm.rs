//! Asking the user whether to replace an existing installation.
//!
//! The orchestrator suspends on [`ConfirmationGate::ask_replace_or_skip`]
//! until a decision arrives, however long that takes. Any presentation
//! (dialog, terminal prompt, fixed answer) implements the gate.

use futures::future::BoxFuture;
use semver::Version;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Answer to a replace-or-skip question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ReplaceDecision {
    /// Delete the existing installation and install the new bundle.
    Replace,
    /// Keep the existing installation and finish without copying.
    Skip,
}

/// What the user is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePrompt {
    /// Name of the bundle, e.g. `MyApp.app`.
    pub bundle_name: String,
    /// Where the existing installation lives.
    pub existing_path: PathBuf,
    /// Version of the existing installation, when readable.
    pub installed_version: Option<Version>,
    /// Version of the bundle on the disk image, when readable.
    pub incoming_version: Option<Version>,
}

/// Decides whether an existing installation is replaced.
pub trait ConfirmationGate: Send + Sync {
    /// Ask about `prompt` and wait for the decision.
    fn ask_replace_or_skip<'a>(
        &'a self,
        prompt: &'a ReplacePrompt,
    ) -> BoxFuture<'a, ReplaceDecision>;
}

/// Gate that always gives the same answer.
///
/// ```rust
/// use dmg_installer::{AutoGate, ReplaceDecision};
///
/// let gate = AutoGate(ReplaceDecision::Replace);
/// assert_eq!(gate.0, ReplaceDecision::Replace);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AutoGate(pub ReplaceDecision);

impl ConfirmationGate for AutoGate {
    fn ask_replace_or_skip<'a>(
        &'a self,
        _prompt: &'a ReplacePrompt,
    ) -> BoxFuture<'a, ReplaceDecision> {
        let decision = self.0;
        Box::pin(async move { decision })
    }
}

/// A question waiting for an answer from whoever holds the receiver.
#[derive(Debug)]
pub struct PendingConfirmation {
    /// The question.
    pub prompt: ReplacePrompt,
    reply: oneshot::Sender<ReplaceDecision>,
}

impl PendingConfirmation {
    /// Resume the waiting job with `decision`.
    pub fn answer(self, decision: ReplaceDecision) {
        if self.reply.send(decision).is_err() {
            tracing::debug!("confirmation answered after the job stopped waiting");
        }
    }
}

/// Gate that hands questions to another task over a channel.
///
/// If the receiving side goes away, or drops a question unanswered, the
/// decision is [`ReplaceDecision::Skip`] so nothing is deleted.
#[derive(Debug, Clone)]
pub struct ChannelGate {
    tx: mpsc::Sender<PendingConfirmation>,
}

impl ChannelGate {
    /// Create a gate and the receiver its questions arrive on.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingConfirmation>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl ConfirmationGate for ChannelGate {
    fn ask_replace_or_skip<'a>(
        &'a self,
        prompt: &'a ReplacePrompt,
    ) -> BoxFuture<'a, ReplaceDecision> {
        Box::pin(async move {
            let (reply, answer) = oneshot::channel();
            let pending = PendingConfirmation {
                prompt: prompt.clone(),
                reply,
            };
            if self.tx.send(pending).await.is_err() {
                tracing::warn!(
                    bundle = %prompt.bundle_name,
                    "nobody to confirm replacement, skipping"
                );
                return ReplaceDecision::Skip;
            }
            answer.await.unwrap_or_else(|_| {
                tracing::warn!(bundle = %prompt.bundle_name, "confirmation dropped, skipping");
                ReplaceDecision::Skip
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn prompt() -> ReplacePrompt {
        ReplacePrompt {
            bundle_name: "MyApp.app".to_string(),
            existing_path: PathBuf::from("/Applications/MyApp.app"),
            installed_version: Some(Version::new(1, 0, 0)),
            incoming_version: None,
        }
    }

    #[tokio::test]
    async fn test_auto_gate() {
        let p = prompt();
        let skip = AutoGate(ReplaceDecision::Skip);
        assert_eq!(skip.ask_replace_or_skip(&p).await, ReplaceDecision::Skip);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_gate_waits_for_answer() {
        let (gate, mut rx) = ChannelGate::new(1);
        let answerer = tokio::spawn(async move {
            let pending = rx.recv().await.unwrap();
            assert_eq!(pending.prompt.bundle_name, "MyApp.app");
            // A human taking their time.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            pending.answer(ReplaceDecision::Replace);
        });

        let p = prompt();
        assert_eq!(gate.ask_replace_or_skip(&p).await, ReplaceDecision::Replace);
        answerer.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_gate_closed_receiver_skips() {
        let (gate, rx) = ChannelGate::new(1);
        drop(rx);
        let p = prompt();
        assert_eq!(gate.ask_replace_or_skip(&p).await, ReplaceDecision::Skip);
    }

    #[tokio::test]
    async fn test_channel_gate_dropped_question_skips() {
        let (gate, mut rx) = ChannelGate::new(1);
        tokio::spawn(async move {
            let pending = rx.recv().await.unwrap();
            drop(pending);
        });
        let p = prompt();
        assert_eq!(gate.ask_replace_or_skip(&p).await, ReplaceDecision::Skip);
    }
}
