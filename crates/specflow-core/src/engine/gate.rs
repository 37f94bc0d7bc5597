use crate::core::models::frequency::FrequencyReport;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Evaluating,
    Clean,
    Flagged { count: usize, minimum: f64 },
    Approved,
    Rejected,
}

impl GateState {
    /// Whether the pipeline may proceed past the gate.
    pub fn may_continue(&self) -> bool {
        matches!(self, Self::Clean | Self::Approved)
    }
}

pub fn flagged_message(count: usize, minimum: f64) -> String {
    format!(
        "Found {} negative frequencies. Minimum frequency is {:.2} cm**-1. Continue processing?",
        count, minimum
    )
}

/// Answers the yes/no question raised by a flagged spectrum.
pub trait DecisionProvider: Send + Sync {
    fn decide(&self, message: String) -> impl Future<Output = bool> + Send;
}

/// Gives the same answer to every question, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoDecision(pub bool);

impl DecisionProvider for AutoDecision {
    async fn decide(&self, message: String) -> bool {
        info!(approved = self.0, "{}", message);
        self.0
    }
}

/// A question awaiting an answer from the other end of a [`ChannelDecision`].
#[derive(Debug)]
pub struct DecisionRequest {
    pub message: String,
    reply: oneshot::Sender<bool>,
}

impl DecisionRequest {
    pub fn respond(self, approved: bool) {
        let _ = self.reply.send(approved);
    }
}

/// Forwards each question over a channel and waits for the reply.
///
/// A receiver that has gone away, or a request dropped without a response, counts as a
/// rejection.
#[derive(Debug, Clone)]
pub struct ChannelDecision {
    tx: mpsc::Sender<DecisionRequest>,
}

impl ChannelDecision {
    pub fn new(tx: mpsc::Sender<DecisionRequest>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DecisionRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

impl DecisionProvider for ChannelDecision {
    async fn decide(&self, message: String) -> bool {
        let (reply, answer) = oneshot::channel();
        if self.tx.send(DecisionRequest { message, reply }).await.is_err() {
            warn!("Decision channel is closed; treating the question as rejected.");
            return false;
        }
        answer.await.unwrap_or(false)
    }
}

/// The checkpoint between quantum-chemistry stages.
///
/// `Evaluating` moves to `Clean` when the spectrum has no negative frequency and to
/// `Flagged` otherwise; a flagged gate then asks the provider and settles on `Approved` or
/// `Rejected`.
#[derive(Debug, Clone)]
pub struct FrequencyGate {
    state: GateState,
}

impl Default for FrequencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Evaluating,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn evaluate(&mut self, report: &FrequencyReport) -> &GateState {
        self.state = match report.minimum_negative() {
            Some(minimum) => GateState::Flagged {
                count: report.negative_count(),
                minimum,
            },
            None => GateState::Clean,
        };
        &self.state
    }

    /// Settles a flagged gate by asking `provider`. Other states are left as they are.
    pub async fn resolve<D: DecisionProvider>(&mut self, provider: &D) -> &GateState {
        if let GateState::Flagged { count, minimum } = self.state {
            let approved = provider.decide(flagged_message(count, minimum)).await;
            self.state = if approved {
                GateState::Approved
            } else {
                GateState::Rejected
            };
        }
        &self.state
    }

    /// Evaluates `report` and, if flagged, resolves the gate. Returns the terminal state.
    pub async fn check<D: DecisionProvider>(report: &FrequencyReport, provider: &D) -> GateState {
        let mut gate = Self::new();
        gate.evaluate(report);
        gate.resolve(provider).await.clone()
    }
}
