use crate::error::Error;
use crate::signature::Signature;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::oneshot;

pub(crate) type Outcome = Result<Value, Error>;

/// One in-flight network call and everyone waiting on it.
struct PendingOperation {
    waiters: Mutex<Vec<oneshot::Sender<Outcome>>>,
}

/// Result of asking the registry about a signature: either this caller
/// leads (and must drive the network operation) or it joined an existing
/// one. Both variants carry the receiver for the shared outcome.
pub(crate) enum JoinOutcome {
    Lead(oneshot::Receiver<Outcome>),
    Joined(oneshot::Receiver<Outcome>),
}

/// Map from request signature to the single operation satisfying it.
///
/// `join_or_lead` and `settle` both go through the map's entry locks, so
/// "check pending / create pending" is one atomic step and a caller
/// arriving at the instant of settle either joins the settling operation
/// or starts a fresh one, never both.
pub(crate) struct DedupRegistry {
    pending: DashMap<Signature, PendingOperation>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    pub fn join_or_lead(&self, signature: &Signature) -> JoinOutcome {
        let (tx, rx) = oneshot::channel();
        match self.pending.entry(signature.clone()) {
            Entry::Occupied(entry) => {
                if let Ok(mut waiters) = entry.get().waiters.lock() {
                    waiters.push(tx);
                }
                JoinOutcome::Joined(rx)
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingOperation {
                    waiters: Mutex::new(vec![tx]),
                });
                JoinOutcome::Lead(rx)
            }
        }
    }

    /// Removes the operation and fans the outcome to every waiter. Removal
    /// happens first; joins are only possible while the entry is present.
    pub fn settle(&self, signature: &Signature, outcome: &Outcome) {
        if let Some((_, operation)) = self.pending.remove(signature) {
            if let Ok(mut waiters) = operation.waiters.lock() {
                log::debug!("settling {} waiter(s) for {signature}", waiters.len());
                for waiter in waiters.drain(..) {
                    let _ = waiter.send(outcome.clone());
                }
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.pending
            .iter()
            .map(|entry| entry.value().waiters.lock().map(|w| w.len()).unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Method;
    use crate::transport::HttpRequest;
    use serde_json::json;

    fn signature(url: &str) -> Signature {
        Signature::of(&HttpRequest {
            url: url.to_string(),
            method: Method::Get,
            headers: vec![],
            body: None,
        })
    }

    #[tokio::test]
    async fn second_caller_joins_the_first() {
        let registry = DedupRegistry::new();
        let signature = signature("https://api.talent.example/candidates");

        let first = registry.join_or_lead(&signature);
        let second = registry.join_or_lead(&signature);

        assert!(matches!(first, JoinOutcome::Lead(_)));
        assert!(matches!(second, JoinOutcome::Joined(_)));
        assert_eq!(registry.pending_count(), 1);
        assert_eq!(registry.waiter_count(), 2);
    }

    #[tokio::test]
    async fn settle_delivers_one_outcome_to_all_waiters() {
        let registry = DedupRegistry::new();
        let signature = signature("https://api.talent.example/candidates");

        let (JoinOutcome::Lead(first) | JoinOutcome::Joined(first)) =
            registry.join_or_lead(&signature);
        let (JoinOutcome::Lead(second) | JoinOutcome::Joined(second)) =
            registry.join_or_lead(&signature);

        registry.settle(&signature, &Ok(json!({"id": 7})));

        assert_eq!(first.await.unwrap().unwrap(), json!({"id": 7}));
        assert_eq!(second.await.unwrap().unwrap(), json!({"id": 7}));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn settling_an_absent_signature_is_a_no_op() {
        let registry = DedupRegistry::new();
        registry.settle(&signature("https://api.talent.example/skills"), &Ok(json!(null)));
        assert_eq!(registry.pending_count(), 0);
    }
}
