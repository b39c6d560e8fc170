//! Scripted [`Transport`] for controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::transport::{GetRequest, MutationRequest, Transport};

type GetResult = Result<Value, TransportError>;
type SendResult = Result<(), TransportError>;

enum Reply<T> {
    Ready(T),
    Gated(oneshot::Receiver<T>),
    Never,
}

/// Records every request; answers list reads from a queue (falling back to a
/// default body) and mutations by path (falling back to success).
pub(crate) struct FakeTransport {
    default_get: Value,
    gets: Mutex<Vec<GetRequest>>,
    sends: Mutex<Vec<MutationRequest>>,
    get_replies: Mutex<VecDeque<Reply<GetResult>>>,
    send_replies: Mutex<HashMap<String, Reply<SendResult>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeTransport {
    pub(crate) fn new(default_get: Value) -> Self {
        Self {
            default_get,
            gets: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            get_replies: Mutex::new(VecDeque::new()),
            send_replies: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a list reply for the next read.
    pub(crate) fn reply(&self, result: GetResult) {
        locked(&self.get_replies).push_back(Reply::Ready(result));
    }

    /// Queue a list reply released through the returned sender.
    pub(crate) fn gate(&self) -> oneshot::Sender<GetResult> {
        let (sender, receiver) = oneshot::channel();
        locked(&self.get_replies).push_back(Reply::Gated(receiver));
        sender
    }

    /// Queue a list read that never answers.
    pub(crate) fn hang(&self) {
        locked(&self.get_replies).push_back(Reply::Never);
    }

    /// Answer the next mutation on `path` with `result`.
    pub(crate) fn on_send(&self, path: &str, result: SendResult) {
        locked(&self.send_replies).insert(path.to_string(), Reply::Ready(result));
    }

    /// Hold the next mutation on `path` until the returned sender fires.
    pub(crate) fn gate_send(&self, path: &str) -> oneshot::Sender<SendResult> {
        let (sender, receiver) = oneshot::channel();
        locked(&self.send_replies).insert(path.to_string(), Reply::Gated(receiver));
        sender
    }

    pub(crate) fn gets(&self) -> Vec<GetRequest> {
        locked(&self.gets).clone()
    }

    pub(crate) fn sends(&self) -> Vec<MutationRequest> {
        locked(&self.sends).clone()
    }
}

async fn resolve<T>(reply: Reply<T>, dropped: T) -> T {
    match reply {
        Reply::Ready(result) => result,
        Reply::Gated(receiver) => receiver.await.unwrap_or(dropped),
        Reply::Never => std::future::pending().await,
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, request: &GetRequest) -> Result<Value, TransportError> {
        locked(&self.gets).push(request.clone());
        let reply = locked(&self.get_replies)
            .pop_front()
            .unwrap_or_else(|| Reply::Ready(Ok(self.default_get.clone())));
        resolve(reply, Err(TransportError::Network("gate dropped".into()))).await
    }

    async fn send(&self, request: &MutationRequest) -> Result<(), TransportError> {
        locked(&self.sends).push(request.clone());
        let reply = locked(&self.send_replies)
            .remove(&request.path)
            .unwrap_or(Reply::Ready(Ok(())));
        resolve(reply, Err(TransportError::Network("gate dropped".into()))).await
    }
}
