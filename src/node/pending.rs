// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::node::{Message, MessageId, Transport, TransportErr};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestErr {
    /// No response arrived in time
    Timeout,

    Transport(TransportErr),

    /// The listener was dropped before a response arrived
    Cancelled,
}

impl From<TransportErr> for RequestErr {
    fn from(other: TransportErr) -> Self {
        Self::Transport(other)
    }
}

impl fmt::Display for RequestErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("request timed out"),
            Self::Transport(err) => write!(f, "transport error: {err:?}"),
            Self::Cancelled => f.write_str("request cancelled"),
        }
    }
}

/// Outstanding requests awaiting their response, keyed by message id.
#[derive(Default)]
pub struct PendingRequests {
    listeners: Mutex<HashMap<MessageId, oneshot::Sender<Message>>>,
}

impl PendingRequests {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&self, id: MessageId) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.listeners.lock().insert(id, tx);
        rx
    }

    /// Hands `res` to the listener registered under its id. Returns false
    /// for late or unsolicited responses.
    pub fn complete(&self, res: Message) -> bool {
        let listener = self.listeners.lock().remove(&res.id);

        match listener {
            Some(tx) => tx.send(res).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, id: &MessageId) {
        self.listeners.lock().remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `req` and waits up to `wait` for the matching response. The
    /// listener is always cleared when this returns.
    pub async fn request(
        &self,
        transport: &dyn Transport,
        req: Message,
        to: SocketAddr,
        wait: Duration,
    ) -> Result<Message, RequestErr> {
        let id = req.id;
        let rx = self.register(id);

        if let Err(err) = transport.send(req, to).await {
            self.remove(&id);
            return Err(err.into());
        }

        match timeout(wait, rx).await {
            Ok(Ok(res)) => Ok(res),
            Ok(Err(_)) => {
                self.remove(&id);
                Err(RequestErr::Cancelled)
            }
            Err(_) => {
                self.remove(&id);
                Err(RequestErr::Timeout)
            }
        }
    }
}
