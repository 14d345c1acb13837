// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mailbox delivery interface.
//!
//! Actors are addressed by a numeric [`Handle`] and communicate only by
//! pushing [`Message`]s into each other's inbox. The timing wheel consumes
//! this through the [`Dispatcher`] trait; [`ActorRegistry`] is the in-process
//! implementation backed by crossbeam channels.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Actor address. 0 is reserved for the runtime itself.
pub type Handle = u32;

/// Caller-chosen correlation token.
pub type Session = i32;

/// Source handle used for messages generated by the runtime (timer responses).
pub const SYSTEM_HANDLE: Handle = 0;

/// Message type tag carried with every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Text = 0,
    /// Reply to a request or an expired timeout.
    Response = 1,
    /// Frame received from a client connection.
    Client = 3,
    System = 4,
    Socket = 6,
    Error = 7,
}

impl MessageType {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(tag: u8) -> std::result::Result<Self, u8> {
        match tag {
            0 => Ok(Self::Text),
            1 => Ok(Self::Response),
            3 => Ok(Self::Client),
            4 => Ok(Self::System),
            6 => Ok(Self::Socket),
            7 => Ok(Self::Error),
            other => Err(other),
        }
    }
}

/// One mailbox entry. The payload, if any, is owned by the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: Handle,
    pub session: Session,
    pub kind: MessageType,
    pub payload: Option<Vec<u8>>,
}

impl Message {
    /// Empty response, as produced by an expired timeout.
    pub fn response(session: Session) -> Self {
        Self {
            source: SYSTEM_HANDLE,
            session,
            kind: MessageType::Response,
            payload: None,
        }
    }

    pub fn with_payload(source: Handle, session: Session, kind: MessageType, data: Vec<u8>) -> Self {
        Self {
            source,
            session,
            kind,
            payload: Some(data),
        }
    }

    /// Payload length in bytes (0 when empty).
    pub fn len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enqueue a message into an actor's inbox.
pub trait Dispatcher: Send + Sync {
    /// Returns [`Error::ActorNotFound`] if `target` no longer resolves.
    fn push(&self, target: Handle, message: Message) -> Result<()>;
}

/// Handle table mapping live actors to their inbox senders.
#[derive(Debug)]
pub struct ActorRegistry {
    inboxes: DashMap<Handle, Sender<Message>>,
    next_handle: AtomicU32,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
            next_handle: AtomicU32::new(1),
        }
    }

    /// Allocate a handle with an unbounded inbox.
    pub fn register(&self) -> (Handle, Receiver<Message>) {
        let (tx, rx) = channel::unbounded();
        let handle = loop {
            let h = self.next_handle.fetch_add(1, Ordering::Relaxed);
            // Skip the system handle after wraparound and anything still live
            if h != SYSTEM_HANDLE && !self.inboxes.contains_key(&h) {
                break h;
            }
        };
        self.inboxes.insert(handle, tx);
        log::debug!("[registry] registered :{:08x}", handle);
        (handle, rx)
    }

    /// Remove an actor. Later deliveries to `handle` fail with `ActorNotFound`.
    pub fn retire(&self, handle: Handle) -> bool {
        let removed = self.inboxes.remove(&handle).is_some();
        if removed {
            log::debug!("[registry] retired :{:08x}", handle);
        }
        removed
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.inboxes.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.inboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes.is_empty()
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for ActorRegistry {
    fn push(&self, target: Handle, message: Message) -> Result<()> {
        let sender = match self.inboxes.get(&target) {
            Some(entry) => entry.value().clone(),
            None => return Err(Error::ActorNotFound(target)),
        };
        // Receiver dropped without retire(): treat the same as a dead actor
        sender
            .send(message)
            .map_err(|_| Error::ActorNotFound(target))
    }
}
