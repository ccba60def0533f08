//! Observer connection management for the broadcast server
//!
//! Observers are read-only subscribers: they register once and then
//! receive the per-tick update stream. This module tracks who is
//! connected, enforces the capacity limit, and times out observers
//! that stopped sending keepalives.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected observer.
#[derive(Debug)]
pub struct Observer {
    /// Unique observer identifier assigned by the server
    pub id: u32,
    /// Network address for sending updates
    pub addr: SocketAddr,
    /// Last time we received any packet from this observer
    pub last_seen: Instant,
}

impl Observer {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// True if no packets have been received within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Registry of connected observers with a capacity limit.
pub struct ObserverManager {
    observers: HashMap<u32, Observer>,
    next_observer_id: u32,
    max_observers: usize,
}

impl ObserverManager {
    pub fn new(max_observers: usize) -> Self {
        Self {
            observers: HashMap::new(),
            next_observer_id: 1,
            max_observers,
        }
    }

    /// Registers a new observer. Returns `Some(id)` on success, `None`
    /// when the server is at capacity.
    pub fn add_observer(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.observers.len() >= self.max_observers {
            return None;
        }

        let id = self.next_observer_id;
        self.next_observer_id += 1;

        info!("Observer {} connected from {}", id, addr);
        self.observers.insert(id, Observer::new(id, addr));

        Some(id)
    }

    /// Removes an observer. Returns true if it was present.
    pub fn remove_observer(&mut self, id: &u32) -> bool {
        if let Some(observer) = self.observers.remove(id) {
            info!("Observer {} disconnected", observer.id);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.observers
            .iter()
            .find(|(_, observer)| observer.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the last-seen timestamp for the observer at `addr`.
    pub fn touch(&mut self, addr: SocketAddr) {
        for observer in self.observers.values_mut() {
            if observer.addr == addr {
                observer.last_seen = Instant::now();
            }
        }
    }

    /// Removes observers that stopped sending packets and returns their
    /// ids.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .observers
            .iter()
            .filter(|(_, observer)| observer.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            self.remove_observer(id);
        }

        timed_out
    }

    /// All observer ids and addresses, for broadcasting.
    pub fn addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.observers
            .iter()
            .map(|(id, observer)| (*id, observer.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
