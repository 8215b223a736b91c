//! Scheduler for the crawl frontier and concurrency admission
//!
//! This module handles:
//! - Queueing discovered URLs until a slot is free
//! - FIFO or random dispatch order
//! - Keeping the number of in-flight requests at or below `concurrency`
//! - Driving every attempt through Queued → InFlight → terminal

use crate::config::DispatchOrder;
use crate::sitemap::DiscoveredUrl;
use crate::state::AttemptState;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

/// A single request attempt for a discovered URL
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Run-unique attempt number, starting at 1
    pub id: u64,

    /// The URL and how it was found
    pub discovered: DiscoveredUrl,
}

/// Scheduler manages the frontier queue and the state of every live attempt
///
/// It never performs I/O; the coordinator asks it for work whenever an event
/// may have freed a slot or queued a URL.
#[derive(Debug)]
pub struct Scheduler {
    /// Attempts waiting for a slot, in discovery order
    frontier: VecDeque<Attempt>,

    /// State of every attempt that has not reached a terminal state
    attempts: HashMap<u64, AttemptState>,

    /// How the next attempt is picked
    order: DispatchOrder,

    /// Maximum simultaneous requests
    concurrency: usize,

    /// Attempts in the InFlight state
    in_flight: usize,

    /// Id handed to the next queued attempt
    next_id: u64,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize, order: DispatchOrder) -> Self {
        Self {
            frontier: VecDeque::new(),
            attempts: HashMap::new(),
            order,
            concurrency: concurrency.max(1),
            in_flight: 0,
            next_id: 1,
        }
    }

    /// Queues a URL as a new attempt and returns its id
    pub fn add_to_frontier(&mut self, discovered: DiscoveredUrl) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.attempts.insert(id, AttemptState::Queued);
        self.frontier.push_back(Attempt { id, discovered });
        id
    }

    /// Takes the next attempt when a slot is free
    ///
    /// # Returns
    ///
    /// * `Some(Attempt)` - The attempt to run; it is now in flight
    /// * `None` - Every slot is taken or nothing is queued
    pub fn try_dispatch(&mut self) -> Option<Attempt> {
        if self.in_flight >= self.concurrency {
            return None;
        }

        let next = match self.order {
            DispatchOrder::Fifo => self.frontier.pop_front(),
            DispatchOrder::Random => {
                if self.frontier.is_empty() {
                    None
                } else {
                    let index = rand::rng().random_range(0..self.frontier.len());
                    self.frontier.swap_remove_back(index)
                }
            }
        }?;

        self.transition(next.id, AttemptState::InFlight);
        self.in_flight += 1;
        Some(next)
    }

    /// Moves an in-flight attempt to its terminal state and frees its slot
    ///
    /// Returns false, leaving everything untouched, when `id` is not in
    /// flight or `state` is not terminal.
    pub fn complete(&mut self, id: u64, state: AttemptState) -> bool {
        if !state.is_terminal() {
            tracing::warn!("Attempt {} cannot complete as {}", id, state);
            return false;
        }
        if !self.transition(id, state) {
            return false;
        }

        self.attempts.remove(&id);
        self.in_flight -= 1;
        true
    }

    /// Current state of a live attempt
    pub fn state(&self, id: u64) -> Option<AttemptState> {
        self.attempts.get(&id).copied()
    }

    fn transition(&mut self, id: u64, next: AttemptState) -> bool {
        match self.attempts.get_mut(&id) {
            Some(current) if current.can_transition_to(next) => {
                *current = next;
                true
            }
            Some(current) => {
                tracing::warn!("Attempt {} cannot move from {} to {}", id, current, next);
                false
            }
            None => {
                tracing::warn!("Attempt {} is unknown", id);
                false
            }
        }
    }

    /// Number of queued attempts
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Number of attempts in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Configured slot count
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// True when no attempt is queued or running
    pub fn is_idle(&self) -> bool {
        self.attempts.is_empty()
    }
}
