//! Transfer events
//!
//! One Transfer is emitted per matching transaction or log and consumed
//! once by the notification dispatcher. Fire-and-forget, no replay.

use crate::token::Token;
use alloy_primitives::{Address, U256};
use std::sync::Arc;

/// Whether the tracked address is the sender or the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// A value movement touching a tracked address.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub direction: Direction,
    pub from: Address,
    pub to: Address,
    /// Amount in the token's smallest unit
    pub value: U256,
    pub token: Arc<Token>,
}

impl Transfer {
    /// The tracked endpoint this transfer is attributed to.
    pub fn endpoint(&self) -> Address {
        match self.direction {
            Direction::Sent => self.from,
            Direction::Received => self.to,
        }
    }
}
