//! Tracked address book
//!
//! Maps tracked addresses to display aliases. Addresses without an alias
//! render as lowercase hex.

use crate::config::AccountConfig;
use alloy_primitives::Address;
use std::collections::{HashMap, HashSet};

/// Static mapping from tracked address to display alias.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    aliases: HashMap<Address, String>,
}

impl AddressBook {
    pub fn new(accounts: &[AccountConfig]) -> Self {
        let mut aliases = HashMap::new();
        for acc in accounts {
            if let Some(alias) = &acc.alias {
                aliases.insert(acc.address, alias.clone());
            } else {
                aliases.insert(acc.address, format!("0x{:x}", acc.address));
            }
        }
        Self { aliases }
    }

    /// Alias for the address, or its lowercase hex form if none is configured.
    pub fn lookup(&self, addr: Address) -> String {
        match self.aliases.get(&addr) {
            Some(alias) => alias.clone(),
            None => format!("0x{:x}", addr),
        }
    }

    /// The set of tracked addresses.
    pub fn tracked(&self) -> HashSet<Address> {
        self.aliases.keys().copied().collect()
    }
}
