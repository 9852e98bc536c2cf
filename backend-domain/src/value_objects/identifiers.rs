// Identifier value objects

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderReference(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketNumber(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl PaymentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl TicketId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl ProviderReference {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// No 0/O/1/I so gate staff can read a number out loud without ambiguity.
const TICKET_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TICKET_NUMBER_LENGTH: usize = 8;

impl TicketNumber {
    /// Opaque, non-sequential admit-one number, e.g. `TKT-7XKQ2MWR`.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token: String = (0..TICKET_NUMBER_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..TICKET_NUMBER_ALPHABET.len());
                TICKET_NUMBER_ALPHABET[idx] as char
            })
            .collect();
        Self(format!("TKT-{}", token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ticket_numbers_use_the_unambiguous_alphabet() {
        let number = TicketNumber::generate();
        let token = number.as_str().strip_prefix("TKT-").expect("TKT- prefix");
        assert_eq!(token.len(), TICKET_NUMBER_LENGTH);
        assert!(token
            .bytes()
            .all(|byte| TICKET_NUMBER_ALPHABET.contains(&byte)));
    }

    #[test]
    fn ticket_numbers_do_not_collide_in_a_small_batch() {
        let numbers: HashSet<String> = (0..200)
            .map(|_| TicketNumber::generate().0)
            .collect();
        assert_eq!(numbers.len(), 200);
    }
}
