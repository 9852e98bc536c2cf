// Payment provider value object

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Paystack,
    Flutterwave,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Paystack => "paystack",
            ProviderKind::Flutterwave => "flutterwave",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "paystack" => Some(ProviderKind::Paystack),
            "flutterwave" => Some(ProviderKind::Flutterwave),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ProviderKind::parse(" Paystack "), Some(ProviderKind::Paystack));
        assert_eq!(ProviderKind::parse("FLUTTERWAVE"), Some(ProviderKind::Flutterwave));
        assert_eq!(ProviderKind::parse("stripe"), None);
    }
}
