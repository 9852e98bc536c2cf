// Signed QR payload codec
//
// The payload is a dot-joined string:
//
//   tix.v1.<ticket uuid>.<ticket number>.<owner hash>.<issued at>.<tag>
//
// The tag is HMAC-SHA256 over the pipe-joined fields, so no field can be
// altered without detection. The payload is derived, never stored: it can
// be regenerated from the ticket at any time, which is also why expiry
// here only bounds re-display freshness. The persisted ticket status is
// authoritative for the actual admit decision.

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::Ticket;
use crate::value_objects::{TicketId, TicketNumber};

const PAYLOAD_PREFIX: &str = "tix";
const PAYLOAD_VERSION: &str = "v1";
const PAYLOAD_SECTIONS: usize = 7;
const OWNER_HASH_LENGTH: usize = 16;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("malformed payload")]
    Malformed,
    #[error("integrity tag mismatch")]
    TagMismatch,
    #[error("payload expired")]
    Expired,
}

/// Fields recovered from a payload that passed the integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrClaims {
    pub ticket_id: TicketId,
    pub ticket_number: TicketNumber,
    pub owner_hash: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QrCodec {
    mac: HmacSha256,
    freshness: chrono::Duration,
}

impl QrCodec {
    pub fn new(secret: &str, freshness_hours: i64) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|err| anyhow!("hmac init failed: {err}"))?;
        Ok(Self {
            mac,
            freshness: chrono::Duration::hours(freshness_hours),
        })
    }

    /// Derive the payload for a ticket as of `issued_at`. Idempotent for
    /// the same inputs; callers stamp `Utc::now()` to mint a fresh one.
    pub fn encode(&self, ticket: &Ticket, issued_at: DateTime<Utc>) -> String {
        let ticket_id = ticket.id.0.simple().to_string();
        let owner = owner_hash(&ticket.owner_email);
        let issued = issued_at.timestamp();
        let tag = self.tag(&ticket_id, ticket.ticket_number.as_str(), &owner, issued);
        format!(
            "{}.{}.{}.{}.{}.{}.{}",
            PAYLOAD_PREFIX,
            PAYLOAD_VERSION,
            ticket_id,
            ticket.ticket_number.as_str(),
            owner,
            issued,
            tag
        )
    }

    /// Verify and unpack a presented payload. The tag is checked in
    /// constant time before any field is trusted; expiry is evaluated
    /// last so a stale-but-genuine payload reports `Expired`, not
    /// `TagMismatch`.
    pub fn decode(&self, payload: &str, now: DateTime<Utc>) -> Result<QrClaims, QrError> {
        let sections: Vec<&str> = payload.trim().split('.').collect();
        if sections.len() != PAYLOAD_SECTIONS {
            return Err(QrError::Malformed);
        }
        if sections[0] != PAYLOAD_PREFIX || sections[1] != PAYLOAD_VERSION {
            return Err(QrError::Malformed);
        }
        let ticket_uuid = Uuid::try_parse(sections[2]).map_err(|_| QrError::Malformed)?;
        let ticket_number = sections[3];
        let owner = sections[4];
        if ticket_number.is_empty() || owner.len() != OWNER_HASH_LENGTH {
            return Err(QrError::Malformed);
        }
        let issued: i64 = sections[5].parse().map_err(|_| QrError::Malformed)?;
        let tag = hex::decode(sections[6]).map_err(|_| QrError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(signing_input(sections[2], ticket_number, owner, issued).as_bytes());
        if mac.verify_slice(&tag).is_err() {
            return Err(QrError::TagMismatch);
        }

        let issued_at = Utc
            .timestamp_opt(issued, 0)
            .single()
            .ok_or(QrError::Malformed)?;
        if now.signed_duration_since(issued_at) > self.freshness {
            return Err(QrError::Expired);
        }

        Ok(QrClaims {
            ticket_id: TicketId(ticket_uuid),
            ticket_number: TicketNumber(ticket_number.to_string()),
            owner_hash: owner.to_string(),
            issued_at,
        })
    }

    fn tag(&self, ticket_id: &str, ticket_number: &str, owner: &str, issued: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(signing_input(ticket_id, ticket_number, owner, issued).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn signing_input(ticket_id: &str, ticket_number: &str, owner: &str, issued: i64) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        PAYLOAD_PREFIX, PAYLOAD_VERSION, ticket_id, ticket_number, owner, issued
    )
}

/// Short identity binding for the current holder: the first 16 hex chars
/// of SHA-256 over the trimmed, lowercased email. Enough to detect a
/// stale pre-transfer payload without putting the address itself into
/// the QR image.
pub fn owner_hash(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    hex::encode(digest)[..OWNER_HASH_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{OrderId, TicketStatus};

    fn codec() -> QrCodec {
        QrCodec::new("gate-secret", 12).expect("codec")
    }

    fn sample_ticket() -> Ticket {
        Ticket {
            id: TicketId::generate(),
            order_id: OrderId::generate(),
            owner_name: "Ada Obi".to_string(),
            owner_email: "ada@example.com".to_string(),
            ticket_type: "standard".to_string(),
            ticket_number: TicketNumber("TKT-7XKQ2MWR".to_string()),
            status: TicketStatus::Active,
            transferred_from: None,
            validated_at: None,
            validated_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trip_recovers_ticket_identity() {
        let codec = codec();
        let ticket = sample_ticket();
        let issued_at = Utc::now();
        let payload = codec.encode(&ticket, issued_at);

        let claims = codec.decode(&payload, Utc::now()).expect("decode");
        assert_eq!(claims.ticket_id, ticket.id);
        assert_eq!(claims.ticket_number, ticket.ticket_number);
        assert_eq!(claims.owner_hash, owner_hash(&ticket.owner_email));
        assert_eq!(claims.issued_at.timestamp(), issued_at.timestamp());
    }

    #[test]
    fn tampered_ticket_number_fails_the_tag() {
        let codec = codec();
        let payload = codec.encode(&sample_ticket(), Utc::now());
        let tampered = payload.replacen("TKT-7", "TKT-8", 1);
        assert_ne!(payload, tampered);
        let err = codec.decode(&tampered, Utc::now()).expect_err("reject");
        assert_eq!(err, QrError::TagMismatch);
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let codec = codec();
        let payload = codec.encode(&sample_ticket(), Utc::now());
        let last = payload.chars().last().expect("tag digit");
        let flipped = if last == '0' { '1' } else { '0' };
        let mut tampered = payload.clone();
        tampered.pop();
        tampered.push(flipped);
        let err = codec.decode(&tampered, Utc::now()).expect_err("reject");
        assert_eq!(err, QrError::TagMismatch);
    }

    #[test]
    fn wrong_secret_fails_the_tag() {
        let payload = codec().encode(&sample_ticket(), Utc::now());
        let other = QrCodec::new("different-secret", 12).expect("codec");
        let err = other.decode(&payload, Utc::now()).expect_err("reject");
        assert_eq!(err, QrError::TagMismatch);
    }

    #[test]
    fn stale_payload_expires() {
        let codec = codec();
        let issued_at = Utc::now() - chrono::Duration::hours(13);
        let payload = codec.encode(&sample_ticket(), issued_at);
        let err = codec.decode(&payload, Utc::now()).expect_err("reject");
        assert_eq!(err, QrError::Expired);

        let within = Utc::now() - chrono::Duration::hours(11);
        let fresh = codec.encode(&sample_ticket(), within);
        assert!(codec.decode(&fresh, Utc::now()).is_ok());
    }

    #[test]
    fn garbage_payloads_are_malformed() {
        let codec = codec();
        for payload in [
            "",
            "tix.v1.short",
            "tkt.v1.a.b.c.d.e",
            "tix.v2.a.b.c.d.e",
            "tix.v1.not-a-uuid.TKT-X.0011223344556677.1700000000.aabb",
        ] {
            let err = codec.decode(payload, Utc::now()).expect_err("reject");
            assert_eq!(err, QrError::Malformed, "payload: {payload}");
        }
    }

    #[test]
    fn owner_hash_normalizes_case_and_whitespace() {
        assert_eq!(owner_hash("Ada@Example.com "), owner_hash("ada@example.com"));
        assert_ne!(owner_hash("ada@example.com"), owner_hash("obi@example.com"));
        assert_eq!(owner_hash("ada@example.com").len(), OWNER_HASH_LENGTH);
    }
}
