use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    webhook_requests: AtomicU64,
    webhook_duplicates: AtomicU64,
    webhook_rejected: AtomicU64,
    webhook_ignored: AtomicU64,
    payments_initialized: AtomicU64,
    payments_succeeded: AtomicU64,
    payments_failed: AtomicU64,
    payments_refunded: AtomicU64,
    payments_flagged: AtomicU64,
    tickets_issued: AtomicU64,
    checkins_admitted: AtomicU64,
    checkins_denied: AtomicU64,
    integrity_failures: AtomicU64,
    ticket_transfers: AtomicU64,
    outbox_delivered: AtomicU64,
    outbox_failed: AtomicU64,
}

impl Metrics {
    pub fn record_webhook_request(&self) {
        self.webhook_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_duplicate(&self) {
        self.webhook_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_rejected(&self) {
        self.webhook_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_ignored(&self) {
        self.webhook_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_initialized(&self) {
        self.payments_initialized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_succeeded(&self) {
        self.payments_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_failed(&self) {
        self.payments_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_refunded(&self) {
        self.payments_refunded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_flagged(&self) {
        self.payments_flagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tickets_issued(&self, count: usize) {
        self.tickets_issued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_checkin_admitted(&self) {
        self.checkins_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkin_denied(&self) {
        self.checkins_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_integrity_failure(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_transfer(&self) {
        self.ticket_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbox_delivered(&self) {
        self.outbox_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbox_failed(&self) {
        self.outbox_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("usher_webhook_requests_total", &self.webhook_requests),
            ("usher_webhook_duplicates_total", &self.webhook_duplicates),
            ("usher_webhook_rejected_total", &self.webhook_rejected),
            ("usher_webhook_ignored_total", &self.webhook_ignored),
            ("usher_payments_initialized_total", &self.payments_initialized),
            ("usher_payments_succeeded_total", &self.payments_succeeded),
            ("usher_payments_failed_total", &self.payments_failed),
            ("usher_payments_refunded_total", &self.payments_refunded),
            ("usher_payments_flagged_total", &self.payments_flagged),
            ("usher_tickets_issued_total", &self.tickets_issued),
            ("usher_checkins_admitted_total", &self.checkins_admitted),
            ("usher_checkins_denied_total", &self.checkins_denied),
            ("usher_integrity_failures_total", &self.integrity_failures),
            ("usher_ticket_transfers_total", &self.ticket_transfers),
            ("usher_outbox_delivered_total", &self.outbox_delivered),
            ("usher_outbox_failed_total", &self.outbox_failed),
        ];

        let mut out = String::new();
        for (name, counter) in counters {
            let value = counter.load(Ordering::Relaxed);
            out.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prometheus_output_lists_every_counter() {
        let metrics = Metrics::default();
        metrics.record_webhook_request();
        metrics.record_tickets_issued(3);

        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("usher_webhook_requests_total 1"));
        assert!(rendered.contains("usher_tickets_issued_total 3"));
        assert!(rendered.contains("usher_outbox_failed_total 0"));
        assert_eq!(rendered.matches("# TYPE").count(), 16);
    }
}
