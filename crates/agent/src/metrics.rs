//! Counters recorded by the engine
//!
//! Exported by the server's Prometheus recorder when one is installed;
//! otherwise these are no-ops.

pub fn record_intent(intent: &str) {
    ::metrics::counter!("careline_intents_total", "intent" => intent.to_string()).increment(1);
}

pub fn record_created(kind: &'static str) {
    ::metrics::counter!("careline_records_created_total", "kind" => kind).increment(1);
}

pub fn record_outbound(success: bool) {
    let outcome = if success { "sent" } else { "failed" };
    ::metrics::counter!("careline_outbound_messages_total", "outcome" => outcome).increment(1);
}
