use metrics::{counter, gauge};

pub fn record_received() {
    counter!("incidents_received_total").increment(1);
}

pub fn record_rejected() {
    counter!("incidents_rejected_total").increment(1);
}

pub fn record_duplicate() {
    counter!("incidents_duplicate_total").increment(1);
}

pub fn record_evicted(count: usize) {
    counter!("incidents_evicted_total").increment(count as u64);
}

pub fn record_page_fetch_failure() {
    counter!("page_fetch_failures_total").increment(1);
}

pub fn set_stream_open(open: bool) {
    gauge!("stream_open").set(if open { 1.0 } else { 0.0 });
}
