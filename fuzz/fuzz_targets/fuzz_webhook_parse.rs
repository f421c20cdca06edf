#![no_main]

use kyc_reconcile::{classify, resolve_user_id};
use kyc_types::{Timestamp, WebhookEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bodies must either parse or be rejected, never panic.
    let Ok(event) = WebhookEvent::parse(data, Timestamp::new(0)) else {
        return;
    };
    assert_eq!(event.raw_payload, data);

    let _ = classify(&event.event_type);
    if let Some(user_id) = resolve_user_id(&event.data) {
        assert!(!user_id.is_empty());
    }
    if let Some(provider_id) = event.data.provider_session_id() {
        assert!(!provider_id.is_empty());
    }
});
