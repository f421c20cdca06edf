#![no_main]

use kyc_reconcile::HmacVerifier;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split between key, payload and claimed signature.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(rest.len());
    let (key, payload) = rest.split_at(split);
    let Ok(verifier) = HmacVerifier::new(key) else {
        return;
    };

    let signature = verifier.sign(payload);
    assert!(verifier.verify(payload, &signature));

    let claimed = String::from_utf8_lossy(payload);
    let _ = verifier.verify(key, &claimed);
});
