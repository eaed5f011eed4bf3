//! Fuzz testing for submission parsing and escaping.
//!
//! Arbitrary bytes are fed to the request body parser, the email syntax check
//! and the HTML escaper. None of them may panic, and escaped output must never
//! contain a raw markup character.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use contact_relay::sanitize::{EscapedSubmission, escape_html};
use contact_relay::template::Template;
use contact_relay::validation::{parse_submission, validate_email};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw bytes straight into the body parser, like an untrusted request
    if let Ok(submission) = parse_submission(data) {
        let escaped = EscapedSubmission::from_submission(&submission);
        let rendered = Template::from_string("%FIRSTNAME%|%LASTNAME%|%PHONE%|%EMAIL%|%MESSAGE%")
            .render(&escaped);
        assert!(!rendered.contains('<'));
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_email(s);

        let escaped = escape_html(s);
        assert!(!escaped.contains(['<', '>', '"', '\'']));
    }
});
