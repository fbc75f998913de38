//! Plain-text bundle encoding for `bundle put plain`.
//!
//! Format (fields in this order, LF line endings):
//!
//! ```text
//! Source: dtn://node1/app
//! Destination: dtn://broker/app
//! Processing flags: 148
//! Blocks: 1
//!
//! Block: 1
//! Flags: LAST_BLOCK
//! Length: 10
//!
//! eyJ0IjoyMS41fQ==
//!
//! ```
//!
//! The payload block carries the UTF-8 bytes of the payload, Base64 encoded on a single line.
//! `Length` is the decoded byte count.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Processing flags requesting custody transfer.
pub const CUSTODY_PROCESSING_FLAGS: u32 = 156;

/// Processing flags without custody transfer.
pub const DEFAULT_PROCESSING_FLAGS: u32 = 148;

/// Processing flags value for the custody choice.
#[must_use]
pub fn processing_flags(custody: bool) -> u32 {
    if custody {
        CUSTODY_PROCESSING_FLAGS
    } else {
        DEFAULT_PROCESSING_FLAGS
    }
}

/// Build the plain bundle text for one payload.
///
/// Pure and deterministic. No JSON validation happens here.
#[must_use]
pub fn encode(source_eid: &str, destination_eid: &str, payload: &str, custody: bool) -> String {
    let bytes = payload.as_bytes();
    let encoded = STANDARD.encode(bytes);

    let mut bundle = String::with_capacity(128 + encoded.len());
    bundle.push_str(&format!("Source: {}\n", source_eid));
    bundle.push_str(&format!("Destination: {}\n", destination_eid));
    bundle.push_str(&format!("Processing flags: {}\n", processing_flags(custody)));
    bundle.push_str("Blocks: 1\n\n");
    bundle.push_str("Block: 1\n");
    bundle.push_str("Flags: LAST_BLOCK\n");
    bundle.push_str(&format!("Length: {}\n\n", bytes.len()));
    bundle.push_str(&encoded);
    bundle.push_str("\n\n");
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(bundle: &'a str, name: &str) -> Option<&'a str> {
        bundle
            .lines()
            .find_map(|line| line.strip_prefix(name).and_then(|rest| rest.strip_prefix(": ")))
    }

    fn payload_line(bundle: &str) -> &str {
        // Payload follows the blank line after the block header.
        bundle.split("\n\n").nth(2).unwrap_or_default()
    }

    #[test]
    fn sensor_reading_example() {
        let bundle = encode("dtn://node1/app", "dtn://broker/app", r#"{"t":21.5}"#, false);

        assert_eq!(field(&bundle, "Source"), Some("dtn://node1/app"));
        assert_eq!(field(&bundle, "Destination"), Some("dtn://broker/app"));
        assert_eq!(field(&bundle, "Processing flags"), Some("148"));

        let decoded = STANDARD.decode(payload_line(&bundle)).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), r#"{"t":21.5}"#);
    }

    #[test]
    fn exact_layout() {
        let bundle = encode("dtn://a/x", "dtn://b/y", "{}", true);
        assert_eq!(
            bundle,
            "Source: dtn://a/x\n\
             Destination: dtn://b/y\n\
             Processing flags: 156\n\
             Blocks: 1\n\
             \n\
             Block: 1\n\
             Flags: LAST_BLOCK\n\
             Length: 2\n\
             \n\
             e30=\n\
             \n"
        );
    }

    #[test]
    fn custody_selects_flags() {
        for custody in [true, false] {
            let bundle = encode("dtn://a/x", "dtn://b/y", "{}", custody);
            let expected = if custody { "156" } else { "148" };
            assert_eq!(field(&bundle, "Processing flags"), Some(expected));
        }
    }

    #[test]
    fn length_counts_utf8_bytes() {
        for payload in ["", "{}", r#"{"city":"São Paulo"}"#, r#"["µg/m³"]"#] {
            let bundle = encode("dtn://a/x", "dtn://b/y", payload, false);
            let length: usize = field(&bundle, "Length").unwrap().parse().unwrap();
            assert_eq!(length, payload.len());
            let decoded = STANDARD.decode(payload_line(&bundle)).unwrap();
            assert_eq!(decoded, payload.as_bytes());
        }
    }

    #[test]
    fn empty_payload_still_encodes() {
        let bundle = encode("dtn://a/x", "dtn://b/y", "", false);
        assert_eq!(field(&bundle, "Length"), Some("0"));
        assert_eq!(payload_line(&bundle), "");
    }

    #[test]
    fn deterministic() {
        let a = encode("dtn://a/x", "dtn://b/y", r#"{"pm25":3}"#, true);
        let b = encode("dtn://a/x", "dtn://b/y", r#"{"pm25":3}"#, true);
        assert_eq!(a, b);
    }
}
