#![no_main]

use libfuzzer_sys::fuzz_target;
use pushlite_delivery::{resolve_push_image, ImageResolvePolicy, PushImage};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let policy = ImageResolvePolicy {
        max_inline_bytes: 4_096,
    };

    match resolve_push_image(&raw, policy) {
        Ok(None) => assert!(raw.trim().is_empty()),
        Ok(Some(PushImage::Remote { url })) => {
            assert!(url.starts_with("http://") || url.starts_with("https://"));
        }
        Ok(Some(PushImage::Inline { bytes, mime_type })) => {
            assert!(!bytes.is_empty());
            assert!(bytes.len() <= policy.max_inline_bytes);
            assert!(
                mime_type.to_ascii_lowercase().starts_with("image/")
                    || mime_type == "application/octet-stream"
            );
        }
        Err(error) => assert!(!error.to_string().trim().is_empty()),
    }
});
