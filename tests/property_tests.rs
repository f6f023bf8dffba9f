//! Property-based tests for cache key derivation and SVG handling.
//!
//! These tests use proptest to generate random inputs and verify invariants.

use canvas_render::core::{CacheKey, FragmentElement};
use canvas_render::rendering::svg;
use proptest::prelude::*;

fn element() -> impl Strategy<Value = FragmentElement> {
    (
        ".{0,12}",
        prop_oneof![Just(16.0f64), Just(20.0), Just(28.0), 1.0f64..100.0],
        prop_oneof![Just("math".to_string()), Just("hand".to_string()), "[a-z,\\[\\]\"]{0,6}"],
        prop_oneof![Just("#1e1e1e".to_string()), Just("#ffffff".to_string()), "#[0-9a-f]{6}"],
    )
        .prop_map(|(content, size, variant, color)| {
            FragmentElement::new(content, size, variant, color)
        })
}

// ============================================================================
// Cache key properties
// ============================================================================

/// Property: keys are equal exactly when the render inputs are equal
proptest! {
    #[test]
    fn prop_key_is_injective(a in element(), b in element()) {
        let same_inputs = a.content == b.content
            && a.font_size.to_bits() == b.font_size.to_bits()
            && a.font_variant == b.font_variant
            && a.color == b.color;
        prop_assert_eq!(a.cache_key() == b.cache_key(), same_inputs);
    }
}

/// Property: the host id never affects the key
proptest! {
    #[test]
    fn prop_key_ignores_id(e in element(), id in "[a-zA-Z0-9-]{0,10}") {
        prop_assert_eq!(e.cache_key(), e.clone().with_id(id).cache_key());
    }
}

/// Property: moving text between fields changes the key
proptest! {
    #[test]
    fn prop_key_fields_do_not_bleed(prefix in "[a-z\",]{1,5}", rest in "[a-z\",]{0,5}") {
        let joined = format!("{}{}", prefix, rest);
        let a = CacheKey::derive(&joined, 20.0, &rest, "#000");
        let b = CacheKey::derive(&rest, 20.0, &joined, "#000");
        prop_assert_ne!(a, b);
    }
}

// ============================================================================
// SVG properties
// ============================================================================

/// Property: sanitizing is idempotent
proptest! {
    #[test]
    fn prop_sanitize_is_idempotent(body in "[a-z <>/=\"]{0,40}") {
        let doc = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"><script>{}</script>{}</svg>"#,
            body, body
        );
        let once = svg::sanitize(&doc);
        prop_assert_eq!(svg::sanitize(&once), once.clone());
        prop_assert!(!once.contains("<script"));
    }
}

/// Property: data URLs decode to the original document
proptest! {
    #[test]
    fn prop_data_url_preserves_document(body in ".{0,64}") {
        let url = svg::to_data_url(&body);
        prop_assert_eq!(svg::decode_data_url(&url).unwrap(), body.into_bytes());
    }
}
