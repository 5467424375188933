use serde::Serialize;

/// Render any serializable value in the canonical form used for every hash
/// and signature pre-image in the protocol: keys sorted lexicographically,
/// compact separators, UTF-8, numbers in serde_json's shortest round-trip
/// form.
///
/// Routing through `serde_json::Value` is what pins the key order:
/// `Value`'s object map is BTreeMap-backed, so serializing it always walks
/// keys in sorted order regardless of struct field order.
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).expect("canonical encoding of an in-memory value is infallible");
    serde_json::to_string(&v).expect("canonical encoding of an in-memory value is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let v = json!({"zebra": 1, "alpha": {"nested_b": true, "nested_a": false}});
        assert_eq!(
            canonical_json(&v),
            r#"{"alpha":{"nested_a":false,"nested_b":true},"zebra":1}"#
        );
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct Reversed {
            b: u32,
            a: u32,
        }
        assert_eq!(canonical_json(&Reversed { b: 2, a: 1 }), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn float_rendering_is_pinned() {
        // The shortest-round-trip (Ryu) rendering is the one specific number
        // form the protocol fixes. These exact strings are consensus-relevant.
        assert_eq!(canonical_json(&json!({"x": 1.0_f64})), r#"{"x":1.0}"#);
        assert_eq!(canonical_json(&json!({"x": 0.001_f64})), r#"{"x":0.001}"#);
        assert_eq!(
            canonical_json(&json!({"x": 1_690_000_000.123456_f64})),
            r#"{"x":1690000000.123456}"#
        );
    }

    #[test]
    fn same_content_same_encoding() {
        let a = json!({"amount": 20.0, "sender": "ab12"});
        let b = json!({"sender": "ab12", "amount": 20.0});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }
}
