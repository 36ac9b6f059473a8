use proptest::collection::vec;
use proptest::prelude::*;
use proptest::proptest;
use std::cmp::Ordering;

use flintdb_types::{DataType, Value, ValueError};

fn values() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>().prop_map(Value::Float),
        any::<bool>().prop_map(Value::Boolean),
        ".*".prop_map(Value::Text),
        vec(any::<u8>(), 0..64).prop_map(Value::Blob),
        any::<i64>().prop_map(Value::date),
        any::<i64>().prop_map(Value::datetime),
    ]
}

proptest! {
    // Property 1: decode(encode(v)) == v for every well-formed value,
    // including NaN float payloads (bit equality).
    #[test]
    fn value_roundtrip(val in values()) {
        let bytes = val.serialize().unwrap();
        prop_assert_eq!(Value::deserialize(&bytes).unwrap(), val);
    }

    // Property 2: comparison is total within a tag and fails across tags.
    #[test]
    fn compare_total_on_type(a in values(), b in values()) {
        match a.compare(&b) {
            Ok(ord) => {
                prop_assert_eq!(a.data_type(), b.data_type());
                prop_assert!(matches!(ord, Ordering::Less | Ordering::Equal | Ordering::Greater));
            }
            Err(err) => {
                prop_assert_ne!(a.data_type(), b.data_type());
                let is_type_mismatch = matches!(err, ValueError::TypeMismatch { .. });
                prop_assert!(is_type_mismatch);
            }
        }
    }

    // A truncated buffer never decodes successfully to the original value's
    // type, and never panics.
    #[test]
    fn truncated_buffers_fail(val in values()) {
        let bytes = val.serialize().unwrap();
        if bytes.len() > 1 {
            let short = &bytes[..bytes.len() - 1];
            prop_assert!(Value::deserialize(short).is_err());
        }
    }
}

#[test]
fn tags_are_stable() {
    for (value, tag) in [
        (Value::Null, 0u8),
        (Value::Integer(0), 1),
        (Value::Float(0.0), 2),
        (Value::Boolean(false), 3),
        (Value::Text(String::new()), 4),
        (Value::Blob(Vec::new()), 5),
        (Value::date(0), 6),
        (Value::datetime(0), 7),
    ] {
        assert_eq!(value.serialize().unwrap()[0], tag);
        assert_eq!(value.data_type(), DataType::from_tag(tag).unwrap());
    }
}
