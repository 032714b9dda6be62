use proptest::prelude::*;
use serde_json::{Map, Value};

/// Distinct object ids in a random order
pub fn object_ids_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("ZTF[0-9]{2}[a-z]{4}", 0..max)
        .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Indexes of bulk requests that fail
pub fn failing_calls_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..12, 0..6)
}

/// Optional coordinate value: absent, null or a number
fn coordinate_value_strategy() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        (-90.0f64..90.0).prop_map(|v| Some(Value::from(v))),
    ]
}

/// An alert body containing a random subset of the coordinate fields
pub fn coordinate_fields_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::vec(coordinate_value_strategy(), 6).prop_map(|values| {
        let names = ["ramean", "decmean", "ra", "dec", "RA", "Dec"];
        let mut fields = Map::new();
        fields.insert("objectId".to_string(), Value::from("ZTF00prop"));
        for (name, value) in names.iter().zip(values) {
            if let Some(value) = value {
                fields.insert(name.to_string(), value);
            }
        }
        fields
    })
}
