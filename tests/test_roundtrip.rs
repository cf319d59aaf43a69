//! Values written by the serializer read back unchanged.

use pdfio::parser::ObjectParser;
use pdfio::source::SliceStream;
use pdfio::writer::ObjectSerializer;
use pdfio::{Dictionary, ObjectRef, Value};
use proptest::prelude::*;

fn reparse(value: &Value) -> Value {
    let bytes = ObjectSerializer::new().serialize(value);
    ObjectParser::new(SliceStream::new(&bytes))
        .read_value()
        .unwrap_or_else(|e| panic!("{:?} failed to reparse: {}", String::from_utf8_lossy(&bytes), e))
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Real),
        prop::collection::vec(1..=255u8, 1..16).prop_map(Value::Name),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|mut bytes| {
            bytes.insert(0, 0);
            Value::Binary(bytes)
        }),
        (1..100_000u32, 0..10u16).prop_map(|(id, gen)| Value::Reference(ObjectRef::new(id, gen))),
    ]
}

proptest! {
    #[test]
    fn scalars_round_trip(value in scalar()) {
        prop_assert_eq!(reparse(&value), value);
    }

    #[test]
    fn arrays_round_trip(items in prop::collection::vec(scalar(), 0..12)) {
        let value = Value::Array(items);
        prop_assert_eq!(reparse(&value), value);
    }

    #[test]
    fn dictionaries_keep_key_order(entries in prop::collection::vec(("[A-Za-z][A-Za-z0-9]{0,7}", scalar()), 0..10)) {
        let mut dict = Dictionary::new();
        for (key, value) in entries {
            dict.insert(key, value);
        }
        let value = Value::Dictionary(dict.clone());
        let parsed = reparse(&value);
        let parsed = parsed.as_dict().expect("dictionary");
        prop_assert_eq!(parsed.keys().collect::<Vec<_>>(), dict.keys().collect::<Vec<_>>());
        prop_assert_eq!(parsed, &dict);
    }
}

#[test]
fn test_nested_structure_round_trip() {
    let inner = Dictionary::new()
        .with("Type", Value::name("Font"))
        .with("Widths", Value::numbers(&[250.0, 333.5, 0.25]))
        .with("Name", Value::string("Times (Roman)\\"));
    let outer = Dictionary::new()
        .with("Kids", vec![Value::Reference(ObjectRef::new(3, 0)), Value::Null])
        .with("Font", inner)
        .with("Empty", Dictionary::new())
        .with("ID", vec![Value::Binary(vec![0, 0xFF, 0x10]), Value::Binary(vec![0, 0xFF, 0x10])]);

    let value = Value::Dictionary(outer);
    assert_eq!(reparse(&value), value);
}

#[test]
fn test_non_utf8_name_round_trip() {
    let name = Value::name(vec![b'A', 0xE9]);
    assert_eq!(ObjectSerializer::new().serialize(&name), b"/A#E9");
    assert_eq!(reparse(&name), name);
    assert_eq!(name.as_name(), None);
    assert_eq!(name.as_name_bytes(), Some(&[b'A', 0xE9][..]));
}
