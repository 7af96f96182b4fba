use doculite::bson::{Array, Document, Value};

fn sample_document() -> Document {
    let mut nested = Document::new();
    nested.insert("title".to_string(), Value::String("hello".to_string()));
    nested.insert("count".to_string(), Value::Int32(3));

    let mut tags = Array::new();
    tags.push(Value::String("a".to_string()));
    tags.push(Value::String("b".to_string()));

    let mut doc = Document::new();
    doc.insert("_id".to_string(), Value::Int64(42));
    doc.insert("score".to_string(), Value::Double(1.5));
    doc.insert("active".to_string(), Value::Boolean(true));
    doc.insert("tags".to_string(), Value::Array(tags));
    doc.insert("nested".to_string(), Value::Document(nested));
    doc.insert("missing".to_string(), Value::Null);
    doc
}

#[test]
fn document_round_trips_through_the_wire_format() {
    let doc = sample_document();

    let bytes = doculite::bson::to_vec(&doc);
    let parsed = Document::from_reader(&bytes).expect("well-formed document bytes");

    assert_eq!(parsed.len(), doc.len());
    assert_eq!(parsed.get("_id"), Some(&Value::Int64(42)));
    assert_eq!(parsed.get("score"), Some(&Value::Double(1.5)));
    assert_eq!(parsed.get("active"), Some(&Value::Boolean(true)));
    assert_eq!(parsed.get("missing"), Some(&Value::Null));

    let tags = parsed.get("tags").and_then(Value::as_array).unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags.as_slice()[0], Value::String("a".to_string()));

    let nested = parsed.get("nested").and_then(Value::as_document).unwrap();
    assert_eq!(nested.get("count"), Some(&Value::Int32(3)));
}

#[test]
fn from_reader_rejects_truncated_input() {
    let doc = sample_document();
    let bytes = doculite::bson::to_vec(&doc);

    let truncated = &bytes[..bytes.len() - 4];
    assert!(Document::from_reader(truncated).is_err());
}

#[test]
fn value_accessors_reject_mismatched_types() {
    let value = Value::Int32(7);
    assert_eq!(value.as_i32(), Some(7));
    assert_eq!(value.as_str(), None);
    assert_eq!(value.as_document(), None);
}
