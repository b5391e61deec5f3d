//! Property tests: a fact written with `set` is read back exactly by `query`

use eload_checkpoint::{Checkpoint, CheckpointDocument, EloadId, InMemoryBackend, Mapping, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn segment() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z_]{1,10}", "/[a-z]{1,6}/[a-z]{1,6}\\.vcf\\.gz", "[A-Z]{3,8}"]
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[ -~]{0,20}".prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|entries| {
                let mut mapping = Mapping::new();
                for (k, v) in entries {
                    mapping.insert(Value::from(k), v);
                }
                Value::Mapping(mapping)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn set_then_get_returns_value(path in prop::collection::vec(segment(), 1..5), value in value()) {
        let mut doc = CheckpointDocument::new();
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();

        doc.set(&segments, value.clone()).unwrap();

        prop_assert_eq!(doc.get(&segments), Some(&value));
    }

    #[test]
    fn value_survives_yaml_text(path in prop::collection::vec(segment(), 1..4), value in value()) {
        let mut doc = CheckpointDocument::new();
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        doc.set(&segments, value.clone()).unwrap();

        let reparsed = CheckpointDocument::from_yaml_str(&doc.to_yaml_string().unwrap()).unwrap();

        prop_assert_eq!(reparsed.get(&segments), Some(&value));
    }
}

#[tokio::test]
async fn persisted_fact_is_visible_to_a_new_handle() {
    let backend = Arc::new(InMemoryBackend::new());
    let eload = EloadId::new(9);

    let mut writer = Checkpoint::open(backend.clone(), eload).await.unwrap();
    writer
        .set(&["submission", "vcf_files"], Value::Sequence(vec![Value::from("/a.vcf.gz")]))
        .await
        .unwrap();

    let reader = Checkpoint::open(backend, eload).await.unwrap();
    assert_eq!(
        reader.query(&["submission", "vcf_files"]),
        Some(&Value::Sequence(vec![Value::from("/a.vcf.gz")]))
    );
}
