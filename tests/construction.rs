use factum::{Constraint, Fact, FactError, Key, Value};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn positional_and_named_slots() {
    init_logging();
    let fact = Fact::new(vec![Value::from(1), Value::from(2)], vec![("x", Value::from(3))])
        .expect("fact");
    let slots: Vec<(Key, Value)> = fact.slots().map(|(k, v)| (k.clone(), v.clone())).collect();
    assert_eq!(
        slots,
        vec![
            (Key::Index(0), Value::Int(1)),
            (Key::Index(1), Value::Int(2)),
            (Key::from("x"), Value::Int(3)),
        ]
    );
    assert_eq!(fact.at(1), Some(&Value::Int(2)));
    assert_eq!(fact.field("x"), Some(&Value::Int(3)));
    assert_eq!(fact.kind(), "Fact");
    assert!(!fact.has_field_constraints());
}

#[test]
fn repeated_plain_key_keeps_last_value() {
    let fact = Fact::builder().field("x", 1).field("x", 2).build().expect("fact");
    assert_eq!(fact.len(), 1);
    assert_eq!(fact.field("x"), Some(&Value::Int(2)));
}

#[test]
fn compound_key_becomes_constraint_on_base() {
    init_logging();
    let fact = Fact::builder()
        .field("address__city", "Paris")
        .build()
        .expect("fact");
    assert_eq!(fact.len(), 1);
    assert!(fact.field("address__city").is_none());
    assert_eq!(
        fact.field("address"),
        Some(&Value::Constraint(Constraint::nested(["city"], "Paris")))
    );
    assert!(fact.has_field_constraints());
}

#[test]
fn compound_keys_sharing_a_base_compose() {
    let a = Fact::builder()
        .field("address__city", "Paris")
        .field("address__zip__code", 75001)
        .build()
        .expect("fact");
    let b = Fact::builder()
        .field("address__zip__code", 75001)
        .field("address__city", "Paris")
        .build()
        .expect("fact");
    let expected = Constraint::nested(["city"], "Paris") & Constraint::nested(["zip", "code"], 75001);
    assert_eq!(a.field("address").and_then(Value::as_constraint), Some(&expected));
    assert_eq!(a.field("address").and_then(Value::as_constraint).map(|c| c.members().len()), Some(2));
    assert_eq!(a, b);
    assert_eq!(a.try_hash().unwrap(), b.try_hash().unwrap());
}

#[test]
fn identical_compound_paths_are_and_ed() {
    let fact = Fact::new(
        Vec::<Value>::new(),
        vec![("f__a", Value::from(1)), ("f__a", Value::from(2))],
    )
    .expect("fact");
    let constraint = fact.field("f").and_then(Value::as_constraint).expect("constraint");
    assert_eq!(
        constraint.members(),
        &[Constraint::nested(["a"], 1), Constraint::nested(["a"], 2)]
    );
}

#[test]
fn plain_and_compound_on_same_base_conflict() {
    let err = Fact::builder().field("f", 1).field("f__a", 2).build().unwrap_err();
    assert_eq!(err, FactError::ConflictingField { field: "f".to_string() });
    let err = Fact::builder().field("f__a", 2).field("f", 1).build().unwrap_err();
    assert_eq!(err, FactError::ConflictingField { field: "f".to_string() });
}

#[test]
fn malformed_compound_keys() {
    for key in ["__f", "f__", "f____a"] {
        let err = Fact::builder().field(key, 1).build().unwrap_err();
        assert!(
            matches!(err, FactError::MalformedCompoundKey { key: ref k, .. } if k == key),
            "{key} should be malformed, got {err}"
        );
    }
}

#[test]
fn explicit_constraint_value_counts_as_field_constraint() {
    let fact = Fact::builder().field("f", Constraint::Wildcard).build().expect("fact");
    assert!(fact.has_field_constraints());
}

#[test]
fn reserved_names_are_rejected() {
    let err = Fact::builder().field("__factid__", 3).build().unwrap_err();
    assert_eq!(err, FactError::ReservedSlot { key: "__factid__".to_string() });
    let err = Fact::from_pairs([("__bind__", "x")]).unwrap_err();
    assert_eq!(err, FactError::ReservedSlot { key: "__bind__".to_string() });
}

#[test]
fn special_names_are_plain_slots() {
    let fact = Fact::builder().field("__meta__", 1).build().expect("fact");
    assert_eq!(fact.field("__meta__"), Some(&Value::Int(1)));
    assert!(Fact::is_special(&Key::from("__meta__")));
    assert!(!Fact::is_special(&Key::from("meta")));
    assert!(!Fact::is_special(&Key::Index(0)));
    assert_eq!(fact.named().count(), 0);
}

#[test]
fn from_pairs_stores_keys_verbatim() {
    let fact = Fact::from_pairs(vec![
        (Key::Index(0), Value::from("a")),
        (Key::from("f__a"), Value::from(1)),
    ])
    .expect("fact");
    assert_eq!(fact.at(0), Some(&Value::from("a")));
    assert_eq!(fact.field("f__a"), Some(&Value::Int(1)));
    assert!(!fact.has_field_constraints());
}

#[test]
fn from_json_objects_and_arrays() {
    let fact = Fact::from_json(
        "Person",
        serde_json::json!({"name": "Alice", "tags": ["a", "b"], "address__city": "Paris"}),
    )
    .expect("fact");
    assert_eq!(fact.kind(), "Person");
    assert_eq!(fact.field("name"), Some(&Value::from("Alice")));
    assert_eq!(
        fact.field("tags"),
        Some(&Value::Tuple(vec![Value::from("a"), Value::from("b")].into()))
    );
    assert!(fact.has_field_constraints());

    let fact = Fact::from_json("Point", serde_json::json!([1, 2.5])).expect("fact");
    assert_eq!(fact.at(0), Some(&Value::Int(1)));
    assert_eq!(fact.at(1), Some(&Value::Float(2.5)));
}

#[test]
fn from_json_scalar_is_single_positional_slot() {
    let fact = Fact::from_json("Count", serde_json::json!(5)).expect("fact");
    let slots: Vec<(Key, Value)> = fact.slots().map(|(k, v)| (k.clone(), v.clone())).collect();
    assert_eq!(slots, vec![(Key::Index(0), Value::Int(5))]);
    assert_eq!(fact.kind(), "Count");
}

#[test]
fn triple_underscore_splits_on_first_separator() {
    let fact = Fact::builder().field("a___b", 1).build().expect("fact");
    assert_eq!(
        fact.field("a"),
        Some(&Value::Constraint(Constraint::nested(["_b"], 1)))
    );
}

#[test]
fn initial_fact_has_its_own_kind() {
    let initial = Fact::initial();
    assert_eq!(initial.kind(), "InitialFact");
    assert!(initial.is_empty());
    assert_ne!(initial, Fact::empty());
}
