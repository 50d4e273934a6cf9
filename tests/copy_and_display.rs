use factum::{Fact, Key, Value};

#[test]
fn copy_keeps_positional_and_plain_named_slots() {
    let mut fact = Fact::builder_of("Point")
        .arg(1)
        .arg(2)
        .field("x", 3)
        .field("__meta__", "hidden")
        .build()
        .expect("fact");
    fact.set_bind("p").expect("bind");
    fact.set_identity(42).expect("identity");

    let copy = fact.copy();
    assert_eq!(copy.kind(), "Point");
    assert_eq!(copy.positional().cloned().collect::<Vec<_>>(), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(copy.named().map(|(n, v)| (n.to_string(), v.clone())).collect::<Vec<_>>(), vec![("x".to_string(), Value::Int(3))]);
    assert_eq!(copy.field("__meta__"), None);
    assert_eq!(copy.identity(), None);
    assert_eq!(copy.bind(), None);
    assert!(!copy.is_declared());
}

#[test]
fn copy_can_be_modified_and_declared() {
    let mut fact = Fact::builder().field("color", "red").build().expect("fact");
    fact.set_identity(1).expect("identity");
    let mut copy = fact.copy();
    copy.set("color", "blue").expect("copy is undeclared");
    copy.set_identity(2).expect("identity");
    assert_eq!(fact.field("color"), Some(&Value::from("red")));
    assert_ne!(fact, copy);
}

#[test]
fn copy_renumbers_positional_slots() {
    let fact = Fact::from_pairs([(Key::Index(4), Value::from("a"))]).expect("fact");
    let copy = fact.copy();
    assert_eq!(copy.at(0), Some(&Value::from("a")));
    assert_eq!(copy.at(4), None);
}

#[test]
fn copy_keeps_composed_constraints() {
    let fact = Fact::builder().field("address__city", "Paris").build().expect("fact");
    let copy = fact.copy();
    assert_eq!(copy, fact);
    assert!(copy.has_field_constraints());
}

#[test]
fn undeclared_fact_renders_its_contents() {
    let fact = Fact::builder()
        .arg(1)
        .arg("two")
        .field("tags", vec![1, 2])
        .field("__meta__", 0)
        .build()
        .expect("fact");
    assert_eq!(format!("{:?}", fact), "Fact(1, \"two\", tags=(1, 2))");
    assert_eq!(fact.to_string(), "<Undeclared Fact> Fact(1, \"two\", tags=(1, 2))");
}

#[test]
fn declared_fact_renders_short_form() {
    let mut fact = Fact::builder().field("color", "red").build().expect("fact");
    fact.set_identity(7).expect("identity");
    assert_eq!(fact.to_string(), "<f-7>");
}

#[test]
fn constraint_rendering() {
    let fact = Fact::builder()
        .field("a__b", 1)
        .field("a__c__d", "x")
        .build()
        .expect("fact");
    assert_eq!(format!("{:?}", fact), "Fact(a=(b == 1 & c.d == \"x\"))");
}
