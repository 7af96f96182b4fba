use doculite::expression::BsonExpression;

#[test]
fn field_path_expression_parses_and_keeps_its_source() {
    let expr = BsonExpression::create("$.name").expect("valid field path");
    assert_eq!(expr.source(), "$.name");
}

#[test]
fn nested_field_path_expression_parses() {
    let expr = BsonExpression::create("$.address.city").expect("valid nested field path");
    assert_eq!(expr.source(), "$.address.city");
}

#[test]
fn empty_expression_is_rejected() {
    assert!(BsonExpression::create("").is_err());
}

#[test]
fn stray_operator_is_rejected() {
    assert!(BsonExpression::create("+").is_err());
}
