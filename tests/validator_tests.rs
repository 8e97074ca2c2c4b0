use brrtkernel::validator::{validate, RuleSet, ValidationRuleError, Validator};
use brrtkernel::KernelError;
use serde_json::{json, Map, Value};

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn errors_for(value: Value, field: &str, expr: &str) -> Option<String> {
    let input = data(value);
    let mut v = Validator::new(&input);
    v.field(field, expr).unwrap();
    v.errors().get(field).cloned()
}

#[test]
fn test_invalid_email_yields_single_error() {
    let input = data(json!({"email": "not-an-email"}));
    let rules = RuleSet::new().field("email", "required|email");
    match validate(&input, &rules) {
        Err(KernelError::ValidationFailed { errors }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors["email"], "The email field must be a valid email address.");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    let err = validate(&input, &rules).unwrap_err();
    assert_eq!(err.status(), 422);
}

#[test]
fn test_empty_rule_set_always_validates() {
    assert!(validate(&data(json!({"anything": 1})), &RuleSet::new()).is_ok());
    assert!(validate(&Map::new(), &RuleSet::new()).is_ok());
}

#[test]
fn test_required_optional_and_absent_fields() {
    assert_eq!(
        errors_for(json!({}), "name", "required|string").as_deref(),
        Some("The name field is required.")
    );
    assert_eq!(
        errors_for(json!({"name": "  "}), "name", "required").as_deref(),
        Some("The name field is required.")
    );
    // Absent without a marker: skipped entirely.
    assert_eq!(errors_for(json!({}), "age", "integer|min:18"), None);
    // Present but empty with `optional`: skipped.
    assert_eq!(errors_for(json!({"bio": ""}), "bio", "optional|min:10"), None);
    // Present but empty without `optional`: rules still run.
    assert!(errors_for(json!({"bio": ""}), "bio", "min:10").is_some());
    assert_eq!(errors_for(json!({"nick": null}), "nick", "nullable|string"), None);
}

#[test]
fn test_first_failure_wins_per_field() {
    assert_eq!(
        errors_for(json!({"age": "abc"}), "age", "integer|min:18").as_deref(),
        Some("The age field must be an integer.")
    );
}

#[test]
fn test_type_rules() {
    assert_eq!(errors_for(json!({"n": 5}), "n", "integer"), None);
    assert_eq!(errors_for(json!({"n": "5"}), "n", "integer"), None);
    assert!(errors_for(json!({"n": 5.5}), "n", "integer").is_some());
    assert_eq!(errors_for(json!({"n": "5.5"}), "n", "number"), None);
    assert_eq!(errors_for(json!({"n": "1e3"}), "n", "numeric"), None);
    assert!(errors_for(json!({"n": "five"}), "n", "numeric").is_some());
    for ok in [json!(true), json!("yes"), json!("off"), json!(0), json!("1")] {
        assert_eq!(errors_for(json!({"b": ok}), "b", "boolean"), None);
    }
    assert_eq!(
        errors_for(json!({"b": "maybe"}), "b", "boolean").as_deref(),
        Some("The b field must be true or false.")
    );
    assert_eq!(errors_for(json!({"tags": ["a"]}), "tags", "array"), None);
    assert!(errors_for(json!({"tags": "a"}), "tags", "array").is_some());
    assert!(errors_for(json!({"s": 3}), "s", "string").is_some());
}

#[test]
fn test_size_rules_follow_value_kind() {
    // Numbers by value.
    assert_eq!(
        errors_for(json!({"age": 17}), "age", "integer|min:18").as_deref(),
        Some("The age field must be at least 18.")
    );
    // Numeric strings only when a numeric type is declared.
    assert_eq!(errors_for(json!({"age": "20"}), "age", "numeric|min:18"), None);
    assert_eq!(
        errors_for(json!({"code": "20"}), "code", "string|min:3").as_deref(),
        Some("The code field must be at least 3 characters.")
    );
    // Collections by size.
    assert_eq!(
        errors_for(json!({"ids": [1, 2, 3]}), "ids", "array|max:2").as_deref(),
        Some("The ids field must not have more than 2 items.")
    );
    assert_eq!(errors_for(json!({"pin": "1234"}), "pin", "string|length:4"), None);
    assert_eq!(
        errors_for(json!({"pin": "123"}), "pin", "string|length:4").as_deref(),
        Some("The pin field must be 4 characters.")
    );
    assert_eq!(
        errors_for(json!({"qty": 11}), "qty", "integer|between:1,10").as_deref(),
        Some("The qty field must be between 1 and 10.")
    );
    // Character count, not bytes.
    assert_eq!(errors_for(json!({"name": "Zoë"}), "name", "max:3"), None);
}

#[test]
fn test_format_rules() {
    assert_eq!(errors_for(json!({"u": "https://example.com/x"}), "u", "url"), None);
    assert!(errors_for(json!({"u": "not a url"}), "u", "url").is_some());
    assert_eq!(
        errors_for(json!({"id": "123e4567-e89b-12d3-a456-426614174000"}), "id", "uuid"),
        None
    );
    assert!(errors_for(json!({"id": "123e4567"}), "id", "uuid").is_some());
    assert_eq!(errors_for(json!({"d": "2024-02-29"}), "d", "date"), None);
    assert!(errors_for(json!({"d": "2024-02-30"}), "d", "date").is_some());
    assert_eq!(errors_for(json!({"w": "abc"}), "w", "alpha"), None);
    assert!(errors_for(json!({"w": "abc1"}), "w", "alpha").is_some());
    assert_eq!(errors_for(json!({"w": "abc1"}), "w", "alpha_num"), None);
}

#[test]
fn test_membership_and_regex() {
    assert_eq!(errors_for(json!({"size": "m"}), "size", "in:s,m,l"), None);
    assert_eq!(
        errors_for(json!({"size": "xl"}), "size", "in:s,m,l").as_deref(),
        Some("The selected size is invalid.")
    );
    assert_eq!(errors_for(json!({"n": 2}), "n", "in:1,2,3"), None);

    // Full match, not substring.
    assert_eq!(errors_for(json!({"sku": "AB-12"}), "sku", "regex:[A-Z]{2}-\\d+"), None);
    assert_eq!(
        errors_for(json!({"sku": "xAB-12"}), "sku", "regex:[A-Z]{2}-\\d+").as_deref(),
        Some("The sku field format is invalid.")
    );
    assert_eq!(errors_for(json!({"pet": "cat"}), "pet", "required|regex:/^(cat|dog)$/"), None);
}

#[test]
fn test_fields_are_independent_and_ordered() {
    let input = data(json!({"email": "bad", "age": 3, "name": "Ann"}));
    let rules: RuleSet = [
        ("name", "required|string"),
        ("email", "required|email"),
        ("age", "integer|min:18"),
    ]
    .into_iter()
    .collect();
    let mut v = Validator::new(&input);
    v.apply(&rules).unwrap();
    assert!(!v.is_valid());
    let keys: Vec<&String> = v.errors().keys().collect();
    assert_eq!(keys, ["age", "email"]);
}

#[test]
fn test_malformed_rules_are_configuration_errors() {
    let input = data(json!({"x": 1}));
    let mut v = Validator::new(&input);
    assert!(matches!(
        v.field("x", "required|sparkly"),
        Err(ValidationRuleError::UnknownRule(_))
    ));
    assert!(matches!(
        v.field("x", "regex:(unclosed"),
        Err(ValidationRuleError::InvalidPattern { .. })
    ));

    let err = validate(&input, &RuleSet::new().field("x", "min:lots")).unwrap_err();
    assert_eq!(err.status(), 500);
    assert_eq!(err.kind(), "ConfigurationError");
}
