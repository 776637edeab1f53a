use super::*;
use modhost_core::Value;

#[test]
fn test_api_greets_and_counts() {
    let greeter = GreeterApi::default();
    let api = greeter.api().unwrap().unwrap();

    let names: Vec<&str> = api.methods().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["greet", "greeted_count"]);

    let greeting = api.invoke(0, vec![Value::Str(" Abigail ".to_string())]).unwrap();
    assert_eq!(greeting, Value::Str("Hello, Abigail!".to_string()));
    assert_eq!(api.invoke(1, Vec::new()).unwrap(), Value::Int(1));
}

#[test]
fn test_translated_template_is_used() {
    let greeter = GreeterApi::default();
    *greeter.template.write() = "Bonjour, {{name}}.".to_string();
    let api = greeter.api().unwrap().unwrap();
    assert_eq!(
        api.invoke(0, vec![Value::Str("Pierre".to_string())]).unwrap(),
        Value::Str("Bonjour, Pierre.".to_string())
    );
}
