#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::proxy::error::ProxyError;
use crate::proxy::factory::{BridgeInterface, ProxyFactory};
use crate::proxy::object::{ApiObject, ApiTable};
use crate::proxy::value::ValueType;

crate::define_interface! {
    /// Consumer view of a counter
    pub trait Counter as CounterProxy {
        fn get() -> i64;
        fn add(amount: i64) -> i64;
    }
}

crate::define_interface! {
    pub trait CounterSource as CounterSourceProxy {
        fn counter() -> CounterProxy;
        fn label(prefix: String) -> String;
    }
}

crate::define_interface! {
    pub trait Missing as MissingProxy {
        fn nothing_here() -> ();
    }
}

fn counter_api(start: i64) -> ApiObject {
    let state = Arc::new(AtomicI64::new(start));
    let get_state = state.clone();
    ApiTable::new("provider::CounterImpl")
        .method("get", move || get_state.load(Ordering::SeqCst))
        .method("add", move |amount: i64| state.fetch_add(amount, Ordering::SeqCst) + amount)
        .build()
}

#[test]
fn test_typed_proxy_round_trip() {
    let factory = ProxyFactory::new();
    let api = counter_api(5);
    let counter: CounterProxy = factory.create_as(&api).unwrap();
    assert_eq!(counter.get().unwrap(), 5);
    assert_eq!(counter.add(3).unwrap(), 8);
    assert_eq!(counter.get().unwrap(), 8);
}

#[test]
fn test_typed_proxies_share_identity() {
    let factory = ProxyFactory::new();
    let api = counter_api(0);
    let first: CounterProxy = factory.create_as(&api).unwrap();
    let second: CounterProxy = factory.create_as(&api).unwrap();
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(first.proxy(), second.proxy()));
}

#[test]
fn test_shape_uses_module_path_and_declared_types() {
    let shape = CounterProxy::shape();
    assert!(shape.name().ends_with("::Counter"));
    assert!(shape.name().contains("interface_tests"));
    assert_eq!(shape.methods().len(), 2);
    assert_eq!(shape.methods()[1].params, vec![ValueType::Int]);
    // Same Arc every time
    assert!(Arc::ptr_eq(&shape, &CounterProxy::shape()));
}

#[test]
fn test_nested_typed_interface() {
    let factory = ProxyFactory::new();
    let inner = counter_api(40);
    let source = ApiTable::new("provider::Source")
        .method("counter", move || inner.clone())
        .method("label", |prefix: String| format!("{prefix}-source"))
        .build();

    let proxy: CounterSourceProxy = factory.create_as(&source).unwrap();
    let counter = proxy.counter().unwrap();
    assert_eq!(counter.add(2).unwrap(), 42);
    assert_eq!(proxy.label("x".to_string()).unwrap(), "x-source");

    // Asking again returns the cached nested adapter
    assert_eq!(proxy.counter().unwrap(), counter);
}

#[test]
fn test_typed_mismatch_names_member() {
    let factory = ProxyFactory::new();
    let err = factory.create_as::<MissingProxy>(&counter_api(0)).unwrap_err();
    match err {
        ProxyError::UnmatchedMember { member, .. } => assert_eq!(member.name, "nothing_here"),
        other => panic!("unexpected error: {other:?}"),
    }
}
