use std::fmt;
use std::sync::Arc;

use crate::proxy::error::ProxyError;
use crate::proxy::factory::Proxy;
use crate::proxy::object::ApiObject;
use crate::proxy::shape::{InterfaceShape, same_shape};

/// A dynamically typed value crossing a mod API boundary.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// An API object with no interface attached
    Object(ApiObject),
    /// An object already bridged to a consumer interface
    Proxy(Arc<Proxy>),
}

impl Value {
    /// Short label of the value's runtime type, used in mismatch errors.
    pub fn type_label(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "i64".to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Object(object) => format!("object {}", object.type_name()),
            Value::Proxy(proxy) => format!("interface {}", proxy.shape().name()),
        }
    }

    /// Whether this value can be handed over as `ty` without conversion.
    pub fn is_instance_of(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (_, ValueType::Any) => true,
            (Value::Unit, ValueType::Unit)
            | (Value::Bool(_), ValueType::Bool)
            | (Value::Int(_), ValueType::Int)
            | (Value::Float(_), ValueType::Float)
            | (Value::Str(_), ValueType::Str)
            | (Value::Object(_), ValueType::Object)
            | (Value::Proxy(_), ValueType::Object) => true,
            (Value::List(items), ValueType::List(inner)) => items.iter().all(|item| item.is_instance_of(inner)),
            (Value::Proxy(proxy), ValueType::Interface(shape)) => same_shape(proxy.shape(), &shape.resolve()),
            _ => false,
        }
    }

    /// Convert this value to `ty` using the widening rules of [`is_assignable`].
    ///
    /// Interface targets are not handled here; wrapping an object in a
    /// nested proxy needs a factory and is done by [`Proxy`].
    pub fn coerce(self, ty: &ValueType) -> Result<Value, ProxyError> {
        match (self, ty) {
            (value, ValueType::Any) => Ok(value),
            (Value::Int(i), ValueType::Float) => Ok(Value::Float(i as f64)),
            (Value::Proxy(proxy), ValueType::Object) => Ok(Value::Object(proxy)),
            (Value::List(items), ValueType::List(inner)) => items
                .into_iter()
                .map(|item| item.coerce(inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (value, ty) if value.is_instance_of(ty) => Ok(value),
            (value, ty) => Err(ProxyError::type_mismatch(ty, &value)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
            Value::Proxy(proxy) => write!(f, "Proxy({})", proxy.shape().name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Proxy(a), Value::Proxy(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Reference to an interface shape used inside a [`ValueType`].
///
/// Shapes generated by `define_interface!` are resolved lazily, so an
/// interface may mention itself (or a sibling that mentions it back) in a
/// return type without recursing while its own shape is being built.
#[derive(Clone)]
pub struct ShapeRef {
    name: Arc<str>,
    source: ShapeSource,
}

#[derive(Clone)]
enum ShapeSource {
    Lazy(fn() -> Arc<InterfaceShape>),
    Shared(Arc<InterfaceShape>),
}

impl ShapeRef {
    pub fn lazy(name: &str, resolve: fn() -> Arc<InterfaceShape>) -> Self {
        Self {
            name: Arc::from(name),
            source: ShapeSource::Lazy(resolve),
        }
    }

    pub fn shared(shape: Arc<InterfaceShape>) -> Self {
        Self {
            name: Arc::from(shape.name()),
            source: ShapeSource::Shared(shape),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&self) -> Arc<InterfaceShape> {
        match &self.source {
            ShapeSource::Lazy(resolve) => resolve(),
            ShapeSource::Shared(shape) => shape.clone(),
        }
    }
}

impl fmt::Debug for ShapeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeRef({})", self.name)
    }
}

impl PartialEq for ShapeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Any,
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List(Box<ValueType>),
    Object,
    Interface(ShapeRef),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Unit => write!(f, "()"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "i64"),
            ValueType::Float => write!(f, "f64"),
            ValueType::Str => write!(f, "string"),
            ValueType::List(inner) => write!(f, "list<{inner}>"),
            ValueType::Object => write!(f, "object"),
            ValueType::Interface(shape) => write!(f, "{}", shape.name()),
        }
    }
}

/// Rust types that can cross an API boundary as a [`Value`].
pub trait ApiType: Sized + Send + 'static {
    fn value_type() -> ValueType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, ProxyError>;
}

macro_rules! impl_api_type {
    ($ty:ty, $variant:ident, $value_type:expr) => {
        impl ApiType for $ty {
            fn value_type() -> ValueType {
                $value_type
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self, ProxyError> {
                match value.coerce(&Self::value_type())? {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(ProxyError::type_mismatch(&Self::value_type(), &other)),
                }
            }
        }
    };
}

impl_api_type!(bool, Bool, ValueType::Bool);
impl_api_type!(i64, Int, ValueType::Int);
impl_api_type!(f64, Float, ValueType::Float);
impl_api_type!(String, Str, ValueType::Str);
impl_api_type!(ApiObject, Object, ValueType::Object);

impl ApiType for () {
    fn value_type() -> ValueType {
        ValueType::Unit
    }

    fn into_value(self) -> Value {
        Value::Unit
    }

    fn from_value(value: Value) -> Result<Self, ProxyError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(ProxyError::type_mismatch(&ValueType::Unit, &other)),
        }
    }
}

impl ApiType for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: Value) -> Result<Self, ProxyError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| ProxyError::TypeMismatch {
            expected: "i32".to_string(),
            found: format!("i64 {wide}"),
        })
    }
}

impl ApiType for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Result<Self, ProxyError> {
        Ok(value)
    }
}

impl<T: ApiType> ApiType for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(ApiType::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ProxyError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(ProxyError::type_mismatch(&Self::value_type(), &other)),
        }
    }
}
