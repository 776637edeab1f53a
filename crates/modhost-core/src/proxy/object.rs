use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::proxy::error::ProxyError;
use crate::proxy::shape::MethodSignature;
use crate::proxy::value::{ApiType, Value};

/// An object a mod exposes to other mods.
///
/// Members are described by [`MethodSignature`]s and invoked by index with
/// dynamically typed arguments, so consumers never need the provider's
/// compiled types.
pub trait DynamicApi: Send + Sync {
    /// Name of the concrete type behind the object, for diagnostics
    fn type_name(&self) -> &str;

    fn methods(&self) -> &[MethodSignature];

    /// Invoke member `index` of [`methods`](DynamicApi::methods).
    fn invoke(&self, index: usize, args: Vec<Value>) -> Result<Value, ProxyError>;
}

/// Shared handle to a mod-provided API object
pub type ApiObject = Arc<dyn DynamicApi>;

type Handler = Box<dyn Fn(Vec<Value>) -> Result<Value, ProxyError> + Send + Sync>;

/// A [`DynamicApi`] assembled from plain Rust closures.
///
/// ```ignore
/// let api = ApiTable::new("Calculator")
///     .method("add", |a: i64, b: i64| a + b)
///     .method("name", || "calc".to_string())
///     .build();
/// ```
pub struct ApiTable {
    type_name: String,
    signatures: Vec<MethodSignature>,
    handlers: Vec<Handler>,
}

impl ApiTable {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            signatures: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Add a member. Several members may share a name if their arity or
    /// parameter types differ.
    pub fn method<Args, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: IntoMethod<Args>,
    {
        let name = name.into();
        self.signatures.push(MethodSignature::new(name, F::params(), F::returns()));
        self.handlers.push(Box::new(move |args| handler.call_with(args)));
        self
    }

    pub fn build(self) -> Arc<dyn DynamicApi> {
        Arc::new(self)
    }
}

impl fmt::Debug for ApiTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTable")
            .field("type_name", &self.type_name)
            .field("signatures", &self.signatures)
            .finish()
    }
}

impl DynamicApi for ApiTable {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn methods(&self) -> &[MethodSignature] {
        &self.signatures
    }

    fn invoke(&self, index: usize, args: Vec<Value>) -> Result<Value, ProxyError> {
        let (signature, handler) = match (self.signatures.get(index), self.handlers.get(index)) {
            (Some(signature), Some(handler)) => (signature, handler),
            _ => {
                return Err(ProxyError::UnknownMember {
                    interface: self.type_name.clone(),
                    member: format!("#{index}"),
                });
            }
        };
        if args.len() != signature.params.len() {
            return Err(ProxyError::ArgumentCount {
                member: signature.name.clone(),
                expected: signature.params.len(),
                actual: args.len(),
            });
        }
        match panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(result) => result,
            Err(payload) => Err(ProxyError::Invocation {
                target: self.type_name.clone(),
                member: signature.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Closures usable as [`ApiTable`] members.
///
/// Implemented for `Fn` closures of up to four [`ApiType`] arguments
/// returning an [`ApiType`].
pub trait IntoMethod<Args>: Send + Sync + 'static {
    fn params() -> Vec<crate::proxy::value::ValueType>;
    fn returns() -> crate::proxy::value::ValueType;
    fn call_with(&self, args: Vec<Value>) -> Result<Value, ProxyError>;
}

macro_rules! impl_into_method {
    ($($ty:ident $var:ident),*) => {
        impl<Func, Ret, $($ty,)*> IntoMethod<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
            Ret: ApiType,
            $($ty: ApiType,)*
        {
            fn params() -> Vec<crate::proxy::value::ValueType> {
                vec![$($ty::value_type()),*]
            }

            fn returns() -> crate::proxy::value::ValueType {
                Ret::value_type()
            }

            #[allow(unused_mut, unused_variables)]
            fn call_with(&self, args: Vec<Value>) -> Result<Value, ProxyError> {
                let expected = Self::params().len();
                let actual = args.len();
                let mut args = args.into_iter();
                $(
                    let $var = match args.next() {
                        Some(value) => $ty::from_value(value)?,
                        None => {
                            return Err(ProxyError::ArgumentCount {
                                member: "<closure>".to_string(),
                                expected,
                                actual,
                            });
                        }
                    };
                )*
                Ok((self)($($var),*).into_value())
            }
        }
    };
}

impl_into_method!();
impl_into_method!(A a);
impl_into_method!(A a, B b);
impl_into_method!(A a, B b, C c);
impl_into_method!(A a, B b, C c, D d);
