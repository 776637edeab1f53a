/// Declare a consumer-side interface and its proxy wrapper.
///
/// ```ignore
/// define_interface! {
///     /// What this mod needs from the provider
///     pub trait Greeter as GreeterProxy {
///         fn greet(name: String) -> String;
///         fn counter() -> CounterProxy;
///     }
/// }
/// ```
///
/// This expands to:
/// - the trait `Greeter`, each member returning `Result<T, ProxyError>`;
/// - the wrapper `GreeterProxy`, implementing `Greeter` by forwarding every
///   call through its [`Proxy`](crate::proxy::Proxy);
/// - [`BridgeInterface`](crate::proxy::BridgeInterface) for the wrapper,
///   whose shape name is the declaring module path plus the trait name;
/// - [`ApiType`](crate::proxy::ApiType) for the wrapper, so other interfaces
///   can return it and get a nested proxy.
///
/// Wrappers compare equal when they share the same underlying adapter.
#[macro_export]
macro_rules! define_interface {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident as $proxy:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* $(,)? ) -> $ret:ty ;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name: Send + Sync {
            $(
                $(#[$method_meta])*
                fn $method(&self $(, $arg: $arg_ty)*)
                    -> ::std::result::Result<$ret, $crate::proxy::ProxyError>;
            )*
        }

        #[derive(Clone)]
        $vis struct $proxy {
            inner: ::std::sync::Arc<$crate::proxy::Proxy>,
        }

        impl $crate::proxy::BridgeInterface for $proxy {
            fn shape() -> ::std::sync::Arc<$crate::proxy::InterfaceShape> {
                static SHAPE: ::std::sync::OnceLock<::std::sync::Arc<$crate::proxy::InterfaceShape>> =
                    ::std::sync::OnceLock::new();
                SHAPE
                    .get_or_init(|| {
                        ::std::sync::Arc::new($crate::proxy::InterfaceShape::new(
                            concat!(module_path!(), "::", stringify!($name)),
                            vec![$(
                                $crate::proxy::MethodSignature::new(
                                    stringify!($method),
                                    vec![$( <$arg_ty as $crate::proxy::ApiType>::value_type() ),*],
                                    <$ret as $crate::proxy::ApiType>::value_type(),
                                )
                            ),*],
                        ))
                    })
                    .clone()
            }

            fn from_proxy(inner: ::std::sync::Arc<$crate::proxy::Proxy>) -> Self {
                Self { inner }
            }

            fn proxy(&self) -> &::std::sync::Arc<$crate::proxy::Proxy> {
                &self.inner
            }
        }

        impl $name for $proxy {
            $(
                fn $method(&self $(, $arg: $arg_ty)*)
                    -> ::std::result::Result<$ret, $crate::proxy::ProxyError>
                {
                    let result = self.inner.invoke(
                        stringify!($method),
                        vec![$( $crate::proxy::ApiType::into_value($arg) ),*],
                    )?;
                    <$ret as $crate::proxy::ApiType>::from_value(result)
                }
            )*
        }

        impl $crate::proxy::ApiType for $proxy {
            fn value_type() -> $crate::proxy::ValueType {
                $crate::proxy::ValueType::Interface($crate::proxy::ShapeRef::lazy(
                    concat!(module_path!(), "::", stringify!($name)),
                    <$proxy as $crate::proxy::BridgeInterface>::shape,
                ))
            }

            fn into_value(self) -> $crate::proxy::Value {
                $crate::proxy::Value::Proxy(self.inner)
            }

            fn from_value(value: $crate::proxy::Value) -> ::std::result::Result<Self, $crate::proxy::ProxyError> {
                match value {
                    $crate::proxy::Value::Proxy(inner)
                        if $crate::proxy::same_shape(
                            inner.shape(),
                            &<Self as $crate::proxy::BridgeInterface>::shape(),
                        ) =>
                    {
                        Ok(Self { inner })
                    }
                    other => Err($crate::proxy::ProxyError::type_mismatch(
                        &<Self as $crate::proxy::ApiType>::value_type(),
                        &other,
                    )),
                }
            }
        }

        impl ::std::cmp::PartialEq for $proxy {
            fn eq(&self, other: &Self) -> bool {
                ::std::sync::Arc::ptr_eq(&self.inner, &other.inner)
            }
        }

        impl ::std::fmt::Debug for $proxy {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({:?})", stringify!($proxy), self.inner)
            }
        }
    };
}
