use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use log::trace;
use parking_lot::Mutex;

use crate::proxy::error::ProxyError;
use crate::proxy::object::{ApiObject, DynamicApi};
use crate::proxy::shape::{self, InterfaceShape, MethodSignature};
use crate::proxy::value::{Value, ValueType};

/// Cache bucket: interface name plus the address of the target object.
/// Shapes sharing a name are told apart inside the bucket by [`shape::same_shape`].
type ProxyKey = (String, usize);

#[derive(Default)]
struct FactoryInner {
    cache: Mutex<HashMap<ProxyKey, Vec<Arc<Proxy>>>>,
}

/// Generates structural adapters between mod API objects and
/// consumer-declared interfaces.
///
/// Exactly one [`Proxy`] exists per (interface, object) pair: the cache is
/// locked for the whole lookup-or-create step, so racing requests for the
/// same pair all receive the same adapter. Entries are never evicted and
/// keep their target alive, which also keeps the address-based identity
/// stable.
#[derive(Clone, Default)]
pub struct ProxyFactory {
    inner: Arc<FactoryInner>,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge `instance` to `shape`, or fail naming the first interface
    /// member with no structural match.
    pub fn create(&self, shape: &Arc<InterfaceShape>, instance: &ApiObject) -> Result<Arc<Proxy>, ProxyError> {
        let key = (shape.name().to_string(), instance_identity(instance));
        let mut cache = self.inner.cache.lock();
        let bucket = cache.entry(key).or_default();
        if let Some(existing) = bucket.iter().find(|proxy| shape::same_shape(proxy.shape(), shape)) {
            return Ok(existing.clone());
        }

        let bindings = bind_or_error(shape, instance)?;
        let proxy = Arc::new(Proxy {
            shape: shape.clone(),
            target: instance.clone(),
            bindings,
            factory: Arc::downgrade(&self.inner),
        });
        trace!(
            "Generated proxy bridging '{}' to '{}'",
            shape.name(),
            instance.type_name()
        );
        bucket.push(proxy.clone());
        Ok(proxy)
    }

    /// Typed form of [`create`](Self::create) for interfaces declared with
    /// `define_interface!`.
    pub fn create_as<I: BridgeInterface>(&self, instance: &ApiObject) -> Result<I, ProxyError> {
        self.create(&I::shape(), instance).map(I::from_proxy)
    }

    /// Check whether `instance` would bridge to `shape` without caching anything.
    pub fn check(&self, shape: &InterfaceShape, instance: &ApiObject) -> Result<(), ProxyError> {
        bind_or_error(shape, instance).map(|_| ())
    }

    /// Number of adapters generated so far
    pub fn cached_count(&self) -> usize {
        self.inner.cache.lock().values().map(Vec::len).sum()
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("cached", &self.cached_count())
            .finish()
    }
}

fn instance_identity(instance: &ApiObject) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

fn bind_or_error(shape: &InterfaceShape, instance: &ApiObject) -> Result<Vec<usize>, ProxyError> {
    shape::bind(shape, instance.methods()).map_err(|member| ProxyError::UnmatchedMember {
        interface: shape.name().to_string(),
        target: instance.type_name().to_string(),
        member: member.clone(),
    })
}

/// An adapter that satisfies an [`InterfaceShape`] by forwarding each member
/// to the structurally matching member of a target object.
pub struct Proxy {
    shape: Arc<InterfaceShape>,
    target: ApiObject,
    /// For each interface member, the index of the target member it forwards to
    bindings: Vec<usize>,
    factory: Weak<FactoryInner>,
}

impl Proxy {
    pub fn shape(&self) -> &Arc<InterfaceShape> {
        &self.shape
    }

    pub fn target(&self) -> &ApiObject {
        &self.target
    }

    /// Invoke an interface member by name.
    pub fn invoke(&self, member: &str, args: Vec<Value>) -> Result<Value, ProxyError> {
        let index = self
            .shape
            .method_index(member)
            .ok_or_else(|| ProxyError::UnknownMember {
                interface: self.shape.name().to_string(),
                member: member.to_string(),
            })?;
        self.invoke_index(index, args)
    }

    fn invoke_index(&self, index: usize, args: Vec<Value>) -> Result<Value, ProxyError> {
        let (declared, target_index) = match (self.shape.methods().get(index), self.bindings.get(index)) {
            (Some(declared), Some(target_index)) => (declared, *target_index),
            _ => {
                return Err(ProxyError::UnknownMember {
                    interface: self.shape.name().to_string(),
                    member: format!("#{index}"),
                });
            }
        };
        if args.len() != declared.params.len() {
            return Err(ProxyError::ArgumentCount {
                member: declared.name.clone(),
                expected: declared.params.len(),
                actual: args.len(),
            });
        }
        let accepted: &MethodSignature = self
            .target
            .methods()
            .get(target_index)
            .ok_or_else(|| ProxyError::UnknownMember {
                interface: self.target.type_name().to_string(),
                member: declared.name.clone(),
            })?;

        let args = args
            .into_iter()
            .zip(&accepted.params)
            .map(|(value, ty)| self.adapt(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        let result = self.target.invoke(target_index, args)?;
        self.adapt(result, &declared.returns)
    }

    /// Convert a value crossing the boundary to `ty`, wrapping objects in
    /// nested proxies where an interface is expected.
    fn adapt(&self, value: Value, ty: &ValueType) -> Result<Value, ProxyError> {
        match (value, ty) {
            (Value::Proxy(proxy), ValueType::Interface(shape))
                if shape::same_shape(proxy.shape(), &shape.resolve()) =>
            {
                Ok(Value::Proxy(proxy))
            }
            (Value::Proxy(proxy), ValueType::Interface(shape)) => {
                let object: ApiObject = proxy;
                self.nested(&shape.resolve(), &object)
            }
            (Value::Object(object), ValueType::Interface(shape)) => self.nested(&shape.resolve(), &object),
            (Value::List(items), ValueType::List(inner)) => items
                .into_iter()
                .map(|item| self.adapt(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (value, ty) => value.coerce(ty),
        }
    }

    fn nested(&self, shape: &Arc<InterfaceShape>, object: &ApiObject) -> Result<Value, ProxyError> {
        let inner = self.factory.upgrade().ok_or(ProxyError::FactoryDropped)?;
        ProxyFactory { inner }.create(shape, object).map(Value::Proxy)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", &self.shape.name())
            .field("target", &self.target.type_name())
            .finish()
    }
}

/// A proxy is itself an API object, so it can be handed to another mod
/// that expects a plain object or a different interface.
impl DynamicApi for Proxy {
    fn type_name(&self) -> &str {
        self.shape.name()
    }

    fn methods(&self) -> &[MethodSignature] {
        self.shape.methods()
    }

    fn invoke(&self, index: usize, args: Vec<Value>) -> Result<Value, ProxyError> {
        self.invoke_index(index, args)
    }
}

/// Typed wrapper around a [`Proxy`], generated by `define_interface!`.
pub trait BridgeInterface: Sized + Clone + Send + Sync + 'static {
    fn shape() -> Arc<InterfaceShape>;
    fn from_proxy(proxy: Arc<Proxy>) -> Self;
    fn proxy(&self) -> &Arc<Proxy>;
}
