use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::proxy::value::ValueType;

/// Name, parameter types and return type of one API member.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<ValueType>, returns: ValueType) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// A named set of members a consumer expects an API object to provide.
///
/// The name should be fully qualified; `define_interface!` uses the module
/// path of the declaration. Independently built mods may still reuse a name,
/// so identity checks go through [`same_shape`], never the name alone.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceShape {
    name: String,
    methods: Vec<MethodSignature>,
}

impl InterfaceShape {
    pub fn new(name: impl Into<String>, methods: Vec<MethodSignature>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }
}

/// Find, for every member of `interface`, the index of the structurally
/// matching member in `candidates`.
///
/// Returns the first interface member without a match on failure.
pub fn bind<'a>(
    interface: &'a InterfaceShape,
    candidates: &[MethodSignature],
) -> Result<Vec<usize>, &'a MethodSignature> {
    Matcher::default().bind(interface, candidates)
}

/// Whether two shapes carry the same name and the same members, comparing
/// nested interfaces member by member too.
pub fn same_shape(a: &InterfaceShape, b: &InterfaceShape) -> bool {
    Matcher::default().same_shape(a, b)
}

/// Whether a value declared as `from` may be passed where `to` is expected.
pub fn is_assignable(from: &ValueType, to: &ValueType) -> bool {
    Matcher::default().assignable(from, to)
}

#[derive(Default)]
struct Matcher {
    // Interface pairs currently being compared; revisits are assumed to hold
    // so mutually recursive shapes terminate.
    assumed: HashSet<(String, String)>,
}

impl Matcher {
    fn bind<'a>(
        &mut self,
        interface: &'a InterfaceShape,
        candidates: &[MethodSignature],
    ) -> Result<Vec<usize>, &'a MethodSignature> {
        interface
            .methods()
            .iter()
            .map(|wanted| self.find(wanted, candidates).ok_or(wanted))
            .collect()
    }

    fn find(&mut self, wanted: &MethodSignature, candidates: &[MethodSignature]) -> Option<usize> {
        candidates.iter().position(|candidate| {
            candidate.name == wanted.name
                && candidate.params.len() == wanted.params.len()
                && wanted
                    .params
                    .iter()
                    .zip(&candidate.params)
                    .all(|(given, accepted)| self.assignable(given, accepted))
                && self.assignable(&candidate.returns, &wanted.returns)
        })
    }

    fn assignable(&mut self, from: &ValueType, to: &ValueType) -> bool {
        match (from, to) {
            (_, ValueType::Any) => true,
            (ValueType::Int, ValueType::Float) => true,
            (ValueType::List(a), ValueType::List(b)) => self.assignable(a, b),
            (ValueType::Interface(_), ValueType::Object) => true,
            // Bridged lazily when the value actually crosses the boundary
            (ValueType::Object, ValueType::Interface(_)) => true,
            (ValueType::Interface(a), ValueType::Interface(b)) => {
                let provided = a.resolve();
                let required = b.resolve();
                if Arc::ptr_eq(&provided, &required) {
                    return true;
                }
                let key = (a.name().to_string(), b.name().to_string());
                if !self.assumed.insert(key.clone()) {
                    return true;
                }
                let satisfied = self.bind(&required, provided.methods()).is_ok();
                self.assumed.remove(&key);
                satisfied
            }
            (a, b) => a == b,
        }
    }

    fn same_shape(&mut self, a: &InterfaceShape, b: &InterfaceShape) -> bool {
        if std::ptr::eq(a, b) {
            return true;
        }
        a.name() == b.name()
            && a.methods().len() == b.methods().len()
            && a.methods().iter().zip(b.methods()).all(|(x, y)| {
                x.name == y.name
                    && x.params.len() == y.params.len()
                    && x.params.iter().zip(&y.params).all(|(p, q)| self.same_type(p, q))
                    && self.same_type(&x.returns, &y.returns)
            })
    }

    fn same_type(&mut self, a: &ValueType, b: &ValueType) -> bool {
        match (a, b) {
            (ValueType::List(a), ValueType::List(b)) => self.same_type(a, b),
            (ValueType::Interface(a), ValueType::Interface(b)) => {
                if a.name() != b.name() {
                    return false;
                }
                let key = (a.name().to_string(), b.name().to_string());
                if !self.assumed.insert(key.clone()) {
                    return true;
                }
                let same = self.same_shape(&a.resolve(), &b.resolve());
                self.assumed.remove(&key);
                same
            }
            (a, b) => a == b,
        }
    }
}
