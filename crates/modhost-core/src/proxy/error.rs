use thiserror::Error;

use crate::proxy::shape::MethodSignature;
use crate::proxy::value::{Value, ValueType};

/// Errors raised while generating or invoking a structural proxy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    /// An interface member has no structural counterpart on the target
    #[error("can't bridge interface '{interface}' to '{target}': no member matching '{member}'")]
    UnmatchedMember {
        interface: String,
        target: String,
        member: MethodSignature,
    },

    #[error("interface '{interface}' has no member named '{member}'")]
    UnknownMember { interface: String, member: String },

    #[error("'{member}' takes {expected} argument(s) but {actual} were given")]
    ArgumentCount {
        member: String,
        expected: usize,
        actual: usize,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The target object failed while running the forwarded call
    #[error("call to '{member}' on '{target}' failed: {message}")]
    Invocation {
        target: String,
        member: String,
        message: String,
    },

    #[error("the proxy factory that created this adapter has been dropped")]
    FactoryDropped,
}

impl ProxyError {
    pub fn type_mismatch(expected: &ValueType, found: &Value) -> Self {
        ProxyError::TypeMismatch {
            expected: expected.to_string(),
            found: found.type_label(),
        }
    }
}
