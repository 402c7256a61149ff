//! Handles for remote UNO objects.

use bytes::BytesMut;

use crate::cache::OutboundCache;
use crate::error::{Result, UrpError};
use crate::interface::MethodDef;
use crate::marshal;
use crate::types::{type_names, Type, TypeClass, UnoValue};

/// A remote object seen through one of its interfaces.
///
/// The proxy is only a name; calls go through the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnoProxy {
    pub oid: String,
    pub interface: Type,
}

impl UnoProxy {
    pub fn new(oid: impl Into<String>, interface: Type) -> Self {
        Self {
            oid: oid.into(),
            interface,
        }
    }

    /// The same object typed as another interface, without asking the remote
    /// side. Use `UrpConnection::query_interface` when support is not certain.
    pub fn retyped(&self, interface_name: &str) -> Self {
        Self::new(self.oid.clone(), Type::interface(interface_name))
    }

    /// The same object as plain `XInterface`, which is how `queryInterface`
    /// and `release` must be addressed.
    pub fn as_xinterface(&self) -> Self {
        self.retyped(type_names::X_INTERFACE)
    }

    /// The value to pass when this object is a call argument.
    pub fn to_value(&self) -> UnoValue {
        UnoValue::Interface(self.oid.clone())
    }

    /// Build a proxy from a return value holding an interface reference.
    /// `None` for a null reference.
    pub fn from_value(value: &UnoValue, interface_name: &str) -> Option<Self> {
        value
            .interface_oid()
            .map(|oid| Self::new(oid, Type::interface(interface_name)))
    }
}

/// Marshal call arguments according to the method signature.
pub fn encode_args(
    method: &MethodDef,
    args: &[UnoValue],
    oids: &mut OutboundCache<String>,
) -> Result<BytesMut> {
    if args.len() != method.params.len() {
        return Err(UrpError::Protocol(format!(
            "{}() takes {} arguments, {} given",
            method.name,
            method.params.len(),
            args.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(128);
    for (arg, param) in args.iter().zip(method.params) {
        marshal::put_value(&mut buf, arg, &param.to_type(), Some(&mut *oids));
    }
    Ok(buf)
}

/// Interpret the result of `queryInterface`: an `any` holding the reference
/// when supported, a void `any` when not.
pub fn queried_interface(value: UnoValue, requested: &Type) -> Result<Option<UnoProxy>> {
    match value {
        UnoValue::Any(any) if any.type_desc.class == TypeClass::Void => Ok(None),
        UnoValue::Any(any) => Ok(any
            .value
            .interface_oid()
            .map(|oid| UnoProxy::new(oid, requested.clone()))),
        other => Err(UrpError::Protocol(format!(
            "queryInterface answered with {other:?}"
        ))),
    }
}
