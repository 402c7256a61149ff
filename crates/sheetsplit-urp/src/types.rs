//! UNO type descriptions and values as they travel over URP.

use std::fmt;

/// UNO type class. The discriminant is the wire encoding (low 7 bits of a
/// type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeClass {
    Void = 0,
    Char = 1,
    Boolean = 2,
    Byte = 3,
    Short = 4,
    UnsignedShort = 5,
    Long = 6,
    UnsignedLong = 7,
    Hyper = 8,
    UnsignedHyper = 9,
    Float = 10,
    Double = 11,
    String = 12,
    Type = 13,
    Any = 14,
    Enum = 15,
    Struct = 17,
    Exception = 19,
    Sequence = 20,
    Interface = 22,
}

impl TypeClass {
    pub fn from_byte(b: u8) -> Option<TypeClass> {
        use TypeClass::*;
        let class = match b & 0x7F {
            0 => Void,
            1 => Char,
            2 => Boolean,
            3 => Byte,
            4 => Short,
            5 => UnsignedShort,
            6 => Long,
            7 => UnsignedLong,
            8 => Hyper,
            9 => UnsignedHyper,
            10 => Float,
            11 => Double,
            12 => String,
            13 => Type,
            14 => Any,
            15 => Enum,
            17 => Struct,
            19 => Exception,
            20 => Sequence,
            22 => Interface,
            _ => return None,
        };
        Some(class)
    }

    /// Simple classes are sent as a bare type byte, without name or cache index.
    pub fn is_simple(self) -> bool {
        (self as u8) <= TypeClass::Any as u8
    }

    /// The IDL spelling of a simple class, as it appears inside sequence names.
    fn idl_name(self) -> Option<&'static str> {
        use TypeClass::*;
        let name = match self {
            Void => "void",
            Char => "char",
            Boolean => "boolean",
            Byte => "byte",
            Short => "short",
            UnsignedShort => "unsigned short",
            Long => "long",
            UnsignedLong => "unsigned long",
            Hyper => "hyper",
            UnsignedHyper => "unsigned hyper",
            Float => "float",
            Double => "double",
            String => "string",
            Type => "type",
            Any => "any",
            _ => return None,
        };
        Some(name)
    }
}

/// Struct types whose member layout this crate knows how to decode.
const KNOWN_STRUCTS: &[&str] = &[type_names::PROPERTY_VALUE, type_names::PROTOCOL_PROPERTY];

/// A UNO type: its class plus, for complex classes, the fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub class: TypeClass,
    pub name: String,
}

impl Type {
    pub fn simple(class: TypeClass) -> Self {
        debug_assert!(class.is_simple());
        Self {
            class,
            name: String::new(),
        }
    }

    pub fn named(class: TypeClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn void() -> Self {
        Self::simple(TypeClass::Void)
    }

    pub fn boolean() -> Self {
        Self::simple(TypeClass::Boolean)
    }

    pub fn short() -> Self {
        Self::simple(TypeClass::Short)
    }

    pub fn long() -> Self {
        Self::simple(TypeClass::Long)
    }

    pub fn double() -> Self {
        Self::simple(TypeClass::Double)
    }

    pub fn string() -> Self {
        Self::simple(TypeClass::String)
    }

    pub fn any() -> Self {
        Self::simple(TypeClass::Any)
    }

    pub fn r#type() -> Self {
        Self::simple(TypeClass::Type)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Interface, name)
    }

    pub fn r#struct(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Struct, name)
    }

    pub fn exception(name: impl Into<String>) -> Self {
        Self::named(TypeClass::Exception, name)
    }

    /// A sequence of `element`, named `[]<element>` as on the wire.
    pub fn sequence_of(element: &Type) -> Self {
        let inner = match element.class.idl_name() {
            Some(simple) => simple.to_string(),
            None => element.name.clone(),
        };
        Self::named(TypeClass::Sequence, format!("[]{inner}"))
    }

    /// For a sequence type, the type of its elements.
    ///
    /// Element names are resolved the way the IDL spells them: simple type
    /// names, nested `[]` sequences, the structs listed in `KNOWN_STRUCTS`,
    /// and interfaces for everything else.
    pub fn element_type(&self) -> Option<Type> {
        if self.class != TypeClass::Sequence {
            return None;
        }
        let inner = self.name.strip_prefix("[]")?;
        let simple = [
            TypeClass::Void,
            TypeClass::Char,
            TypeClass::Boolean,
            TypeClass::Byte,
            TypeClass::Short,
            TypeClass::UnsignedShort,
            TypeClass::Long,
            TypeClass::UnsignedLong,
            TypeClass::Hyper,
            TypeClass::UnsignedHyper,
            TypeClass::Float,
            TypeClass::Double,
            TypeClass::String,
            TypeClass::Type,
            TypeClass::Any,
        ]
        .into_iter()
        .find(|class| class.idl_name() == Some(inner));

        Some(match simple {
            Some(class) => Type::simple(class),
            None if inner.starts_with("[]") => Type::named(TypeClass::Sequence, inner),
            None if KNOWN_STRUCTS.contains(&inner) => Type::r#struct(inner),
            None => Type::interface(inner),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class.idl_name() {
            Some(simple) => f.write_str(simple),
            None => f.write_str(&self.name),
        }
    }
}

/// A value that can be sent or received over URP.
#[derive(Debug, Clone, PartialEq)]
pub enum UnoValue {
    Void,
    Bool(bool),
    Byte(u8),
    Short(i16),
    UnsignedShort(u16),
    Long(i32),
    UnsignedLong(u32),
    Hyper(i64),
    UnsignedHyper(u64),
    Float(f32),
    Double(f64),
    Char(u16),
    String(String),
    Type(Type),
    Any(Box<Any>),
    Enum(i32),
    /// Struct members in declaration order, each typed by its own variant.
    Struct(Vec<UnoValue>),
    Exception(UnoException),
    Sequence(Vec<UnoValue>),
    /// Interface reference by object id. An empty id is the null reference.
    Interface(String),
}

impl UnoValue {
    /// Wrap a value in an `any` carrying the given type.
    pub fn any(type_desc: Type, value: UnoValue) -> Self {
        UnoValue::Any(Box::new(Any { type_desc, value }))
    }

    /// The void `any`, used for "no value" results such as an unsupported
    /// `queryInterface`.
    pub fn void_any() -> Self {
        Self::any(Type::void(), UnoValue::Void)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            UnoValue::String(s) => Some(s),
            UnoValue::Any(any) => any.value.as_str(),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i32> {
        match self {
            UnoValue::Long(n) => Some(*n),
            UnoValue::Any(any) => any.value.as_long(),
            _ => None,
        }
    }

    /// The object id of a non-null interface reference, looking through one
    /// level of `any`.
    pub fn interface_oid(&self) -> Option<&str> {
        match self {
            UnoValue::Interface(oid) if !oid.is_empty() => Some(oid),
            UnoValue::Any(any) => any.value.interface_oid(),
            _ => None,
        }
    }

    /// The wire type implied by the variant. Used for struct members, which
    /// are marshaled without type tags.
    pub fn implied_type(&self) -> Type {
        match self {
            UnoValue::Void => Type::void(),
            UnoValue::Bool(_) => Type::boolean(),
            UnoValue::Byte(_) => Type::simple(TypeClass::Byte),
            UnoValue::Short(_) => Type::short(),
            UnoValue::UnsignedShort(_) => Type::simple(TypeClass::UnsignedShort),
            UnoValue::Long(_) => Type::long(),
            UnoValue::UnsignedLong(_) => Type::simple(TypeClass::UnsignedLong),
            UnoValue::Hyper(_) => Type::simple(TypeClass::Hyper),
            UnoValue::UnsignedHyper(_) => Type::simple(TypeClass::UnsignedHyper),
            UnoValue::Float(_) => Type::simple(TypeClass::Float),
            UnoValue::Double(_) => Type::double(),
            UnoValue::Char(_) => Type::simple(TypeClass::Char),
            UnoValue::String(_) => Type::string(),
            UnoValue::Type(_) => Type::r#type(),
            UnoValue::Any(_) => Type::any(),
            UnoValue::Enum(_) => Type::named(TypeClass::Enum, ""),
            UnoValue::Struct(_) => Type::r#struct(""),
            UnoValue::Exception(exc) => Type::exception(exc.type_name.clone()),
            UnoValue::Sequence(_) => Type::named(TypeClass::Sequence, "[]any"),
            UnoValue::Interface(_) => Type::interface(type_names::X_INTERFACE),
        }
    }
}

/// A value together with its runtime type.
#[derive(Debug, Clone, PartialEq)]
pub struct Any {
    pub type_desc: Type,
    pub value: UnoValue,
}

/// An exception raised by the remote side.
///
/// Only the members of `com.sun.star.uno.Exception` are decoded, plus the
/// error code of `ErrorCodeIOException`, which is what storage filters raise.
#[derive(Debug, Clone, PartialEq)]
pub struct UnoException {
    pub type_name: String,
    pub message: String,
    pub error_code: Option<i32>,
}

impl UnoException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            error_code: None,
        }
    }

    /// The unqualified exception name, e.g. `IOException`.
    pub fn short_name(&self) -> &str {
        self.type_name.rsplit('.').next().unwrap_or(&self.type_name)
    }
}

impl fmt::Display for UnoException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())?;
        if let Some(code) = self.error_code {
            write!(f, " (error code {code:#x})")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Fully-qualified names of the UNO types this client touches.
pub mod type_names {
    pub const X_INTERFACE: &str = "com.sun.star.uno.XInterface";
    pub const X_COMPONENT_CONTEXT: &str = "com.sun.star.uno.XComponentContext";
    pub const X_MULTI_COMPONENT_FACTORY: &str = "com.sun.star.lang.XMultiComponentFactory";
    pub const X_PROTOCOL_PROPERTIES: &str = "com.sun.star.bridge.XProtocolProperties";

    pub const X_COMPONENT: &str = "com.sun.star.lang.XComponent";
    pub const X_COMPONENT_LOADER: &str = "com.sun.star.frame.XComponentLoader";
    pub const X_CONTROLLER: &str = "com.sun.star.frame.XController";
    pub const X_MODEL: &str = "com.sun.star.frame.XModel";
    pub const X_STORABLE: &str = "com.sun.star.frame.XStorable";
    pub const X_CLOSEABLE: &str = "com.sun.star.util.XCloseable";
    pub const X_REFRESHABLE: &str = "com.sun.star.util.XRefreshable";

    pub const X_SPREADSHEET_DOCUMENT: &str = "com.sun.star.sheet.XSpreadsheetDocument";
    pub const X_SPREADSHEETS: &str = "com.sun.star.sheet.XSpreadsheets";
    pub const X_SPREADSHEET: &str = "com.sun.star.sheet.XSpreadsheet";
    pub const X_SPREADSHEET_VIEW: &str = "com.sun.star.sheet.XSpreadsheetView";
    pub const X_INDEX_ACCESS: &str = "com.sun.star.container.XIndexAccess";
    pub const X_NAMED: &str = "com.sun.star.container.XNamed";

    pub const PROPERTY_VALUE: &str = "com.sun.star.beans.PropertyValue";
    pub const PROTOCOL_PROPERTY: &str = "com.sun.star.bridge.ProtocolProperty";

    pub const RUNTIME_EXCEPTION: &str = "com.sun.star.uno.RuntimeException";
    pub const ILLEGAL_ARGUMENT_EXCEPTION: &str = "com.sun.star.lang.IllegalArgumentException";
    pub const IO_EXCEPTION: &str = "com.sun.star.io.IOException";
    pub const ERROR_CODE_IO_EXCEPTION: &str = "com.sun.star.task.ErrorCodeIOException";

    pub const SERVICE_DESKTOP: &str = "com.sun.star.frame.Desktop";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_names_follow_idl_spelling() {
        assert_eq!(Type::sequence_of(&Type::simple(TypeClass::Byte)).name, "[]byte");
        assert_eq!(
            Type::sequence_of(&Type::r#struct(type_names::PROPERTY_VALUE)).name,
            "[]com.sun.star.beans.PropertyValue"
        );
    }

    #[test]
    fn element_type_resolution() {
        let props = Type::sequence_of(&Type::r#struct(type_names::PROPERTY_VALUE));
        assert_eq!(
            props.element_type(),
            Some(Type::r#struct(type_names::PROPERTY_VALUE))
        );

        let longs = Type::sequence_of(&Type::long());
        assert_eq!(longs.element_type(), Some(Type::long()));

        let sheets = Type::sequence_of(&Type::interface(type_names::X_SPREADSHEET));
        assert_eq!(
            sheets.element_type(),
            Some(Type::interface(type_names::X_SPREADSHEET))
        );

        let nested = Type::sequence_of(&Type::sequence_of(&Type::string()));
        assert_eq!(nested.element_type().map(|t| t.name), Some("[]string".to_string()));

        assert_eq!(Type::string().element_type(), None);
    }

    #[test]
    fn interface_oid_looks_through_any() {
        let wrapped = UnoValue::any(
            Type::interface(type_names::X_SPREADSHEET),
            UnoValue::Interface("sheet-0".into()),
        );
        assert_eq!(wrapped.interface_oid(), Some("sheet-0"));
        assert_eq!(UnoValue::Interface(String::new()).interface_oid(), None);
        assert_eq!(UnoValue::void_any().interface_oid(), None);
    }

    #[test]
    fn exception_display() {
        let mut exc = UnoException::new(type_names::ERROR_CODE_IO_EXCEPTION, "");
        exc.error_code = Some(0x11b);
        assert_eq!(exc.to_string(), "ErrorCodeIOException (error code 0x11b)");

        let exc = UnoException::new("com.sun.star.lang.IllegalArgumentException", "bad url");
        assert_eq!(exc.to_string(), "IllegalArgumentException: bad url");
    }
}
