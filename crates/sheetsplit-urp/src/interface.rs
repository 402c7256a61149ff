//! Method signatures for the UNO interfaces the client calls.
//!
//! URP identifies a method by its index in the flattened interface, counting
//! inherited methods first. `XInterface` owns 0..=2 (`queryInterface`,
//! `acquire`, `release`), so most interfaces start at 3. `acquire` and
//! `release` are never sent by this client.

use crate::types::{type_names, Type, TypeClass};

/// A method's position and signature.
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub index: u16,
    pub params: &'static [Param],
    pub returns: Param,
}

/// Parameter and return types, spelled so method tables can be `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Void,
    Bool,
    Long,
    String,
    Type,
    Any,
    Interface(&'static str),
    Sequence(&'static Param),
    Struct(&'static str),
}

impl Param {
    pub fn to_type(self) -> Type {
        match self {
            Param::Void => Type::void(),
            Param::Bool => Type::boolean(),
            Param::Long => Type::long(),
            Param::String => Type::string(),
            Param::Type => Type::r#type(),
            Param::Any => Type::any(),
            Param::Interface(name) => Type::interface(name),
            Param::Struct(name) => Type::r#struct(name),
            Param::Sequence(element) => Type::sequence_of(&element.to_type()),
        }
    }
}

impl MethodDef {
    pub fn return_type(&self) -> Type {
        self.returns.to_type()
    }

    pub fn has_result(&self) -> bool {
        self.returns.to_type().class != TypeClass::Void
    }
}

const PROPERTY_VALUES: Param = Param::Sequence(&Param::Struct(type_names::PROPERTY_VALUE));
const PROTOCOL_PROPERTIES: Param = Param::Sequence(&Param::Struct(type_names::PROTOCOL_PROPERTY));

const fn method(name: &'static str, index: u16, params: &'static [Param], returns: Param) -> MethodDef {
    MethodDef {
        name,
        index,
        params,
        returns,
    }
}

// XInterface: queryInterface(0), acquire(1), release(2)
pub const QUERY_INTERFACE: MethodDef = method("queryInterface", 0, &[Param::Type], Param::Any);

// XProtocolProperties: getProperties(3), requestChange(4), commitChange(5)
pub const REQUEST_CHANGE: MethodDef = method("requestChange", 4, &[Param::Long], Param::Long);
pub const COMMIT_CHANGE: MethodDef = method("commitChange", 5, &[PROTOCOL_PROPERTIES], Param::Void);

// XComponentContext: getValueByName(3), getServiceManager(4)
pub const GET_SERVICE_MANAGER: MethodDef = method(
    "getServiceManager",
    4,
    &[],
    Param::Interface(type_names::X_MULTI_COMPONENT_FACTORY),
);

// XMultiComponentFactory: createInstanceWithContext(3), ...
pub const CREATE_INSTANCE_WITH_CONTEXT: MethodDef = method(
    "createInstanceWithContext",
    3,
    &[Param::String, Param::Interface(type_names::X_COMPONENT_CONTEXT)],
    Param::Interface(type_names::X_INTERFACE),
);

// XComponentLoader: loadComponentFromURL(3)
pub const LOAD_COMPONENT_FROM_URL: MethodDef = method(
    "loadComponentFromURL",
    3,
    &[Param::String, Param::String, Param::Long, PROPERTY_VALUES],
    Param::Interface(type_names::X_COMPONENT),
);

// XRefreshable: refresh(3), addRefreshListener(4), removeRefreshListener(5)
pub const REFRESH: MethodDef = method("refresh", 3, &[], Param::Void);

// XComponent: dispose(3), addEventListener(4), removeEventListener(5)
pub const DISPOSE: MethodDef = method("dispose", 3, &[], Param::Void);

// XModel: attachResource(6), getURL(7), getArgs(8), connectController(9),
//         disconnectController(10), lockControllers(11), unlockControllers(12),
//         hasControllersLocked(13), getCurrentController(14), ...
pub const GET_CURRENT_CONTROLLER: MethodDef = method(
    "getCurrentController",
    14,
    &[],
    Param::Interface(type_names::X_CONTROLLER),
);

// XSpreadsheetView: getActiveSheet(3), setActiveSheet(4)
pub const SET_ACTIVE_SHEET: MethodDef = method(
    "setActiveSheet",
    4,
    &[Param::Interface(type_names::X_SPREADSHEET)],
    Param::Void,
);

// XSpreadsheetDocument: getSheets(3)
pub const GET_SHEETS: MethodDef = method(
    "getSheets",
    3,
    &[],
    Param::Interface(type_names::X_SPREADSHEETS),
);

// XElementAccess: getElementType(3), hasElements(4)
// XIndexAccess: getCount(5), getByIndex(6)
pub const GET_COUNT: MethodDef = method("getCount", 5, &[], Param::Long);
pub const GET_BY_INDEX: MethodDef = method("getByIndex", 6, &[Param::Long], Param::Any);

// XNamed: getName(3), setName(4)
pub const GET_NAME: MethodDef = method("getName", 3, &[], Param::String);

// XStorable: hasLocation(3), getLocation(4), isReadonly(5), store(6),
//            storeAsURL(7), storeToURL(8)
pub const STORE_TO_URL: MethodDef = method(
    "storeToURL",
    8,
    &[Param::String, PROPERTY_VALUES],
    Param::Void,
);

// XCloseBroadcaster: addCloseListener(3), removeCloseListener(4)
// XCloseable: close(5)
pub const CLOSE: MethodDef = method("close", 5, &[Param::Bool], Param::Void);
