//! Binary encoding of UNO values for the URP wire format.
//!
//! Integers are big-endian. Strings are UTF-8 behind a compressed length.
//! A compressed number takes one byte below `0xFF`, otherwise `0xFF`
//! followed by a `u32`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cache::{CacheSlot, InboundTables, OutboundCache, NO_CACHE};
use crate::error::{Result, UrpError};
use crate::types::{type_names, Type, TypeClass, UnoException, UnoValue};

pub fn put_compressed(buf: &mut BytesMut, value: u32) {
    if value < 0xFF {
        buf.put_u8(value as u8);
    } else {
        buf.put_u8(0xFF);
        buf.put_u32(value);
    }
}

pub fn get_compressed(buf: &mut Bytes) -> Result<u32> {
    need(buf, 1, "compressed number")?;
    match buf.get_u8() {
        0xFF => {
            need(buf, 4, "extended compressed number")?;
            Ok(buf.get_u32())
        }
        small => Ok(small as u32),
    }
}

pub fn put_string(buf: &mut BytesMut, s: &str) {
    put_compressed(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn get_string(buf: &mut Bytes) -> Result<String> {
    let len = get_compressed(buf)? as usize;
    need(buf, len, "string")?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| UrpError::Marshal(format!("string is not UTF-8: {e}")))
}

/// Write a type description. Simple classes are a single byte; complex ones
/// carry a cache slot and, when `slot.fresh`, the type name.
pub fn put_type(buf: &mut BytesMut, ty: &Type, slot: CacheSlot) {
    let class = ty.class as u8;
    if ty.class.is_simple() {
        buf.put_u8(class);
        return;
    }
    if slot.fresh {
        buf.put_u8(class | 0x80);
        buf.put_u16(slot.index);
        put_string(buf, &ty.name);
    } else {
        buf.put_u8(class);
        buf.put_u16(slot.index);
    }
}

/// Read a type description, resolving and updating the type cache.
pub fn get_type(buf: &mut Bytes, tables: &mut InboundTables) -> Result<Type> {
    need(buf, 1, "type")?;
    let byte = buf.get_u8();
    let class = TypeClass::from_byte(byte).ok_or(UrpError::UnknownTypeClass(byte & 0x7F))?;
    if class.is_simple() {
        return Ok(Type::simple(class));
    }

    need(buf, 2, "type cache index")?;
    let index = buf.get_u16();
    if byte & 0x80 != 0 {
        let ty = Type::named(class, get_string(buf)?);
        if index != NO_CACHE {
            tables.types.store(index, ty.clone());
        }
        Ok(ty)
    } else {
        tables.types.load(index, "type")
    }
}

/// Write an interface reference. With an outbound cache, repeated OIDs are
/// sent as an empty string plus their slot.
pub fn put_oid(buf: &mut BytesMut, oid: &str, cache: Option<&mut OutboundCache<String>>) {
    let slot = match cache {
        Some(cache) if !oid.is_empty() => cache.slot_for(&oid.to_string()),
        _ => CacheSlot::UNCACHED,
    };
    put_string(buf, if slot.fresh { oid } else { "" });
    buf.put_u16(slot.index);
}

/// Read an interface reference, resolving it through the OID cache.
pub fn get_oid(buf: &mut Bytes, tables: &mut InboundTables) -> Result<String> {
    let oid = get_string(buf)?;
    need(buf, 2, "OID cache index")?;
    let index = buf.get_u16();
    if index == NO_CACHE {
        return Ok(oid);
    }
    if oid.is_empty() {
        tables.oids.load(index, "OID")
    } else {
        tables.oids.store(index, oid.clone());
        Ok(oid)
    }
}

/// Write `value` as type `ty`. Interface references go through `oids` when
/// given, sharing the cache with message headers.
pub fn put_value(
    buf: &mut BytesMut,
    value: &UnoValue,
    ty: &Type,
    mut oids: Option<&mut OutboundCache<String>>,
) {
    match value {
        UnoValue::Void => {}
        UnoValue::Bool(b) => buf.put_u8(u8::from(*b)),
        UnoValue::Byte(b) => buf.put_u8(*b),
        UnoValue::Short(n) => buf.put_i16(*n),
        UnoValue::UnsignedShort(n) => buf.put_u16(*n),
        UnoValue::Long(n) => buf.put_i32(*n),
        UnoValue::UnsignedLong(n) => buf.put_u32(*n),
        UnoValue::Hyper(n) => buf.put_i64(*n),
        UnoValue::UnsignedHyper(n) => buf.put_u64(*n),
        UnoValue::Float(f) => buf.put_f32(*f),
        UnoValue::Double(d) => buf.put_f64(*d),
        UnoValue::Char(c) => buf.put_u16(*c),
        UnoValue::String(s) => put_string(buf, s),
        UnoValue::Type(t) => put_type(buf, t, CacheSlot::UNCACHED),
        UnoValue::Enum(n) => buf.put_i32(*n),
        UnoValue::Any(any) => {
            put_type(buf, &any.type_desc, CacheSlot::UNCACHED);
            put_value(buf, &any.value, &any.type_desc, oids);
        }
        UnoValue::Struct(members) => {
            for member in members {
                put_value(buf, member, &member.implied_type(), oids.as_deref_mut());
            }
        }
        UnoValue::Exception(exc) => {
            put_string(buf, &exc.message);
            put_oid(buf, "", None);
            if let Some(code) = exc.error_code {
                buf.put_i32(code);
            }
        }
        UnoValue::Sequence(items) => {
            put_compressed(buf, items.len() as u32);
            let element = ty.element_type();
            for item in items {
                let item_type = element.clone().unwrap_or_else(|| item.implied_type());
                put_value(buf, item, &item_type, oids.as_deref_mut());
            }
        }
        UnoValue::Interface(oid) => put_oid(buf, oid, oids),
    }
}

/// Read a value of type `ty`.
pub fn get_value(buf: &mut Bytes, ty: &Type, tables: &mut InboundTables) -> Result<UnoValue> {
    let value = match ty.class {
        TypeClass::Void => UnoValue::Void,
        TypeClass::Boolean => {
            need(buf, 1, "boolean")?;
            UnoValue::Bool(buf.get_u8() != 0)
        }
        TypeClass::Byte => {
            need(buf, 1, "byte")?;
            UnoValue::Byte(buf.get_u8())
        }
        TypeClass::Short => {
            need(buf, 2, "short")?;
            UnoValue::Short(buf.get_i16())
        }
        TypeClass::UnsignedShort => {
            need(buf, 2, "unsigned short")?;
            UnoValue::UnsignedShort(buf.get_u16())
        }
        TypeClass::Long => {
            need(buf, 4, "long")?;
            UnoValue::Long(buf.get_i32())
        }
        TypeClass::UnsignedLong => {
            need(buf, 4, "unsigned long")?;
            UnoValue::UnsignedLong(buf.get_u32())
        }
        TypeClass::Hyper => {
            need(buf, 8, "hyper")?;
            UnoValue::Hyper(buf.get_i64())
        }
        TypeClass::UnsignedHyper => {
            need(buf, 8, "unsigned hyper")?;
            UnoValue::UnsignedHyper(buf.get_u64())
        }
        TypeClass::Float => {
            need(buf, 4, "float")?;
            UnoValue::Float(buf.get_f32())
        }
        TypeClass::Double => {
            need(buf, 8, "double")?;
            UnoValue::Double(buf.get_f64())
        }
        TypeClass::Char => {
            need(buf, 2, "char")?;
            UnoValue::Char(buf.get_u16())
        }
        TypeClass::String => UnoValue::String(get_string(buf)?),
        TypeClass::Type => UnoValue::Type(get_type(buf, tables)?),
        TypeClass::Enum => {
            need(buf, 4, "enum")?;
            UnoValue::Enum(buf.get_i32())
        }
        TypeClass::Any => {
            let type_desc = get_type(buf, tables)?;
            let value = get_value(buf, &type_desc, tables)?;
            UnoValue::any(type_desc, value)
        }
        TypeClass::Struct => get_struct(buf, &ty.name, tables)?,
        TypeClass::Exception => {
            let message = get_string(buf)?;
            let _context = get_oid(buf, tables)?;
            let mut exc = UnoException::new(ty.name.clone(), message);
            if ty.name == type_names::ERROR_CODE_IO_EXCEPTION && buf.remaining() >= 4 {
                exc.error_code = Some(buf.get_i32());
            }
            UnoValue::Exception(exc)
        }
        TypeClass::Sequence => {
            let count = get_compressed(buf)? as usize;
            let element = ty
                .element_type()
                .ok_or_else(|| UrpError::Marshal(format!("malformed sequence type {ty}")))?;
            let mut items = Vec::with_capacity(count.min(buf.remaining()));
            for _ in 0..count {
                items.push(get_value(buf, &element, tables)?);
            }
            UnoValue::Sequence(items)
        }
        TypeClass::Interface => UnoValue::Interface(get_oid(buf, tables)?),
    };
    Ok(value)
}

/// Decode the structs whose layout is known.
fn get_struct(buf: &mut Bytes, name: &str, tables: &mut InboundTables) -> Result<UnoValue> {
    match name {
        type_names::PROPERTY_VALUE => {
            let prop = get_string(buf)?;
            need(buf, 4, "PropertyValue.Handle")?;
            let handle = buf.get_i32();
            let value = get_value(buf, &Type::any(), tables)?;
            need(buf, 4, "PropertyValue.State")?;
            let state = buf.get_i32();
            Ok(UnoValue::Struct(vec![
                UnoValue::String(prop),
                UnoValue::Long(handle),
                value,
                UnoValue::Enum(state),
            ]))
        }
        type_names::PROTOCOL_PROPERTY => {
            let prop = get_string(buf)?;
            let value = get_value(buf, &Type::any(), tables)?;
            Ok(UnoValue::Struct(vec![UnoValue::String(prop), value]))
        }
        other => Err(UrpError::Marshal(format!("unknown struct type {other}"))),
    }
}

/// Build a `com.sun.star.beans.PropertyValue` with `DIRECT_VALUE` state.
pub fn property_value(name: &str, value: UnoValue, type_desc: Type) -> UnoValue {
    UnoValue::Struct(vec![
        UnoValue::String(name.to_string()),
        UnoValue::Long(0),
        UnoValue::any(type_desc, value),
        UnoValue::Enum(0),
    ])
}

fn need(buf: &Bytes, len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(UrpError::Marshal(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(buf: BytesMut, ty: &Type) -> UnoValue {
        let mut bytes = buf.freeze();
        let value = get_value(&mut bytes, ty, &mut InboundTables::default()).unwrap();
        assert!(bytes.is_empty(), "{} trailing bytes", bytes.len());
        value
    }

    #[test]
    fn compressed_boundaries() {
        let mut buf = BytesMut::new();
        put_compressed(&mut buf, 254);
        put_compressed(&mut buf, 255);
        assert_eq!(buf.as_ref(), &[254, 0xFF, 0, 0, 0, 255]);

        let mut bytes = buf.freeze();
        assert_eq!(get_compressed(&mut bytes).unwrap(), 254);
        assert_eq!(get_compressed(&mut bytes).unwrap(), 255);
    }

    #[test]
    fn truncated_string_is_rejected() {
        let mut bytes = Bytes::from_static(&[5, b'a', b'b']);
        assert!(matches!(get_string(&mut bytes), Err(UrpError::Marshal(_))));
    }

    #[test]
    fn non_ascii_sheet_name() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "Übersicht 2024 ✓");
        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes).unwrap(), "Übersicht 2024 ✓");
    }

    #[test]
    fn complex_type_is_cached_on_first_sight() {
        let iface = Type::interface(type_names::X_SPREADSHEET);
        let mut buf = BytesMut::new();
        put_type(&mut buf, &iface, CacheSlot { index: 7, fresh: true });
        put_type(&mut buf, &iface, CacheSlot { index: 7, fresh: false });
        assert_eq!(buf[0], TypeClass::Interface as u8 | 0x80);

        let mut tables = InboundTables::default();
        let mut bytes = buf.freeze();
        assert_eq!(get_type(&mut bytes, &mut tables).unwrap(), iface);
        assert_eq!(get_type(&mut bytes, &mut tables).unwrap(), iface);
    }

    #[test]
    fn cached_type_without_entry_fails() {
        let mut buf = BytesMut::new();
        put_type(
            &mut buf,
            &Type::interface(type_names::X_NAMED),
            CacheSlot { index: 9, fresh: false },
        );
        let mut bytes = buf.freeze();
        assert!(matches!(
            get_type(&mut bytes, &mut InboundTables::default()),
            Err(UrpError::Cache(_))
        ));
    }

    #[test]
    fn oid_cache_shares_slots() {
        let mut out = OutboundCache::new();
        let mut buf = BytesMut::new();
        put_oid(&mut buf, "sheet-1", Some(&mut out));
        put_oid(&mut buf, "sheet-1", Some(&mut out));

        let mut tables = InboundTables::default();
        let mut bytes = buf.freeze();
        assert_eq!(get_oid(&mut bytes, &mut tables).unwrap(), "sheet-1");
        assert_eq!(get_oid(&mut bytes, &mut tables).unwrap(), "sheet-1");
    }

    #[test]
    fn property_sequence_layout() {
        let props = UnoValue::Sequence(vec![
            property_value("Hidden", UnoValue::Bool(true), Type::boolean()),
            property_value("FilterOptions", UnoValue::String("44,34,0".into()), Type::string()),
        ]);
        let ty = Type::sequence_of(&Type::r#struct(type_names::PROPERTY_VALUE));

        let mut buf = BytesMut::new();
        put_value(&mut buf, &props, &ty, None);
        assert_eq!(decode(buf, &ty), props);
    }

    #[test]
    fn any_holding_interface() {
        let value = UnoValue::any(
            Type::interface(type_names::X_SPREADSHEET),
            UnoValue::Interface("sheet-oid".into()),
        );
        let mut buf = BytesMut::new();
        put_value(&mut buf, &value, &Type::any(), None);
        assert_eq!(decode(buf, &Type::any()), value);
    }

    #[test]
    fn error_code_io_exception_carries_code() {
        let mut exc = UnoException::new(type_names::ERROR_CODE_IO_EXCEPTION, "");
        exc.error_code = Some(0x0c10);
        let value = UnoValue::any(
            Type::exception(type_names::ERROR_CODE_IO_EXCEPTION),
            UnoValue::Exception(exc.clone()),
        );
        let mut buf = BytesMut::new();
        put_value(&mut buf, &value, &Type::any(), None);

        match decode(buf, &Type::any()) {
            UnoValue::Any(any) => assert_eq!(any.value, UnoValue::Exception(exc)),
            other => panic!("expected any, got {other:?}"),
        }
    }
}
