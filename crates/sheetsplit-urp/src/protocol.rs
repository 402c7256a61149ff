//! URP message headers: requests, replies, and the first/second level caches
//! that let repeated type/OID/TID values be elided.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cache::{CacheSlot, InboundCache, InboundTables, OutboundCache, NO_CACHE};
use crate::error::{Result, UrpError};
use crate::marshal;
use crate::types::Type;

const LONG_HEADER: u8 = 0x80;
const REQUEST: u8 = 0x40;
const NEW_TYPE: u8 = 0x20;
const NEW_OID: u8 = 0x10;
const NEW_TID: u8 = 0x08;
const FUNCTION_ID_16: u8 = 0x04;
const MORE_FLAGS: u8 = 0x01;

const EXCEPTION: u8 = 0x20;

const MUST_REPLY: u8 = 0x80;
const SYNCHRONOUS: u8 = 0x40;

/// Short request headers with the `0x40` bit carry a 14-bit function id.
const SHORT_FUNCTION_ID_14: u8 = 0x40;

/// Object id the peers use to negotiate protocol properties.
pub const OID_PROTOCOL_PROPERTIES: &str = "UrpProtocolProperties";

/// Thread id reserved for protocol-properties negotiation.
pub const TID_PROTOCOL_PROPERTIES: &[u8] = b".UrpProtocolPropertiesTid";

pub const FN_QUERY_INTERFACE: u16 = 0;
pub const FN_RELEASE: u16 = 2;
pub const FN_REQUEST_CHANGE: u16 = 4;
pub const FN_COMMIT_CHANGE: u16 = 5;

/// An incoming method call.
#[derive(Debug, Clone)]
pub struct Request {
    pub function_id: u16,
    pub interface: Type,
    pub oid: String,
    pub tid: Vec<u8>,
    pub must_reply: bool,
    pub synchronous: bool,
    /// Marshaled in-parameters; decoding needs the method signature.
    pub body: Bytes,
}

/// The answer to a method call.
#[derive(Debug, Clone)]
pub struct Reply {
    pub tid: Vec<u8>,
    pub exception: bool,
    /// Return value and out-parameters, or the exception as an `any`.
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Reply(Reply),
}

/// Decodes incoming messages, keeping the reader-side caches.
#[derive(Default)]
pub struct MessageReader {
    /// Shared with body decoding.
    pub tables: InboundTables,
    tids: InboundCache<Vec<u8>>,
    last_interface: Option<Type>,
    last_oid: Option<String>,
    last_tid: Option<Vec<u8>>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, mut data: Bytes) -> Result<Message> {
        if data.is_empty() {
            return Err(UrpError::Protocol("empty message".into()));
        }
        let flags = data.get_u8();
        if flags & LONG_HEADER == 0 {
            self.short_request(flags, data)
        } else if flags & REQUEST != 0 {
            self.long_request(flags, data)
        } else {
            self.reply(flags, data)
        }
    }

    fn short_request(&mut self, flags: u8, mut data: Bytes) -> Result<Message> {
        let function_id = if flags & SHORT_FUNCTION_ID_14 != 0 {
            take(&data, 1, "function id")?;
            (u16::from(flags & 0x3F) << 8) | u16::from(data.get_u8())
        } else {
            u16::from(flags & 0x3F)
        };
        Ok(Message::Request(Request {
            function_id,
            interface: cached(&self.last_interface, "interface type")?,
            oid: cached(&self.last_oid, "OID")?,
            tid: cached(&self.last_tid, "TID")?,
            must_reply: true,
            synchronous: true,
            body: data,
        }))
    }

    fn long_request(&mut self, flags: u8, mut data: Bytes) -> Result<Message> {
        let (must_reply, synchronous) = if flags & MORE_FLAGS != 0 {
            take(&data, 1, "second flags byte")?;
            let more = data.get_u8();
            (more & MUST_REPLY != 0, more & SYNCHRONOUS != 0)
        } else {
            (true, true)
        };

        let function_id = if flags & FUNCTION_ID_16 != 0 {
            take(&data, 2, "function id")?;
            data.get_u16()
        } else {
            take(&data, 1, "function id")?;
            u16::from(data.get_u8())
        };

        if flags & NEW_TYPE != 0 {
            self.last_interface = Some(marshal::get_type(&mut data, &mut self.tables)?);
        }
        if flags & NEW_OID != 0 {
            self.last_oid = Some(marshal::get_oid(&mut data, &mut self.tables)?);
        }
        if flags & NEW_TID != 0 {
            self.last_tid = Some(self.read_tid(&mut data)?);
        }

        Ok(Message::Request(Request {
            function_id,
            interface: cached(&self.last_interface, "interface type")?,
            oid: cached(&self.last_oid, "OID")?,
            tid: cached(&self.last_tid, "TID")?,
            must_reply,
            synchronous,
            body: data,
        }))
    }

    fn reply(&mut self, flags: u8, mut data: Bytes) -> Result<Message> {
        if flags & NEW_TID != 0 {
            self.last_tid = Some(self.read_tid(&mut data)?);
        }
        Ok(Message::Reply(Reply {
            tid: cached(&self.last_tid, "TID")?,
            exception: flags & EXCEPTION != 0,
            body: data,
        }))
    }

    fn read_tid(&mut self, data: &mut Bytes) -> Result<Vec<u8>> {
        let len = marshal::get_compressed(data)? as usize;
        take(data, len, "TID")?;
        let tid = data.copy_to_bytes(len).to_vec();
        take(data, 2, "TID cache index")?;
        let index = data.get_u16();
        if index == NO_CACHE {
            return Ok(tid);
        }
        if tid.is_empty() {
            self.tids.load(index, "TID")
        } else {
            self.tids.store(index, tid.clone());
            Ok(tid)
        }
    }
}

/// Encodes outgoing messages, mirroring the peer's caches.
#[derive(Default)]
pub struct MessageWriter {
    /// Shared with body encoding of interface references.
    pub oids: OutboundCache<String>,
    types: OutboundCache<Type>,
    tids: OutboundCache<Vec<u8>>,
    last_interface: Option<Type>,
    last_oid: Option<String>,
    last_tid: Option<Vec<u8>>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a request header followed by the already-marshaled `body`.
    pub fn request(
        &mut self,
        function_id: u16,
        interface: &Type,
        oid: &str,
        tid: &[u8],
        must_reply: bool,
        body: &[u8],
    ) -> BytesMut {
        let new_type = self.last_interface.as_ref() != Some(interface);
        let new_oid = self.last_oid.as_deref() != Some(oid);
        let new_tid = self.last_tid.as_deref() != Some(tid);

        let mut buf = BytesMut::with_capacity(body.len() + 64);

        // Everything cached and a synchronous call: one or two header bytes.
        if !new_type && !new_oid && !new_tid && must_reply && function_id < 0x4000 {
            if function_id < 0x40 {
                buf.put_u8(function_id as u8);
            } else {
                buf.put_u8(SHORT_FUNCTION_ID_14 | (function_id >> 8) as u8);
                buf.put_u8(function_id as u8);
            }
            buf.put_slice(body);
            return buf;
        }

        let mut flags = LONG_HEADER | REQUEST;
        if new_type {
            flags |= NEW_TYPE;
        }
        if new_oid {
            flags |= NEW_OID;
        }
        if new_tid {
            flags |= NEW_TID;
        }
        if function_id > 0xFF {
            flags |= FUNCTION_ID_16;
        }
        if !must_reply {
            flags |= MORE_FLAGS;
        }
        buf.put_u8(flags);
        if !must_reply {
            // One-way: neither MUST_REPLY nor SYNCHRONOUS.
            buf.put_u8(0);
        }

        if function_id > 0xFF {
            buf.put_u16(function_id);
        } else {
            buf.put_u8(function_id as u8);
        }

        if new_type {
            let slot = if interface.class.is_simple() {
                CacheSlot::UNCACHED
            } else {
                self.types.slot_for(interface)
            };
            marshal::put_type(&mut buf, interface, slot);
            self.last_interface = Some(interface.clone());
        }
        if new_oid {
            marshal::put_oid(&mut buf, oid, Some(&mut self.oids));
            self.last_oid = Some(oid.to_string());
        }
        if new_tid {
            self.write_tid(&mut buf, tid);
        }

        buf.put_slice(body);
        buf
    }

    /// Encode a reply header followed by `body`.
    pub fn reply(&mut self, tid: &[u8], exception: bool, body: &[u8]) -> BytesMut {
        let new_tid = self.last_tid.as_deref() != Some(tid);

        let mut flags = LONG_HEADER;
        if exception {
            flags |= EXCEPTION;
        }
        if new_tid {
            flags |= NEW_TID;
        }

        let mut buf = BytesMut::with_capacity(body.len() + 32);
        buf.put_u8(flags);
        if new_tid {
            self.write_tid(&mut buf, tid);
        }
        buf.put_slice(body);
        buf
    }

    fn write_tid(&mut self, buf: &mut BytesMut, tid: &[u8]) {
        let slot = self.tids.slot_for(&tid.to_vec());
        if slot.fresh {
            marshal::put_compressed(buf, tid.len() as u32);
            buf.put_slice(tid);
        } else {
            marshal::put_compressed(buf, 0);
        }
        buf.put_u16(slot.index);
        self.last_tid = Some(tid.to_vec());
    }
}

fn take(data: &Bytes, len: usize, what: &str) -> Result<()> {
    if data.remaining() < len {
        return Err(UrpError::Protocol(format!("truncated header: missing {what}")));
    }
    Ok(())
}

fn cached<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
    slot.clone()
        .ok_or_else(|| UrpError::Protocol(format!("header reuses {what} that was never sent")))
}
