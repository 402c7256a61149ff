//! A URP connection: negotiation, method calls, and bootstrap of the
//! office-side objects.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Result, UrpError};
use crate::interface::{self, MethodDef};
use crate::marshal;
use crate::protocol::{
    Message, MessageReader, MessageWriter, Reply, Request, FN_COMMIT_CHANGE, FN_RELEASE,
    FN_REQUEST_CHANGE, OID_PROTOCOL_PROPERTIES, TID_PROTOCOL_PROPERTIES,
};
use crate::proxy::{self, UnoProxy};
use crate::transport::Transport;
use crate::types::{type_names, Any, Type, TypeClass, UnoException, UnoValue};

/// Well-known name of the initial object exported by
/// `soffice --accept=...;urp;StarOffice.ComponentContext`.
pub const INITIAL_OBJECT: &str = "StarOffice.ComponentContext";

/// Protocol property that makes every call carry an `XCurrentContext`.
const CURRENT_CONTEXT: &str = "CurrentContext";

/// A tie in `requestChange` means both sides drew the same number; retry a
/// few times before giving up on property negotiation.
const MAX_NEGOTIATION_ROUNDS: usize = 8;

/// The objects every session starts from.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub context: UnoProxy,
    pub service_manager: UnoProxy,
    /// The Desktop, typed as `XComponentLoader`.
    pub desktop: UnoProxy,
}

/// One URP bridge to an office process.
///
/// Calls are strictly sequential: each `call` sends a request and waits for
/// its reply before returning, so there is never more than one request in
/// flight.
pub struct UrpConnection<S = TcpStream> {
    transport: Transport<S>,
    reader: MessageReader,
    writer: MessageWriter,
    /// Thread id all our calls are issued under.
    tid: Vec<u8>,
    current_context: bool,
}

impl UrpConnection<TcpStream> {
    /// Connect to an office process listening on `host:port`. Makes exactly
    /// one attempt, bounded by `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Err(_) => return Err(UrpError::ConnectTimeout { addr, timeout }),
            Ok(Err(source)) => return Err(UrpError::Connect { addr, source }),
            Ok(Ok(stream)) => stream,
        };
        stream.set_nodelay(true)?;
        tracing::info!("connected to office process at {addr}");

        Self::handshake(stream).await
    }
}

impl<S> UrpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run protocol negotiation over an already-open stream.
    pub async fn handshake(stream: S) -> Result<Self> {
        let mut conn = Self {
            transport: Transport::new(stream),
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            tid: format!("sheetsplit-{:016x}", rand::random::<u64>()).into_bytes(),
            current_context: false,
        };
        conn.negotiate().await?;
        Ok(conn)
    }

    /// Whether calls carry a (null) current context, as agreed with the peer.
    pub fn current_context_mode(&self) -> bool {
        self.current_context
    }

    /// Close our side of the stream.
    pub async fn disconnect(mut self) -> Result<()> {
        self.transport.shutdown().await
    }

    // ========================================================================
    // Protocol properties
    // ========================================================================

    /// Negotiate the `CurrentContext` protocol property.
    ///
    /// Both sides may send `requestChange` with a random number at once; the
    /// larger number wins and the winner sends `commitChange`. A peer that
    /// answers with an exception does not support negotiation, which leaves
    /// the defaults in place.
    async fn negotiate(&mut self) -> Result<()> {
        let properties = Type::interface(type_names::X_PROTOCOL_PROPERTIES);
        let mut ours = self.send_request_change(&properties).await?;

        let mut rounds = 1;
        loop {
            match self.recv_message().await? {
                Message::Reply(reply) => {
                    if reply.exception {
                        tracing::debug!("peer rejected requestChange; keeping protocol defaults");
                        return Ok(());
                    }
                    let mut body = reply.body;
                    let verdict = marshal::get_value(&mut body, &Type::long(), &mut self.reader.tables)?;
                    match verdict.as_long() {
                        Some(1) => {
                            tracing::debug!("won protocol negotiation; committing {CURRENT_CONTEXT}");
                            return self.commit_change(&properties).await;
                        }
                        Some(0) => {
                            tracing::debug!("lost protocol negotiation; awaiting peer commit");
                            return self.await_commit_change().await;
                        }
                        Some(-1) if rounds < MAX_NEGOTIATION_ROUNDS => {
                            tracing::debug!("protocol negotiation tied; retrying");
                            rounds += 1;
                            ours = self.send_request_change(&properties).await?;
                        }
                        _ => {
                            tracing::warn!("unexpected requestChange verdict {verdict:?}; keeping protocol defaults");
                            return Ok(());
                        }
                    }
                }
                Message::Request(req) if req.function_id == FN_REQUEST_CHANGE => {
                    let mut body = req.body.clone();
                    let theirs = marshal::get_value(&mut body, &Type::long(), &mut self.reader.tables)?
                        .as_long()
                        .unwrap_or(0);
                    // 1: the requester wins, 0: we win, -1: tie.
                    let verdict: i32 = match theirs.cmp(&ours) {
                        std::cmp::Ordering::Greater => 1,
                        std::cmp::Ordering::Less => 0,
                        std::cmp::Ordering::Equal => -1,
                    };
                    tracing::debug!("peer requestChange {theirs} vs ours {ours}: answering {verdict}");
                    self.reply_value(&req.tid, UnoValue::Long(verdict), &Type::long()).await?;
                    if verdict == 1 {
                        return self.await_commit_change().await;
                    }
                }
                Message::Request(req) if req.function_id == FN_COMMIT_CHANGE => {
                    return self.accept_commit_change(req).await;
                }
                Message::Request(req) => self.serve_incoming(req).await?,
            }
        }
    }

    async fn send_request_change(&mut self, properties: &Type) -> Result<i32> {
        let ours: i32 = rand::random();
        tracing::debug!("sending requestChange({ours})");
        let mut body = BytesMut::new();
        marshal::put_value(&mut body, &UnoValue::Long(ours), &Type::long(), None);
        let msg = self.writer.request(
            interface::REQUEST_CHANGE.index,
            properties,
            OID_PROTOCOL_PROPERTIES,
            TID_PROTOCOL_PROPERTIES,
            true,
            &body,
        );
        self.transport.send(&msg).await?;
        Ok(ours)
    }

    async fn commit_change(&mut self, properties: &Type) -> Result<()> {
        let props = UnoValue::Sequence(vec![UnoValue::Struct(vec![
            UnoValue::String(CURRENT_CONTEXT.to_string()),
            UnoValue::void_any(),
        ])]);
        let mut body = BytesMut::new();
        marshal::put_value(
            &mut body,
            &props,
            &interface::COMMIT_CHANGE.params[0].to_type(),
            None,
        );
        let msg = self.writer.request(
            interface::COMMIT_CHANGE.index,
            properties,
            OID_PROTOCOL_PROPERTIES,
            TID_PROTOCOL_PROPERTIES,
            true,
            &body,
        );
        self.transport.send(&msg).await?;

        let reply = self.await_reply(TID_PROTOCOL_PROPERTIES).await?;
        if reply.exception {
            tracing::warn!("peer refused commitChange; keeping protocol defaults");
        } else {
            self.current_context = true;
        }
        Ok(())
    }

    async fn await_commit_change(&mut self) -> Result<()> {
        loop {
            match self.recv_message().await? {
                Message::Request(req) if req.function_id == FN_COMMIT_CHANGE => {
                    return self.accept_commit_change(req).await;
                }
                Message::Request(req) => self.serve_incoming(req).await?,
                Message::Reply(_) => {
                    tracing::trace!("dropping requestChange reply while awaiting commitChange");
                }
            }
        }
    }

    async fn accept_commit_change(&mut self, req: Request) -> Result<()> {
        let mut body = req.body.clone();
        let props = marshal::get_value(
            &mut body,
            &interface::COMMIT_CHANGE.params[0].to_type(),
            &mut self.reader.tables,
        )?;
        let names: Vec<&str> = match &props {
            UnoValue::Sequence(items) => items
                .iter()
                .filter_map(|item| match item {
                    UnoValue::Struct(members) => members.first().and_then(UnoValue::as_str),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.current_context = names.contains(&CURRENT_CONTEXT);
        tracing::debug!("peer committed protocol properties {names:?}");

        let msg = self.writer.reply(&req.tid, false, &[]);
        self.transport.send(&msg).await
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Invoke `method` on `target` and wait for the result.
    pub async fn call(
        &mut self,
        target: &UnoProxy,
        method: &MethodDef,
        args: &[UnoValue],
    ) -> Result<UnoValue> {
        let encoded = proxy::encode_args(method, args, &mut self.writer.oids)?;
        let mut body = BytesMut::with_capacity(encoded.len() + 3);
        if self.current_context {
            // Null XCurrentContext.
            marshal::put_oid(&mut body, "", None);
        }
        body.extend_from_slice(&encoded);

        tracing::trace!("{}() on {} as {}", method.name, target.oid, target.interface);
        let msg = self.writer.request(
            method.index,
            &target.interface,
            &target.oid,
            &self.tid,
            true,
            &body,
        );
        self.transport.send(&msg).await?;

        let tid = self.tid.clone();
        let reply = self.await_reply(&tid).await?;
        let mut body = reply.body;
        if reply.exception {
            let exc = self.decode_exception(&mut body)?;
            tracing::debug!("{}() raised {exc}", method.name);
            return Err(UrpError::Remote(exc));
        }
        if !method.has_result() {
            return Ok(UnoValue::Void);
        }
        marshal::get_value(&mut body, &method.return_type(), &mut self.reader.tables)
    }

    /// Ask `target` for another interface. `None` when the object does not
    /// implement it.
    pub async fn query_interface(
        &mut self,
        target: &UnoProxy,
        interface_name: &str,
    ) -> Result<Option<UnoProxy>> {
        let wanted = Type::interface(interface_name);
        let result = self
            .call(
                &target.as_xinterface(),
                &interface::QUERY_INTERFACE,
                &[UnoValue::Type(wanted.clone())],
            )
            .await?;
        proxy::queried_interface(result, &wanted)
    }

    /// Like `query_interface`, but a missing interface is an error.
    pub async fn require_interface(
        &mut self,
        target: &UnoProxy,
        interface_name: &str,
    ) -> Result<UnoProxy> {
        self.query_interface(target, interface_name)
            .await?
            .ok_or_else(|| UrpError::Unsupported(interface_name.to_string()))
    }

    /// Call a method that returns an interface reference, rejecting null.
    pub async fn call_for_object(
        &mut self,
        target: &UnoProxy,
        method: &MethodDef,
        args: &[UnoValue],
        interface_name: &str,
    ) -> Result<UnoProxy> {
        let result = self.call(target, method, args).await?;
        UnoProxy::from_value(&result, interface_name).ok_or(UrpError::NullReference(method.name))
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// Resolve the component context, its service manager, and the Desktop.
    pub async fn bootstrap(&mut self) -> Result<Bootstrap> {
        let initial = UnoProxy::new(INITIAL_OBJECT, Type::interface(type_names::X_INTERFACE));
        let context = match self.query_interface(&initial, type_names::X_COMPONENT_CONTEXT).await? {
            Some(context) => context,
            None => initial.retyped(type_names::X_COMPONENT_CONTEXT),
        };
        tracing::debug!("component context is {}", context.oid);

        let service_manager = self
            .call_for_object(
                &context,
                &interface::GET_SERVICE_MANAGER,
                &[],
                type_names::X_MULTI_COMPONENT_FACTORY,
            )
            .await?;
        tracing::debug!("service manager is {}", service_manager.oid);

        let desktop = self
            .call_for_object(
                &service_manager,
                &interface::CREATE_INSTANCE_WITH_CONTEXT,
                &[
                    UnoValue::String(type_names::SERVICE_DESKTOP.to_string()),
                    context.to_value(),
                ],
                type_names::X_INTERFACE,
            )
            .await?;
        let desktop = self
            .require_interface(&desktop, type_names::X_COMPONENT_LOADER)
            .await?;
        tracing::info!("resolved Desktop {}", desktop.oid);

        Ok(Bootstrap {
            context,
            service_manager,
            desktop,
        })
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    async fn recv_message(&mut self) -> Result<Message> {
        let data = self.transport.recv().await?;
        self.reader.decode(data)
    }

    /// Wait for the reply to the outstanding request on `tid`, answering any
    /// requests the peer sends in the meantime.
    async fn await_reply(&mut self, tid: &[u8]) -> Result<Reply> {
        loop {
            match self.recv_message().await? {
                Message::Reply(reply) if reply.tid == tid => return Ok(reply),
                Message::Reply(reply) => {
                    return Err(UrpError::Protocol(format!(
                        "reply for unknown thread {:?}",
                        String::from_utf8_lossy(&reply.tid)
                    )));
                }
                Message::Request(req) => self.serve_incoming(req).await?,
            }
        }
    }

    /// We export no objects, so the only request worth honoring is a
    /// `release`, which needs no answer. Anything else gets a RuntimeException.
    async fn serve_incoming(&mut self, req: Request) -> Result<()> {
        if req.function_id == FN_RELEASE {
            tracing::trace!("ignoring release of {}", req.oid);
            return Ok(());
        }
        if !req.must_reply {
            return Ok(());
        }
        tracing::debug!(
            "refusing incoming call {} on {} ({})",
            req.function_id,
            req.oid,
            req.interface
        );
        let exc = UnoException::new(
            type_names::RUNTIME_EXCEPTION,
            "this bridge does not export objects",
        );
        let mut body = BytesMut::new();
        marshal::put_value(
            &mut body,
            &UnoValue::any(
                Type::exception(type_names::RUNTIME_EXCEPTION),
                UnoValue::Exception(exc),
            ),
            &Type::any(),
            None,
        );
        let msg = self.writer.reply(&req.tid, true, &body);
        self.transport.send(&msg).await
    }

    async fn reply_value(&mut self, tid: &[u8], value: UnoValue, ty: &Type) -> Result<()> {
        let mut body = BytesMut::new();
        marshal::put_value(&mut body, &value, ty, Some(&mut self.writer.oids));
        let msg = self.writer.reply(tid, false, &body);
        self.transport.send(&msg).await
    }

    fn decode_exception(&mut self, body: &mut Bytes) -> Result<UnoException> {
        if body.is_empty() {
            return Ok(UnoException::new(type_names::RUNTIME_EXCEPTION, "(empty exception)"));
        }
        let raised = marshal::get_value(body, &Type::any(), &mut self.reader.tables)?;
        Ok(match raised {
            UnoValue::Any(any) => {
                let Any { type_desc, value } = *any;
                match value {
                    UnoValue::Exception(exc) => exc,
                    other if type_desc.class == TypeClass::Exception => {
                        UnoException::new(type_desc.name, format!("{other:?}"))
                    }
                    other => UnoException::new(type_desc.to_string(), format!("{other:?}")),
                }
            }
            other => UnoException::new(type_names::RUNTIME_EXCEPTION, format!("{other:?}")),
        })
    }
}
