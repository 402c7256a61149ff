//! An in-process office stand-in that speaks real URP over TCP.
//!
//! It understands just the calls a conversion makes, keeps a log of what it
//! was asked to do, and writes a small CSV file for every `storeToURL`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use sheetsplit::SessionConfig;
use sheetsplit_urp::interface;
use sheetsplit_urp::marshal;
use sheetsplit_urp::protocol::{
    Message, MessageReader, MessageWriter, Request, FN_QUERY_INTERFACE, FN_RELEASE,
    OID_PROTOCOL_PROPERTIES,
};
use sheetsplit_urp::transport::Transport;
use sheetsplit_urp::{type_names, Type, UnoException, UnoValue};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the fake document looks like and how it misbehaves.
#[derive(Debug, Clone)]
pub struct Script {
    pub sheets: Vec<String>,
    /// `storeToURL` raises while this sheet (0-based) is active.
    pub fail_store_at: Option<usize>,
    /// `setActiveSheet` raises for this sheet (0-based).
    pub fail_activate_at: Option<usize>,
    /// `close` raises after being counted.
    pub fail_close: bool,
    /// Whether the loaded component is a spreadsheet document.
    pub spreadsheet: bool,
    pub refreshable: bool,
}

impl Script {
    pub fn with_sheets(names: &[&str]) -> Self {
        Self {
            sheets: names.iter().map(|s| s.to_string()).collect(),
            fail_store_at: None,
            fail_activate_at: None,
            fail_close: false,
            spreadsheet: true,
            refreshable: true,
        }
    }
}

/// Everything the fake office was asked to do.
#[derive(Debug, Default)]
pub struct Journal {
    pub connections: usize,
    pub loads: Vec<String>,
    pub load_props: Vec<Vec<(String, UnoValue)>>,
    pub refreshes: usize,
    pub activations: Vec<usize>,
    pub stores: Vec<PathBuf>,
    pub store_props: Vec<Vec<(String, UnoValue)>>,
    pub closes: usize,
}

pub struct FakeOffice {
    pub addr: SocketAddr,
    journal: Arc<Mutex<Journal>>,
    task: JoinHandle<()>,
}

impl FakeOffice {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let journal = Arc::new(Mutex::new(Journal::default()));

        let shared = journal.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                stream.set_nodelay(true).unwrap();
                shared.lock().unwrap().connections += 1;
                let mut peer = Peer::new(stream, script.clone(), shared.clone());
                // One client at a time, like the CLI.
                let _ = peer.serve().await;
            }
        });

        Self {
            addr,
            journal,
            task,
        }
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

impl Drop for FakeOffice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A `SessionConfig` pointing at a port nobody listens on.
pub async fn unreachable_config() -> SessionConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    SessionConfig {
        host: "127.0.0.1".into(),
        port,
        connect_timeout: Duration::from_secs(5),
    }
}

/// Contents the fake office writes for a sheet.
pub fn fake_csv(name: &str, index: usize) -> String {
    format!("\"sheet\",\"{name}\"\n\"index\",{index}\n")
}

struct Peer {
    transport: Transport<TcpStream>,
    reader: MessageReader,
    writer: MessageWriter,
    script: Script,
    journal: Arc<Mutex<Journal>>,
    active: Option<usize>,
}

impl Peer {
    fn new(stream: TcpStream, script: Script, journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            transport: Transport::new(stream),
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            script,
            journal,
            active: None,
        }
    }

    async fn serve(&mut self) -> sheetsplit_urp::Result<()> {
        loop {
            let data = self.transport.recv().await?;
            let req = match self.reader.decode(data)? {
                Message::Request(req) => req,
                Message::Reply(_) => continue,
            };
            if req.function_id == FN_RELEASE && req.oid != OID_PROTOCOL_PROPERTIES {
                continue;
            }
            let answer = self.dispatch(&req);
            let msg = match answer {
                Ok(value) => {
                    let mut body = BytesMut::new();
                    marshal::put_value(&mut body, &value, &value.implied_type(), None);
                    self.writer.reply(&req.tid, false, &body)
                }
                Err(exc) => {
                    let mut body = BytesMut::new();
                    let ty = Type::exception(exc.type_name.clone());
                    marshal::put_value(
                        &mut body,
                        &UnoValue::any(ty, UnoValue::Exception(exc)),
                        &Type::any(),
                        None,
                    );
                    self.writer.reply(&req.tid, true, &body)
                }
            };
            self.transport.send(&msg).await?;
        }
    }

    fn dispatch(&mut self, req: &Request) -> Result<UnoValue, UnoException> {
        let mut body = req.body.clone();
        if req.oid == OID_PROTOCOL_PROPERTIES {
            // No protocol properties: the client keeps the defaults.
            return Err(exc(type_names::RUNTIME_EXCEPTION, "not supported"));
        }
        if req.function_id == FN_QUERY_INTERFACE {
            let wanted = match self.arg(&mut body, &Type::r#type()) {
                UnoValue::Type(ty) => ty,
                other => return Err(exc(type_names::RUNTIME_EXCEPTION, &format!("{other:?}"))),
            };
            return Ok(self.query_interface(&req.oid, wanted));
        }

        let iface = req.interface.name.as_str();
        match (iface, req.function_id) {
            (type_names::X_COMPONENT_CONTEXT, 4) => Ok(UnoValue::Interface("sm".into())),
            (type_names::X_MULTI_COMPONENT_FACTORY, 3) => Ok(UnoValue::Interface("desktop".into())),
            (type_names::X_COMPONENT_LOADER, 3) => self.load(&mut body),
            (type_names::X_REFRESHABLE, 3) => {
                self.journal.lock().unwrap().refreshes += 1;
                Ok(UnoValue::Void)
            }
            (type_names::X_SPREADSHEET_DOCUMENT, 3) => Ok(UnoValue::Interface("sheets".into())),
            (type_names::X_INDEX_ACCESS, 5) => Ok(UnoValue::Long(self.script.sheets.len() as i32)),
            (type_names::X_INDEX_ACCESS, 6) => {
                let index = self.arg(&mut body, &Type::long()).as_long().unwrap_or(-1);
                if index < 0 || index as usize >= self.script.sheets.len() {
                    return Err(exc(
                        "com.sun.star.lang.IndexOutOfBoundsException",
                        &index.to_string(),
                    ));
                }
                Ok(UnoValue::any(
                    Type::interface(type_names::X_SPREADSHEET),
                    UnoValue::Interface(format!("sheet-{index}")),
                ))
            }
            (type_names::X_NAMED, 3) => {
                let index = sheet_index(&req.oid).expect("getName on a sheet");
                Ok(UnoValue::String(self.script.sheets[index].clone()))
            }
            (type_names::X_MODEL, 14) => Ok(UnoValue::Interface("controller".into())),
            (type_names::X_SPREADSHEET_VIEW, 4) => {
                let oid = self.arg(&mut body, &Type::interface(type_names::X_SPREADSHEET));
                let index = oid
                    .interface_oid()
                    .and_then(sheet_index)
                    .expect("setActiveSheet with a sheet");
                if self.script.fail_activate_at == Some(index) {
                    return Err(exc(type_names::RUNTIME_EXCEPTION, "no current view"));
                }
                self.active = Some(index);
                self.journal.lock().unwrap().activations.push(index);
                Ok(UnoValue::Void)
            }
            (type_names::X_STORABLE, 8) => self.store(&mut body),
            (type_names::X_CLOSEABLE, 5) => {
                self.journal.lock().unwrap().closes += 1;
                if self.script.fail_close {
                    return Err(exc(type_names::RUNTIME_EXCEPTION, "close vetoed"));
                }
                Ok(UnoValue::Void)
            }
            (iface, function_id) => Err(exc(
                type_names::RUNTIME_EXCEPTION,
                &format!("unexpected call {function_id} on {iface}"),
            )),
        }
    }

    fn query_interface(&self, oid: &str, wanted: Type) -> UnoValue {
        let supported = match wanted.name.as_str() {
            type_names::X_REFRESHABLE => self.script.refreshable,
            type_names::X_SPREADSHEET_DOCUMENT => self.script.spreadsheet,
            _ => true,
        };
        if supported {
            UnoValue::any(wanted, UnoValue::Interface(oid.to_string()))
        } else {
            UnoValue::void_any()
        }
    }

    fn load(&mut self, body: &mut Bytes) -> Result<UnoValue, UnoException> {
        let url = self.arg(body, &Type::string()).as_str().unwrap_or_default().to_string();
        let _target = self.arg(body, &Type::string());
        let _flags = self.arg(body, &Type::long());
        let props = self.properties(body);

        let mut journal = self.journal.lock().unwrap();
        journal.loads.push(url.clone());
        journal.load_props.push(props);

        let exists = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .is_some_and(|p| p.is_file());
        if !exists {
            return Err(exc(type_names::ILLEGAL_ARGUMENT_EXCEPTION, "Unsupported URL"));
        }
        Ok(UnoValue::Interface("doc".into()))
    }

    fn store(&mut self, body: &mut Bytes) -> Result<UnoValue, UnoException> {
        let url = self.arg(body, &Type::string()).as_str().unwrap_or_default().to_string();
        let props = self.properties(body);
        self.journal.lock().unwrap().store_props.push(props);

        let index = self.active.expect("storeToURL before setActiveSheet");
        if self.script.fail_store_at == Some(index) {
            let mut failure = exc(type_names::ERROR_CODE_IO_EXCEPTION, "");
            failure.error_code = Some(0x11b);
            return Err(failure);
        }

        let path = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| exc(type_names::IO_EXCEPTION, "not a file URL"))?;
        std::fs::write(&path, fake_csv(&self.script.sheets[index], index))
            .map_err(|e| exc(type_names::IO_EXCEPTION, &e.to_string()))?;
        self.journal.lock().unwrap().stores.push(path);
        Ok(UnoValue::Void)
    }

    fn arg(&mut self, body: &mut Bytes, ty: &Type) -> UnoValue {
        marshal::get_value(body, ty, &mut self.reader.tables).expect("well-formed argument")
    }

    /// A `[]PropertyValue` argument as (name, value) pairs.
    fn properties(&mut self, body: &mut Bytes) -> Vec<(String, UnoValue)> {
        let ty = interface::STORE_TO_URL.params[1].to_type();
        match self.arg(body, &ty) {
            UnoValue::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    UnoValue::Struct(mut fields) => {
                        let value = match fields.swap_remove(2) {
                            UnoValue::Any(any) => any.value,
                            other => other,
                        };
                        (fields[0].as_str().unwrap_or_default().to_string(), value)
                    }
                    other => panic!("expected PropertyValue, got {other:?}"),
                })
                .collect(),
            other => panic!("expected property sequence, got {other:?}"),
        }
    }
}

fn sheet_index(oid: &str) -> Option<usize> {
    oid.strip_prefix("sheet-")?.parse().ok()
}

fn exc(type_name: &str, message: &str) -> UnoException {
    UnoException::new(type_name, message)
}
