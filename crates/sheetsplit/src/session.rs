//! The connection to a running office process.

use sheetsplit_urp::{UnoProxy, UrpConnection};

use crate::config::SessionConfig;
use crate::error::{ConvertError, Result};

/// A connected, bootstrapped URP session.
///
/// There is no disconnected state: a failed [`OfficeSession::connect`]
/// yields no session, and every remote operation borrows the session
/// mutably, so calls cannot interleave.
pub struct OfficeSession {
    conn: UrpConnection,
    desktop: UnoProxy,
    host: String,
    port: u16,
}

impl OfficeSession {
    /// Connect once (no retry), negotiate, and resolve the Desktop.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let failed = |source| ConvertError::Connection {
            host: config.host.clone(),
            port: config.port,
            source,
        };

        let mut conn = UrpConnection::connect(&config.host, config.port, config.connect_timeout)
            .await
            .map_err(failed)?;
        let boot = conn.bootstrap().await.map_err(failed)?;

        Ok(Self {
            conn,
            desktop: boot.desktop,
            host: config.host.clone(),
            port: config.port,
        })
    }

    /// `host:port` of the office process.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The Desktop as `XComponentLoader`.
    pub(crate) fn desktop(&self) -> &UnoProxy {
        &self.desktop
    }

    pub(crate) fn conn(&mut self) -> &mut UrpConnection {
        &mut self.conn
    }

    /// Close the socket. Dropping the session does the same without
    /// flushing.
    pub async fn disconnect(self) {
        let endpoint = self.endpoint();
        if let Err(e) = self.conn.disconnect().await {
            tracing::debug!("shutdown of {endpoint} failed: {e}");
        }
        tracing::debug!("disconnected from {endpoint}");
    }
}
