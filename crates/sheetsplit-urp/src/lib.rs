//! Client side of the UNO Remote Protocol (URP), the binary protocol an
//! office process speaks when started with a socket acceptor:
//!
//! ```text
//! soffice --headless "--accept=socket,host=localhost,port=2002;urp;"
//! ```
//!
//! # Layers
//!
//! - [`transport`]: block framing over a byte stream
//! - [`marshal`]: UNO values on the wire
//! - [`protocol`]: request and reply headers with their caches
//!
//! [`UrpConnection`] sits on top: it negotiates protocol properties,
//! resolves the Desktop, and issues calls against [`UnoProxy`] handles
//! using the method tables in [`interface`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use sheetsplit_urp::UrpConnection;
//!
//! # async fn example() -> sheetsplit_urp::Result<()> {
//! let mut conn = UrpConnection::connect("localhost", 2002, Duration::from_secs(10)).await?;
//! let boot = conn.bootstrap().await?;
//! println!("desktop is {}", boot.desktop.oid);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod connection;
pub mod error;
pub mod interface;
pub mod marshal;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod types;

pub use connection::{Bootstrap, UrpConnection};
pub use error::{Result, UrpError};
pub use proxy::UnoProxy;
pub use types::{type_names, Type, UnoException, UnoValue};
