//! Error-checked wrappers over the Sybase client functions.
//!
//! Each Sybase function reports failure by returning `false`. The wrappers in
//! [`Sybase`] call the native function, turn that `false` into
//! [`SybaseError::NativeCallFailed`] carrying the last error text recorded by
//! the native layer, and hand back every other value untouched.
//!
//! The native layer is anything implementing [`NativeExtension`]. With the
//! `dblib` feature enabled, [`DbLibExtension`] provides one on top of FreeTDS
//! DB-Library.
//!
//! ```no_run
//! # #[cfg(feature = "dblib")]
//! # fn main() -> sybase_rust::errors::Result<()> {
//! use sybase_rust::{DbLibExtension, Sybase};
//!
//! let mut sybase = Sybase::new(DbLibExtension::from_env()?);
//! let link = sybase.connect(Some("MYSERVER"), Some("sa"), Some("secret"), None, None, None)?;
//! sybase.select_db("pubs2", link.as_link())?;
//! let result = sybase.query("select au_id, au_lname from authors", link.as_link())?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "dblib"))]
//! # fn main() {}
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
#[cfg(feature = "dblib")]
pub mod dblib;
pub mod domain;
pub mod errors;
pub mod last_error;
pub mod result_set;

pub use adapter::{invoke, NativeExtension};
pub use config::DbLibConfig;
pub use connection::Sybase;
#[cfg(feature = "dblib")]
pub use dblib::DbLibExtension;
pub use domain::call_spec::{CallSpec, Slot};
pub use domain::native_value::{
    LinkId, MessageHandler, NativeFunction, NativeValue, ResultId, Sentinel, ServerMessage,
};
pub use errors::SybaseError;
pub use last_error::{LastErrorSource, ProcessLastError};
pub use result_set::{Cell, ColumnMetadata, ResultSet};
