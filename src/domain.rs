pub mod call_spec;
#[cfg(feature = "dblib")]
pub mod c_binds;
pub mod native_value;
