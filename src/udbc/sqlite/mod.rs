pub mod connection;
pub mod pool;
pub(crate) mod value_codec;
