//! Shared artifacts between the referee and the external processes.
//!
//! [`codec`] turns match state, queries and responses into text and back. [`store`] decides
//! where that text lives: files on disk for real runs, memory for tests. A match only ever
//! talks to its own store, so two matches can run side by side with two stores.

pub mod codec;
pub mod store;

pub use codec::{
    decode_coordinate_pair, decode_response_token, decode_snapshot, encode_query,
    encode_snapshot, CodecError, MoveQuery, Snapshot, VALID_TOKEN,
};
pub use store::{ExchangeStore, FileExchangeStore, MemoryExchangeStore};
