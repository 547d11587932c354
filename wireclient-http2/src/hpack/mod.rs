//! A from-scratch, minimal HPACK implementation (RFC 7541): the static
//! table, a bounded dynamic table, and encode/decode for the literal and
//! indexed representations. See the `TODO` in `decoder` for the one gap
//! (Huffman-coded string literals).

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod integer;
pub mod static_table;

pub use decoder::HpackDecoder;
pub use encoder::HpackEncoder;
