//! File-backed arrays and the codecs that read and write them.

pub mod array;
pub mod arrayset;
pub mod binary;
pub mod codec;
pub mod mat;
pub mod t3binary;

pub use array::Array;
pub use arrayset::Arrayset;
pub use codec::{ArraysetCodec, Codec, CodecRegistry};
