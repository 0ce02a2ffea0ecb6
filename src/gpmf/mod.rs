//! GPMF parsing core: FourCC keys, the type system, cursor-based tree
//! traversal, annotation resolution and scaled sample extraction.

pub mod annotation;
pub mod fourcc;
pub mod gpmf;
pub mod scale;
pub mod stream;
pub mod timestamp;
pub mod value;

pub use fourcc::FourCC;
pub use gpmf::{Gpmf, Payload, PayloadFailure, RunReport};
pub use scale::ScaledData;
pub use stream::{Record, SearchMode, SearchScope, StreamCursor};
pub use timestamp::Timestamp;
pub use value::{Value, ValueType};
