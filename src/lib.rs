pub mod error;
pub mod io_stream;
pub mod datetime;
pub mod superblock;
pub mod frame;
pub mod message;
pub mod chain;
pub mod content;
pub mod render;
pub mod sqi;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod fixture;

pub use error::{ErrorKind, Result, SquishError};
pub use io_stream::ByteSource;
pub use superblock::{decode_header, MessageBaseHeader};
pub use frame::{decode_frame, Frame, FrameKind};
pub use message::{decode_message_record, MessageRecord, NetAddress};
pub use chain::{BoundsPolicy, ChainEntry, FrameChain, Link};
pub use content::{segment, BodyLines, ControlBlock, ControlEntry, ControlKey};
pub use render::dump::DumpOptions;
pub use render::mbox::{MboxExporter, MboxOptions};
