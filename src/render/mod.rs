//! Output renderers over the decoded message base.
//!
//! | Renderer | Chain walked | Bounds |
//! |----------|--------------|--------|
//! | [`csv`]  | live, newest → oldest | trusting |
//! | [`mbox`] | live, oldest → newest, stops at first non-Normal frame | trusting |
//! | [`dump`] | live then free, oldest → newest | strict |

pub mod csv;
pub mod dump;
pub mod mbox;

use serde::Serializer;

/// Serialize raw message-base text as a (lossy) UTF-8 string.
pub fn lossy<T: AsRef<[u8]>, S: Serializer>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes.as_ref()))
}
