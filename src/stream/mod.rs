//! Line-oriented data-stream protocol spoken between the chat proxy and the
//! site's assistant widget.
//!
//! Every line is `<tag>:<json>\n`. Text deltas use tag `0` with a JSON string
//! literal payload, so fragments may carry newlines and quotes safely.

pub mod decoder;
pub mod protocol;

pub use decoder::{ DecodedFragment, FragmentDecoder };
pub use protocol::{ FinishReason, StreamPart, encode_token_stream };

pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const PROTOCOL_HEADER: &str = "x-vercel-ai-data-stream";
pub const PROTOCOL_VERSION: &str = "v1";
