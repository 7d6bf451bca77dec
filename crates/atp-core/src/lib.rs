pub mod codec;
pub mod constants;
pub mod document;
pub mod error;
pub mod types;

pub use codec::{decode_document, encode_document, encode_for_signing, DocumentFormat};
pub use constants::*;
pub use document::*;
pub use error::{EngineError, EngineResult};
pub use types::*;
