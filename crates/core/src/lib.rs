pub mod config;
pub mod domain;
pub mod errors;
pub mod reference;
pub mod stream;

pub use domain::cart::{CartContents, CartLine};
pub use domain::product::{Product, ProductId, ReferenceSet};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use reference::resolver::{resolve_many, resolve_single};
pub use reference::store::{ReferenceSnapshot, ReferenceStore};
pub use stream::decoder::{DecodeState, DecodedMessage, StreamDecoder};
pub use stream::envelope::{
    normalize_reply, parse_envelope, strip_code_fence, CartPayload, ComparisonPayload,
    MessageEnvelope, ProductsPayload, TextPayload,
};
