//! Session record, field cipher and wire codec

mod cipher;
mod codec;
mod state;

pub use cipher::{AesGcmCipher, FieldCipher, KEY_SIZE};
pub use codec::SessionCodec;
pub use state::{Session, email_local_part};
