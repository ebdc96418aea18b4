//! Session wire formats
//!
//! Plain: `email:<email> user:<user>`, used without a cipher or before an
//! access token exists.
//!
//! Encrypted: `email|user|access_token|id_token|expires_unix|refresh_token`,
//! each non-empty text field encrypted on its own. The expiry stays plain
//! decimal seconds, `0` for none. Zero or negative values read back as no
//! expiry, which covers cookies that stored the zero time as
//! `-62135596800`. `created_at`, `groups` and
//! `introspect_claims` are not carried by either format.

use std::time::{Duration, UNIX_EPOCH};

use super::cipher::FieldCipher;
use super::state::{Session, email_local_part};
use crate::constants::{ENCRYPTED_FIELD_COUNT, ENCRYPTED_SEPARATOR, PLAIN_SEPARATOR};
use crate::{Error, Result};

/// Session serializer; stateless, all behaviour is in associated functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCodec;

impl SessionCodec {
    pub fn encode(session: &Session, cipher: Option<&dyn FieldCipher>) -> Result<String> {
        match cipher {
            Some(cipher) if !session.access_token.is_empty() => {
                Self::encode_encrypted(session, cipher)
            }
            _ => Ok(session.account_info()),
        }
    }

    pub fn decode(value: &str, cipher: Option<&dyn FieldCipher>) -> Result<Session> {
        match cipher {
            Some(cipher) if value.contains(ENCRYPTED_SEPARATOR) => {
                Self::decode_encrypted(value, cipher)
            }
            _ => Self::decode_plain(value),
        }
    }

    fn encode_encrypted(session: &Session, cipher: &dyn FieldCipher) -> Result<String> {
        let seal = |field: &str| -> Result<String> {
            if field.is_empty() {
                Ok(String::new())
            } else {
                cipher.encrypt(field)
            }
        };

        let fields = [
            seal(&session.email)?,
            seal(session.user_or_default())?,
            seal(&session.access_token)?,
            seal(&session.id_token)?,
            session.expires_on_unix().to_string(),
            seal(&session.refresh_token)?,
        ];
        let separator = ENCRYPTED_SEPARATOR.to_string();
        Ok(fields.join(separator.as_str()))
    }

    fn decode_encrypted(value: &str, cipher: &dyn FieldCipher) -> Result<Session> {
        let chunks: Vec<&str> = value.split(ENCRYPTED_SEPARATOR).collect();
        if chunks.len() != ENCRYPTED_FIELD_COUNT {
            return Err(Error::codec(format!(
                "invalid number of fields (got {} expected {ENCRYPTED_FIELD_COUNT})",
                chunks.len()
            )));
        }

        let open = |chunk: &str| -> Result<String> {
            if chunk.is_empty() {
                Ok(String::new())
            } else {
                cipher.decrypt(chunk)
            }
        };

        let expires_on = match chunks[4] {
            "" => None,
            ts => {
                let secs: i64 = ts
                    .parse()
                    .map_err(|_| Error::codec(format!("invalid expiry timestamp {ts:?}")))?;
                u64::try_from(secs)
                    .ok()
                    .filter(|&secs| secs > 0)
                    .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
            }
        };

        Ok(Session {
            email: open(chunks[0])?,
            user: open(chunks[1])?,
            access_token: open(chunks[2])?,
            id_token: open(chunks[3])?,
            expires_on,
            refresh_token: open(chunks[5])?,
            ..Session::default()
        })
    }

    fn decode_plain(value: &str) -> Result<Session> {
        let chunks: Vec<&str> = value.split(PLAIN_SEPARATOR).collect();
        let [email, user] = *chunks.as_slice() else {
            return Err(Error::codec(format!(
                "expected 2 chunks got {}",
                chunks.len()
            )));
        };

        let email = email.strip_prefix("email:").unwrap_or(email);
        let user = user.strip_prefix("user:").unwrap_or(user);
        let user = if user.is_empty() {
            email_local_part(email)
        } else {
            user
        };

        Ok(Session::with_identity(email, user))
    }
}
