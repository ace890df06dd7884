// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-token: the HMAC keyring and the opaque state/ack token codec built
//! on top of it.

pub mod codec;
pub mod error;
pub mod keyring;

pub use codec::{
    decode_ack_token, decode_state_token, encode_ack_token, encode_state_token, AckTokenPayload,
    StateTokenPayload,
};
pub use error::{Bech32mErrorKind, KeyringError, TokenError};
pub use keyring::Keyring;
