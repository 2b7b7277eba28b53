//! Cipher/auth policy recognized by this crate. `Null`/`Twofish*`/`Skein`
//! exist only so a remote-negotiated crypto suite naming one of them is
//! recognized and rejected with a clear error rather than silently
//! mismatching bytes.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Null,
    AesCm128,
    AesCm192,
    AesCm256,
    AesF8,
    TwofishCm,
    TwofishF8,
}

impl CipherKind {
    pub fn key_len(self) -> usize {
        match self {
            CipherKind::Null => 0,
            CipherKind::AesCm128 | CipherKind::AesF8 => 16,
            CipherKind::AesCm192 => 24,
            CipherKind::AesCm256 => 32,
            CipherKind::TwofishCm | CipherKind::TwofishF8 => 16,
        }
    }

    pub const fn salt_len(self) -> usize {
        14
    }

    pub fn check_supported(self) -> Result<()> {
        match self {
            CipherKind::Null | CipherKind::TwofishCm | CipherKind::TwofishF8 => Err(Error::UnsupportedCipher),
            _ => Ok(()),
        }
    }

    pub fn is_f8(self) -> bool {
        matches!(self, CipherKind::AesF8 | CipherKind::TwofishF8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Null,
    HmacSha1,
    Skein,
}

impl AuthKind {
    pub fn check_supported(self) -> Result<()> {
        match self {
            AuthKind::Null | AuthKind::Skein => Err(Error::UnsupportedAuth),
            AuthKind::HmacSha1 => Ok(()),
        }
    }
}
