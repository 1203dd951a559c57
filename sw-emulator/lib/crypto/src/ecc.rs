/*++

Licensed under the Apache-2.0 license.

File Name:

    ecc.rs

Abstract:

    File contains the NIST prime curve operations used for key creation and
    Diffie-Hellman: P-256 and P-384.

--*/

use crate::CryptoError;
use rand::{CryptoRng, RngCore};

/// Short Weierstrass prime curve
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EccCurve {
    P256,
    P384,
}

impl EccCurve {
    /// Curve whose scalars are `size` bytes wide.
    pub fn from_scalar_size(size: usize) -> Option<Self> {
        match size {
            32 => Some(EccCurve::P256),
            48 => Some(EccCurve::P384),
            _ => None,
        }
    }

    pub fn scalar_size(self) -> usize {
        match self {
            EccCurve::P256 => 32,
            EccCurve::P384 => 48,
        }
    }
}

/// Key pair with big-endian private scalar and public point `X || Y`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EccKeyPair {
    pub private: Vec<u8>,
    pub public: Vec<u8>,
}

macro_rules! curve_ops {
    ($module:ident, $krate:ident) => {
        mod $module {
            use super::{CryptoError, EccKeyPair};
            use rand::{CryptoRng, RngCore};
            use $krate::elliptic_curve::generic_array::GenericArray;
            use $krate::elliptic_curve::group::Curve;
            use $krate::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
            use $krate::{EncodedPoint, PublicKey, SecretKey};

            fn to_xy(point: &EncodedPoint) -> Result<Vec<u8>, CryptoError> {
                let x = point.x().ok_or(CryptoError::InvalidKey)?;
                let y = point.y().ok_or(CryptoError::InvalidKey)?;
                Ok([x.as_slice(), y.as_slice()].concat())
            }

            fn secret(private: &[u8]) -> Result<SecretKey, CryptoError> {
                SecretKey::from_be_bytes(private).map_err(|_| CryptoError::InvalidKey)
            }

            fn public(xy: &[u8]) -> Result<PublicKey, CryptoError> {
                let (x, y) = xy.split_at(xy.len() / 2);
                let point = EncodedPoint::from_affine_coordinates(
                    GenericArray::from_slice(x),
                    GenericArray::from_slice(y),
                    false,
                );
                Option::from(PublicKey::from_encoded_point(&point)).ok_or(CryptoError::InvalidKey)
            }

            pub fn generate(rng: &mut (impl CryptoRng + RngCore)) -> Result<EccKeyPair, CryptoError> {
                let secret = SecretKey::random(rng);
                Ok(EccKeyPair {
                    private: secret.to_be_bytes().to_vec(),
                    public: to_xy(&secret.public_key().to_encoded_point(false))?,
                })
            }

            pub fn public_key(private: &[u8]) -> Result<Vec<u8>, CryptoError> {
                to_xy(&secret(private)?.public_key().to_encoded_point(false))
            }

            pub fn shared_point(private: &[u8], peer: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let scalar = secret(private)?.to_nonzero_scalar();
                let point = (public(peer)?.to_projective() * *scalar).to_affine();
                to_xy(&point.to_encoded_point(false))
            }
        }
    };
}

curve_ops!(nist_p256, p256);
curve_ops!(nist_p384, p384);

pub enum Ecc {}

impl Ecc {
    /// Generate a fresh key pair.
    pub fn generate(
        curve: EccCurve,
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<EccKeyPair, CryptoError> {
        match curve {
            EccCurve::P256 => nist_p256::generate(rng),
            EccCurve::P384 => nist_p384::generate(rng),
        }
    }

    /// Public point `X || Y` of a private scalar.
    pub fn public_key(curve: EccCurve, private: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Self::check_len(private, curve.scalar_size())?;
        match curve {
            EccCurve::P256 => nist_p256::public_key(private),
            EccCurve::P384 => nist_p384::public_key(private),
        }
    }

    /// Diffie-Hellman: the full shared point `X || Y` of `private * peer`.
    pub fn shared_point(
        curve: EccCurve,
        private: &[u8],
        peer: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Self::check_len(private, curve.scalar_size())?;
        Self::check_len(peer, 2 * curve.scalar_size())?;
        match curve {
            EccCurve::P256 => nist_p256::shared_point(private, peer),
            EccCurve::P384 => nist_p384::shared_point(private, peer),
        }
    }

    fn check_len(data: &[u8], expected: usize) -> Result<(), CryptoError> {
        if data.len() != expected {
            Err(CryptoError::InvalidKeyLength(data.len()))?
        }
        Ok(())
    }
}
