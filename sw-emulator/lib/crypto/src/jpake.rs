/*++

Licensed under the Apache-2.0 license.

File Name:

    jpake.rs

Abstract:

    File contains EC-JPAKE password authenticated key exchange over NIST
    P-256 with SHA-256 Schnorr proofs. Points travel as `X || Y`, scalars
    as 32 big-endian bytes and proofs as `V || r`.

--*/

use crate::CryptoError;
use p256::elliptic_curve::bigint::U256;
use p256::elliptic_curve::generic_array::GenericArray;
use p256::elliptic_curve::group::{Curve, Group};
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::{ff::PrimeField, Field};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NonZeroScalar, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

pub const JPAKE_SCALAR_SIZE: usize = 32;
pub const JPAKE_POINT_SIZE: usize = 2 * JPAKE_SCALAR_SIZE;
pub const JPAKE_PROOF_SIZE: usize = JPAKE_POINT_SIZE + JPAKE_SCALAR_SIZE;
pub const JPAKE_SESSION_KEY_SIZE: usize = 32;

const ROUND1_LABELS: [&str; 2] = ["JPAKE-X1", "JPAKE-X2"];
const ROUND2_LABEL: &str = "JPAKE-Round2";

/// Round one output of one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpakeRound1 {
    /// Second ephemeral scalar, kept by the caller for the later rounds
    pub secret: [u8; JPAKE_SCALAR_SIZE],
    pub point1: [u8; JPAKE_POINT_SIZE],
    pub proof1: [u8; JPAKE_PROOF_SIZE],
    pub point2: [u8; JPAKE_POINT_SIZE],
    pub proof2: [u8; JPAKE_PROOF_SIZE],
}

/// Round two output of one party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpakeRound2 {
    pub point: [u8; JPAKE_POINT_SIZE],
    pub proof: [u8; JPAKE_PROOF_SIZE],
}

fn decode_point(xy: &[u8]) -> Result<ProjectivePoint, CryptoError> {
    if xy.len() != JPAKE_POINT_SIZE {
        Err(CryptoError::InvalidKeyLength(xy.len()))?
    }
    let (x, y) = xy.split_at(JPAKE_SCALAR_SIZE);
    let encoded = EncodedPoint::from_affine_coordinates(
        GenericArray::from_slice(x),
        GenericArray::from_slice(y),
        false,
    );
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(CryptoError::InvalidKey)?;
    Ok(ProjectivePoint::from(affine))
}

fn encode_point(point: &ProjectivePoint) -> Result<[u8; JPAKE_POINT_SIZE], CryptoError> {
    let encoded = point.to_affine().to_encoded_point(false);
    let x = encoded.x().ok_or(CryptoError::InvalidKey)?;
    let y = encoded.y().ok_or(CryptoError::InvalidKey)?;
    let mut xy = [0u8; JPAKE_POINT_SIZE];
    xy[..JPAKE_SCALAR_SIZE].copy_from_slice(x);
    xy[JPAKE_SCALAR_SIZE..].copy_from_slice(y);
    Ok(xy)
}

fn decode_scalar(bytes: &[u8]) -> Result<Scalar, CryptoError> {
    if bytes.len() != JPAKE_SCALAR_SIZE {
        Err(CryptoError::InvalidKeyLength(bytes.len()))?
    }
    Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
        .ok_or(CryptoError::InvalidKey)
}

/// Nonzero scalar below the group order.
fn decode_secret(bytes: &[u8]) -> Result<Scalar, CryptoError> {
    let scalar = decode_scalar(bytes)?;
    if bool::from(scalar.is_zero()) {
        Err(CryptoError::InvalidKey)?
    }
    Ok(scalar)
}

fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(*part);
    }
    <Scalar as Reduce<U256>>::from_be_bytes_reduced(hasher.finalize())
}

/// `H(password) mod n`, with zero replaced by one.
fn password_scalar(password: &[u8]) -> Scalar {
    let scalar = hash_to_scalar(&[password]);
    if bool::from(scalar.is_zero()) {
        Scalar::one()
    } else {
        scalar
    }
}

fn challenge(
    base: &ProjectivePoint,
    commitment: &ProjectivePoint,
    public: &ProjectivePoint,
    user_id: &[u8],
    label: &str,
) -> Result<Scalar, CryptoError> {
    Ok(hash_to_scalar(&[
        &encode_point(base)?[..],
        &encode_point(commitment)?[..],
        &encode_point(public)?[..],
        user_id,
        label.as_bytes(),
    ]))
}

/// Schnorr proof of `secret` with `public = base * secret`.
fn prove(
    base: &ProjectivePoint,
    secret: &Scalar,
    public: &ProjectivePoint,
    user_id: &[u8],
    label: &str,
    rng: &mut (impl CryptoRng + RngCore),
) -> Result<[u8; JPAKE_PROOF_SIZE], CryptoError> {
    let v = *NonZeroScalar::random(rng);
    let commitment = *base * v;
    let c = challenge(base, &commitment, public, user_id, label)?;
    let r = v - c * *secret;

    let mut proof = [0u8; JPAKE_PROOF_SIZE];
    proof[..JPAKE_POINT_SIZE].copy_from_slice(&encode_point(&commitment)?);
    proof[JPAKE_POINT_SIZE..].copy_from_slice(&r.to_repr());
    Ok(proof)
}

fn verify(
    base: &ProjectivePoint,
    public: &ProjectivePoint,
    proof: &[u8],
    user_id: &[u8],
    label: &str,
) -> Result<(), CryptoError> {
    if proof.len() != JPAKE_PROOF_SIZE {
        Err(CryptoError::InvalidDataLength(proof.len()))?
    }
    let commitment = decode_point(&proof[..JPAKE_POINT_SIZE])?;
    let r = decode_scalar(&proof[JPAKE_POINT_SIZE..])?;
    let c = challenge(base, &commitment, public, user_id, label)?;
    if *base * r + *public * c != commitment {
        Err(CryptoError::InvalidProof)?
    }
    Ok(())
}

/// Sum of points that must not cancel out.
fn combine(points: &[&[u8]]) -> Result<ProjectivePoint, CryptoError> {
    let mut sum = ProjectivePoint::identity();
    for point in points {
        sum += decode_point(point)?;
    }
    if bool::from(sum.is_identity()) {
        Err(CryptoError::InvalidKey)?
    }
    Ok(sum)
}

pub enum EcJpake {}

impl EcJpake {
    /// Draw the two ephemeral key pairs of round one and prove knowledge of
    /// both scalars under `user_id`.
    pub fn round1(
        user_id: &[u8],
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<JpakeRound1, CryptoError> {
        let generator = ProjectivePoint::generator();
        let x1 = *NonZeroScalar::random(&mut *rng);
        let x2 = *NonZeroScalar::random(&mut *rng);
        let point1 = generator * x1;
        let point2 = generator * x2;

        let mut secret = [0u8; JPAKE_SCALAR_SIZE];
        secret.copy_from_slice(&x2.to_repr());
        Ok(JpakeRound1 {
            secret,
            point1: encode_point(&point1)?,
            proof1: prove(&generator, &x1, &point1, user_id, ROUND1_LABELS[0], rng)?,
            point2: encode_point(&point2)?,
            proof2: prove(&generator, &x2, &point2, user_id, ROUND1_LABELS[1], rng)?,
        })
    }

    /// Check the peer's round one points and proofs.
    ///
    /// # Error
    ///
    /// * `CryptoError::InvalidKey` - A point is off the curve or both points are equal
    /// * `CryptoError::InvalidProof` - A proof does not verify
    pub fn verify_round1(
        peer_id: &[u8],
        point3: &[u8],
        proof3: &[u8],
        point4: &[u8],
        proof4: &[u8],
    ) -> Result<(), CryptoError> {
        let x3 = decode_point(point3)?;
        let x4 = decode_point(point4)?;
        if x3 == x4 {
            Err(CryptoError::InvalidKey)?
        }
        let generator = ProjectivePoint::generator();
        verify(&generator, &x3, proof3, peer_id, ROUND1_LABELS[0])?;
        verify(&generator, &x4, proof4, peer_id, ROUND1_LABELS[1])
    }

    /// Round two: `A = (X1 + X3 + X4) * x2 * s` with its proof, where `s`
    /// is derived from the shared password.
    pub fn round2(
        user_id: &[u8],
        password: &[u8],
        secret: &[u8],
        point1: &[u8],
        point3: &[u8],
        point4: &[u8],
        rng: &mut (impl CryptoRng + RngCore),
    ) -> Result<JpakeRound2, CryptoError> {
        let x2 = decode_secret(secret)?;
        let base = combine(&[point1, point3, point4])?;
        let exponent = x2 * password_scalar(password);
        let point = base * exponent;
        Ok(JpakeRound2 {
            point: encode_point(&point)?,
            proof: prove(&base, &exponent, &point, user_id, ROUND2_LABEL, rng)?,
        })
    }

    /// Check the peer's round two point `B` against the base it was built
    /// on, `X1 + X2 + X3` from this side's view.
    pub fn verify_round2(
        peer_id: &[u8],
        point1: &[u8],
        point2: &[u8],
        point3: &[u8],
        point_b: &[u8],
        proof: &[u8],
    ) -> Result<(), CryptoError> {
        let base = combine(&[point1, point2, point3])?;
        let b = decode_point(point_b)?;
        verify(&base, &b, proof, peer_id, ROUND2_LABEL)
    }

    /// Session key `SHA-256(x(K))` with `K = (B - X4 * x2 * s) * x2`.
    pub fn session_key(
        password: &[u8],
        secret: &[u8],
        point4: &[u8],
        point_b: &[u8],
    ) -> Result<[u8; JPAKE_SESSION_KEY_SIZE], CryptoError> {
        let x2 = decode_secret(secret)?;
        let x4 = decode_point(point4)?;
        let b = decode_point(point_b)?;
        let shared = (b - x4 * (x2 * password_scalar(password))) * x2;
        if bool::from(shared.is_identity()) {
            Err(CryptoError::InvalidKey)?
        }
        let xy = encode_point(&shared)?;
        let mut key = [0u8; JPAKE_SESSION_KEY_SIZE];
        key.copy_from_slice(&Sha256::digest(&xy[..JPAKE_SCALAR_SIZE]));
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Party {
        id: &'static [u8],
        round1: JpakeRound1,
    }

    fn party(id: &'static [u8]) -> Party {
        Party {
            id,
            round1: EcJpake::round1(id, &mut rand::thread_rng()).unwrap(),
        }
    }

    fn round2(me: &Party, peer: &Party, password: &[u8]) -> JpakeRound2 {
        EcJpake::round2(
            me.id,
            password,
            &me.round1.secret,
            &me.round1.point1,
            &peer.round1.point1,
            &peer.round1.point2,
            &mut rand::thread_rng(),
        )
        .unwrap()
    }

    fn exchange(client_password: &[u8], server_password: &[u8]) -> ([u8; 32], [u8; 32]) {
        let client = party(b"client");
        let server = party(b"server");
        for peer in [&client, &server] {
            EcJpake::verify_round1(
                peer.id,
                &peer.round1.point1,
                &peer.round1.proof1,
                &peer.round1.point2,
                &peer.round1.proof2,
            )
            .unwrap();
        }

        let client2 = round2(&client, &server, client_password);
        let server2 = round2(&server, &client, server_password);
        EcJpake::verify_round2(
            server.id,
            &client.round1.point1,
            &client.round1.point2,
            &server.round1.point1,
            &server2.point,
            &server2.proof,
        )
        .unwrap();
        EcJpake::verify_round2(
            client.id,
            &server.round1.point1,
            &server.round1.point2,
            &client.round1.point1,
            &client2.point,
            &client2.proof,
        )
        .unwrap();

        let client_key = EcJpake::session_key(
            client_password,
            &client.round1.secret,
            &server.round1.point2,
            &server2.point,
        )
        .unwrap();
        let server_key = EcJpake::session_key(
            server_password,
            &server.round1.secret,
            &client.round1.point2,
            &client2.point,
        )
        .unwrap();
        (client_key, server_key)
    }

    #[test]
    fn test_shared_password_agrees() {
        let (client, server) = exchange(b"threadjpaketest", b"threadjpaketest");
        assert_eq!(client, server);
        assert_ne!(client, [0; 32]);
    }

    #[test]
    fn test_password_mismatch_disagrees() {
        let (client, server) = exchange(b"threadjpaketest", b"threadjpaketesu");
        assert_ne!(client, server);
    }

    #[test]
    fn test_round1_proof_bound_to_identity() {
        let peer = party(b"server");
        let round1 = &peer.round1;
        assert_eq!(
            EcJpake::verify_round1(
                b"mallory",
                &round1.point1,
                &round1.proof1,
                &round1.point2,
                &round1.proof2
            ),
            Err(CryptoError::InvalidProof)
        );
        // proofs swapped between the two points
        assert_eq!(
            EcJpake::verify_round1(
                peer.id,
                &round1.point1,
                &round1.proof2,
                &round1.point2,
                &round1.proof1
            ),
            Err(CryptoError::InvalidProof)
        );
    }

    #[test]
    fn test_round1_rejects_bad_points() {
        let peer = party(b"server");
        let round1 = &peer.round1;
        assert_eq!(
            EcJpake::verify_round1(
                peer.id,
                &round1.point1,
                &round1.proof1,
                &round1.point1,
                &round1.proof1
            ),
            Err(CryptoError::InvalidKey)
        );
        assert_eq!(
            EcJpake::verify_round1(
                peer.id,
                &[1; 64],
                &round1.proof1,
                &round1.point2,
                &round1.proof2
            ),
            Err(CryptoError::InvalidKey)
        );
        assert_eq!(
            EcJpake::verify_round1(
                peer.id,
                &round1.point1,
                &round1.proof1[..95],
                &round1.point2,
                &round1.proof2
            ),
            Err(CryptoError::InvalidDataLength(95))
        );
    }

    #[test]
    fn test_round2_proof_tampered() {
        let client = party(b"client");
        let server = party(b"server");
        let mut client2 = round2(&client, &server, b"pw");
        client2.proof[95] ^= 1;
        assert_eq!(
            EcJpake::verify_round2(
                client.id,
                &server.round1.point1,
                &server.round1.point2,
                &client.round1.point1,
                &client2.point,
                &client2.proof,
            ),
            Err(CryptoError::InvalidProof)
        );
    }

    #[test]
    fn test_zero_secret_rejected() {
        let peer = party(b"server");
        assert_eq!(
            EcJpake::session_key(b"pw", &[0; 32], &peer.round1.point2, &peer.round1.point1),
            Err(CryptoError::InvalidKey)
        );
        assert_eq!(
            EcJpake::session_key(b"pw", &[1; 31], &peer.round1.point2, &peer.round1.point1),
            Err(CryptoError::InvalidKeyLength(31))
        );
    }
}
