//! AWS KMS P-256 (secp256r1) signing adapter for vault custody keys.
//!
//! Independent of the BLS fast path (§4.6); exercised only by `keys onboard`
//! (§6). Port of the DER<->compact ECDSA plumbing the source hand-rolls
//! instead of pulling an ASN.1 crate, since we only ever see the SEQUENCE
//! shapes KMS itself emits.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};

use crate::errors::GreenFloorError;

/// Extract (x, y) 32-byte coordinates from a SubjectPublicKeyInfo DER blob.
/// The uncompressed point is `0x04 || x(32) || y(32)`, embedded as a BIT
/// STRING inside the SPKI SEQUENCE.
pub fn extract_p256_xy_from_spki(der: &[u8]) -> Result<([u8; 32], [u8; 32]), GreenFloorError> {
    let (mut idx, _) = read_der_tag_length(der, 0)?;
    let (next_idx, algo_len) = read_der_tag_length(der, idx)?;
    idx = next_idx + algo_len;

    if der.get(idx).copied() != Some(0x03) {
        return Err(GreenFloorError::invalid("spki", "expected_bit_string_tag"));
    }
    let (idx, bs_len) = read_der_tag_length(der, idx)?;
    if der.get(idx).copied() != Some(0x00) {
        return Err(GreenFloorError::invalid("spki", "unexpected_unused_bits_byte"));
    }
    let point = der
        .get(idx + 1..idx + bs_len)
        .ok_or_else(|| GreenFloorError::invalid("spki", "truncated_bit_string"))?;
    if point.len() != 65 || point[0] != 0x04 {
        return Err(GreenFloorError::invalid("spki", "expected_uncompressed_point"));
    }
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&point[1..33]);
    y.copy_from_slice(&point[33..65]);
    Ok((x, y))
}

/// Compress an uncompressed SPKI public key into the 33-byte
/// `02|03 || x` form, prefix chosen by the parity of `y`.
pub fn compress_from_spki(der: &[u8]) -> Result<[u8; 33], GreenFloorError> {
    let (x, y) = extract_p256_xy_from_spki(der)?;
    Ok(compress(&x, &y))
}

pub fn compress(x: &[u8; 32], y: &[u8; 32]) -> [u8; 33] {
    let prefix = if y[31] % 2 == 0 { 0x02 } else { 0x03 };
    let mut out = [0u8; 33];
    out[0] = prefix;
    out[1..].copy_from_slice(x);
    out
}

/// Recover `(x, y)` from a 33-byte compressed point.
pub fn decompress(compressed: &[u8; 33]) -> Result<([u8; 32], [u8; 32]), GreenFloorError> {
    let point = p256::EncodedPoint::from_bytes(compressed)
        .map_err(|_| GreenFloorError::invalid("compressed_point", "not_on_curve"))?;
    let affine: p256::AffinePoint = Option::from(p256::elliptic_curve::sec1::FromEncodedPoint::from_encoded_point(&point))
        .ok_or_else(|| GreenFloorError::invalid("compressed_point", "not_on_curve"))?;
    let uncompressed = affine.to_encoded_point(false);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(uncompressed.x().ok_or(GreenFloorError::invalid("compressed_point", "no_x"))?);
    y.copy_from_slice(uncompressed.y().ok_or(GreenFloorError::invalid("compressed_point", "no_y"))?);
    Ok((x, y))
}

/// Sign `sha256(message)` with an in-memory P-256 signing key, returning
/// compact `r||s` (64 bytes). The real KMS path hands the digest to
/// `kms:Sign(ECDSA_SHA_256, DIGEST)`; the local `SigningKey` path used by
/// tests and dry runs performs the same digest-then-sign sequence.
pub fn sign_digest_compact(signing_key: &SigningKey, message: &[u8]) -> [u8; 64] {
    let digest = Sha256::digest(message);
    let signature: Signature = signing_key.sign(&digest);
    let (r, s) = signature.split_bytes();
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r);
    compact[32..].copy_from_slice(&s);
    compact
}

/// Parse a DER-encoded ECDSA signature (`SEQUENCE { INTEGER r, INTEGER s }`)
/// into compact `r||s`, right-padding each to 32 bytes and stripping DER's
/// sign-padding leading zero byte.
pub fn der_to_compact(der: &[u8]) -> Result<[u8; 64], GreenFloorError> {
    let (idx, _) = read_der_tag_length(der, 0)?;
    let (r, idx) = read_der_integer(der, idx)?;
    let (s, _) = read_der_integer(der, idx)?;
    let mut compact = [0u8; 64];
    pad_into(&mut compact[..32], &r)?;
    pad_into(&mut compact[32..], &s)?;
    Ok(compact)
}

/// Re-encode compact `r||s` as DER, inverse of [`der_to_compact`].
pub fn compact_to_der(compact: &[u8; 64]) -> Vec<u8> {
    let r = strip_leading_zeros(&compact[..32]);
    let s = strip_leading_zeros(&compact[32..]);
    let r_enc = encode_der_integer(r);
    let s_enc = encode_der_integer(s);
    let body_len = r_enc.len() + s_enc.len();
    let mut out = Vec::with_capacity(body_len + 4);
    out.push(0x30);
    encode_der_length(&mut out, body_len);
    out.extend_from_slice(&r_enc);
    out.extend_from_slice(&s_enc);
    out
}

fn pad_into(dst: &mut [u8], src: &[u8]) -> Result<(), GreenFloorError> {
    if src.len() > dst.len() {
        return Err(GreenFloorError::invalid("ecdsa_signature", "component_too_long"));
    }
    let offset = dst.len() - src.len();
    dst[offset..].copy_from_slice(src);
    Ok(())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i + 1 < bytes.len() && bytes[i] == 0 {
        i += 1;
    }
    &bytes[i..]
}

fn encode_der_integer(value: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    if value.is_empty() || value[0] & 0x80 != 0 {
        body.push(0x00);
    }
    body.extend_from_slice(value);
    let mut out = vec![0x02];
    encode_der_length(&mut out, body.len());
    out.extend_from_slice(&body);
    out
}

fn encode_der_length(out: &mut Vec<u8>, length: usize) {
    if length < 0x80 {
        out.push(length as u8);
    } else {
        let bytes = length.to_be_bytes();
        let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
}

fn read_der_tag_length(data: &[u8], offset: usize) -> Result<(usize, usize), GreenFloorError> {
    let mut offset = offset + 1;
    let first = *data
        .get(offset)
        .ok_or_else(|| GreenFloorError::invalid("der", "truncated"))?;
    if first & 0x80 == 0 {
        return Ok((offset + 1, first as usize));
    }
    let num_len_bytes = (first & 0x7f) as usize;
    offset += 1;
    let len_bytes = data
        .get(offset..offset + num_len_bytes)
        .ok_or_else(|| GreenFloorError::invalid("der", "truncated"))?;
    let mut length = 0usize;
    for b in len_bytes {
        length = (length << 8) | *b as usize;
    }
    Ok((offset + num_len_bytes, length))
}

fn read_der_integer(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize), GreenFloorError> {
    if data.get(offset).copied() != Some(0x02) {
        return Err(GreenFloorError::invalid("der", "expected_integer_tag"));
    }
    let (offset, length) = read_der_tag_length(data, offset)?;
    let mut raw = data
        .get(offset..offset + length)
        .ok_or_else(|| GreenFloorError::invalid("der", "truncated"))?
        .to_vec();
    if raw.len() > 1 && raw[0] == 0x00 {
        raw.remove(0);
    }
    Ok((raw, offset + length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn der_compact_round_trip() {
        let signing_key = SigningKey::random(&mut rand::rng());
        let compact = sign_digest_compact(&signing_key, b"hello world");
        let der = compact_to_der(&compact);
        let recovered = der_to_compact(&der).unwrap();
        assert_eq!(compact, recovered);
    }

    #[test]
    fn compressed_point_round_trip() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let encoded = verifying_key.to_encoded_point(true);
        let compressed: [u8; 33] = encoded.as_bytes().try_into().unwrap();
        let (x, y) = decompress(&compressed).unwrap();
        let recompressed = compress(&x, &y);
        assert_eq!(compressed, recompressed);
    }
}
