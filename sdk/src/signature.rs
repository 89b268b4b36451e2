//! secp256k1 keys and recoverable signatures.

use {
    crate::hash::Hash,
    libsecp256k1::{Message, PublicKey, RecoveryId, SecretKey, Signature},
    std::fmt,
    thiserror::Error,
};

pub const PUBLIC_KEY_BYTES: usize = 33;
pub const SIGNATURE_BYTES: usize = 65;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SignatureError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("signature must be {SIGNATURE_BYTES} bytes but was {0}")]
    InvalidLength(usize),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("malformed signature")]
    Malformed,
    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// Compressed secp256k1 public key. Always a valid curve point.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ECPublicKey([u8; PUBLIC_KEY_BYTES]);

impl ECPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let bytes = <[u8; PUBLIC_KEY_BYTES]>::try_from(bytes)
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        PublicKey::parse_compressed(&bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_BYTES] {
        self.0
    }

    pub fn verify(&self, hash: &Hash, signature: &ECSignature) -> bool {
        let Ok(public_key) = PublicKey::parse_compressed(&self.0) else {
            return false;
        };
        let Ok(signature) = Signature::parse_standard(&signature.rs()) else {
            return false;
        };
        libsecp256k1::verify(&Message::parse(&hash.0), &signature, &public_key)
    }

    fn from_point(public_key: &PublicKey) -> Self {
        Self(public_key.serialize_compressed())
    }
}

impl AsRef<[u8]> for ECPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ECPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ECPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ECPublicKey({}..)", hex::encode(&self.0[..8]))
    }
}

/// Recoverable signature, `v || r || s` on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ECSignature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl ECSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_BYTES {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }
        let v = bytes[0];
        if v > 3 {
            return Err(SignatureError::InvalidRecoveryId(v));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[1..33]);
        s.copy_from_slice(&bytes[33..65]);
        Ok(Self { v, r, s })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_BYTES] {
        let mut bytes = [0u8; SIGNATURE_BYTES];
        bytes[0] = self.v;
        bytes[1..33].copy_from_slice(&self.r);
        bytes[33..65].copy_from_slice(&self.s);
        bytes
    }

    /// Recover the key that produced this signature over `hash`.
    pub fn recover(&self, hash: &Hash) -> Result<ECPublicKey, SignatureError> {
        let recovery_id =
            RecoveryId::parse(self.v).map_err(|_| SignatureError::InvalidRecoveryId(self.v))?;
        let signature =
            Signature::parse_standard(&self.rs()).map_err(|_| SignatureError::Malformed)?;
        let public_key = libsecp256k1::recover(&Message::parse(&hash.0), &signature, &recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;
        Ok(ECPublicKey::from_point(&public_key))
    }

    fn rs(&self) -> [u8; 64] {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r);
        rs[32..].copy_from_slice(&self.s);
        rs
    }
}

impl fmt::Debug for ECSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ECSignature({})", hex::encode(self.to_bytes()))
    }
}

pub struct ECKeyPair {
    secret: SecretKey,
    public: ECPublicKey,
}

impl ECKeyPair {
    /// Derive a key pair deterministically from `seed`.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut counter = 0u32;
        loop {
            let candidate = Hash::hashv(&[seed, &counter.to_be_bytes()]);
            if let Ok(secret) = SecretKey::parse(&candidate.0) {
                let public = ECPublicKey::from_point(&PublicKey::from_secret_key(&secret));
                return Self { secret, public };
            }
            counter = counter.wrapping_add(1);
        }
    }

    pub fn public_key(&self) -> ECPublicKey {
        self.public
    }

    pub fn sign(&self, hash: &Hash) -> ECSignature {
        let (signature, recovery_id) = libsecp256k1::sign(&Message::parse(&hash.0), &self.secret);
        let rs = signature.serialize();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&rs[..32]);
        s.copy_from_slice(&rs[32..]);
        ECSignature {
            v: recovery_id.serialize(),
            r,
            s,
        }
    }
}

impl fmt::Debug for ECKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ECKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches, test_case::test_case};

    #[test]
    fn test_sign_and_recover() {
        let keypair = ECKeyPair::from_seed(b"alice");
        let hash = Hash::of(b"payload");
        let signature = keypair.sign(&hash);

        assert_eq!(signature.recover(&hash).unwrap(), keypair.public_key());
        assert!(keypair.public_key().verify(&hash, &signature));
        assert_ne!(
            signature.recover(&Hash::of(b"other")).ok(),
            Some(keypair.public_key())
        );
    }

    #[test]
    fn test_signature_bytes() {
        let keypair = ECKeyPair::from_seed(b"bob");
        let signature = keypair.sign(&Hash::of(b"payload"));
        let bytes = signature.to_bytes();
        assert_eq!(ECSignature::from_bytes(&bytes).unwrap(), signature);
    }

    #[test_case(64; "short")]
    #[test_case(66; "long")]
    fn test_signature_bad_length(len: usize) {
        assert_matches!(
            ECSignature::from_bytes(&vec![0u8; len]),
            Err(SignatureError::InvalidLength(l)) if l == len
        );
    }

    #[test]
    fn test_signature_bad_recovery_id() {
        let mut bytes = [0u8; SIGNATURE_BYTES];
        bytes[0] = 4;
        assert_matches!(
            ECSignature::from_bytes(&bytes),
            Err(SignatureError::InvalidRecoveryId(4))
        );
    }

    #[test]
    fn test_public_key_parse() {
        let key = ECKeyPair::from_seed(b"carol").public_key();
        assert_eq!(ECPublicKey::from_bytes(&key.to_bytes()).unwrap(), key);
        assert_matches!(
            ECPublicKey::from_bytes(&[0u8; 33]),
            Err(SignatureError::InvalidPublicKey)
        );
        assert_matches!(
            ECPublicKey::from_bytes(&key.to_bytes()[..32]),
            Err(SignatureError::InvalidPublicKey)
        );
    }
}
