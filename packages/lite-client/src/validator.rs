//! This module defines [`Validator`], [`ValidatorSet`] and light commit verification.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use serde_with::{formats::Uppercase, hex::Hex, serde_as};
use tendermint_lite_utils::serde::number_as_string;

use crate::{
    crypto::SignatureVerifier,
    error::{CommitError, VerificationError},
    hash::{encode_bytes, simple_hash_from_byte_vectors, Hash},
    header::{BlockId, CanonicalVote, Commit, CommitSig},
};

/// Size of a validator address in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Maximum total voting power of a validator set, leaving headroom for priority arithmetic
pub const MAX_TOTAL_VOTING_POWER: u64 = i64::MAX.unsigned_abs() / 8;

/// A validator public key
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PublicKey {
    /// Ed25519 verifying key bytes
    Ed25519(#[serde_as(as = "Hex")] [u8; 32]),
}

impl PublicKey {
    /// The raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(bytes) => bytes,
        }
    }

    const fn type_tag(&self) -> &'static [u8] {
        match self {
            Self::Ed25519(_) => b"ed25519",
        }
    }
}

/// Validator identity: the first 20 bytes of the SHA-256 of the public key
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(#[serde_as(as = "Hex<Uppercase>")] [u8; ADDRESS_SIZE]);

impl Address {
    /// Derives the address of `pub_key`.
    #[must_use]
    pub fn from_pub_key(pub_key: &PublicKey) -> Self {
        let digest = Hash::digest(pub_key.as_bytes());
        let mut address = [0; ADDRESS_SIZE];
        address.copy_from_slice(&digest.as_bytes()[..ADDRESS_SIZE]);
        Self(address)
    }

    /// Wraps raw address bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// A validator and its voting power. The address is derived from the public key.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(from = "RawValidator")]
pub struct Validator {
    address: Address,
    /// Public key used to verify votes
    pub pub_key: PublicKey,
    /// Voting power
    #[serde(with = "number_as_string")]
    pub voting_power: u64,
}

#[derive(Deserialize)]
struct RawValidator {
    pub_key: PublicKey,
    #[serde(with = "number_as_string")]
    voting_power: u64,
}

impl From<RawValidator> for Validator {
    fn from(raw: RawValidator) -> Self {
        Self::new(raw.pub_key, raw.voting_power)
    }
}

impl Validator {
    /// Creates a validator, deriving its address.
    #[must_use]
    pub fn new(pub_key: PublicKey, voting_power: u64) -> Self {
        Self {
            address: Address::from_pub_key(&pub_key),
            pub_key,
            voting_power,
        }
    }

    /// The validator address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    fn hash_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_bytes(&mut buf, self.pub_key.type_tag());
        encode_bytes(&mut buf, self.pub_key.as_bytes());
        buf.extend_from_slice(&self.voting_power.to_be_bytes());
        buf
    }
}

/// A non-empty set of validators, ordered by address and free of duplicates.
///
/// The total voting power and the set hash are computed once at construction.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(try_from = "RawValidatorSet", into = "RawValidatorSet")]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: u64,
    hash: Hash,
}

#[derive(Serialize, Deserialize)]
struct RawValidatorSet {
    validators: Vec<Validator>,
}

impl TryFrom<RawValidatorSet> for ValidatorSet {
    type Error = VerificationError;

    fn try_from(raw: RawValidatorSet) -> Result<Self, Self::Error> {
        Self::new(raw.validators)
    }
}

impl From<ValidatorSet> for RawValidatorSet {
    fn from(set: ValidatorSet) -> Self {
        Self {
            validators: set.validators,
        }
    }
}

impl ValidatorSet {
    /// Builds a validator set, sorting the members by address.
    /// # Errors
    /// Returns an error if the set is empty, an address appears twice, or the total voting power
    /// is zero or exceeds [`MAX_TOTAL_VOTING_POWER`].
    pub fn new(mut validators: Vec<Validator>) -> Result<Self, VerificationError> {
        ensure!(!validators.is_empty(), VerificationError::EmptyValidatorSet);

        validators.sort_by_key(Validator::address);
        if let Some(pair) = validators
            .windows(2)
            .find(|pair| pair[0].address == pair[1].address)
        {
            return Err(VerificationError::DuplicateValidator {
                address: pair[0].address,
            });
        }

        let total_voting_power = validators
            .iter()
            .try_fold(0_u64, |total, v| total.checked_add(v.voting_power))
            .filter(|total| *total <= MAX_TOTAL_VOTING_POWER)
            .ok_or(VerificationError::VotingPowerOverflow {
                max: MAX_TOTAL_VOTING_POWER,
            })?;
        ensure!(total_voting_power > 0, VerificationError::ZeroVotingPower);

        let leaves: Vec<Vec<u8>> = validators.iter().map(Validator::hash_bytes).collect();
        let hash = simple_hash_from_byte_vectors(&leaves);

        Ok(Self {
            validators,
            total_voting_power,
            hash,
        })
    }

    /// Merkle root over the members in address order.
    #[must_use]
    pub const fn hash(&self) -> Hash {
        self.hash
    }

    /// Sum of all member voting powers.
    #[must_use]
    pub const fn total_voting_power(&self) -> u64 {
        self.total_voting_power
    }

    /// Looks up a member by address.
    #[must_use]
    pub fn validator(&self, address: &Address) -> Option<&Validator> {
        self.validators
            .binary_search_by_key(address, Validator::address)
            .ok()
            .map(|index| &self.validators[index])
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Always false for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Iterates the members in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Sums the voting power of members of this set that validly signed `commit` for `block_id`.
    ///
    /// Absent votes and votes from addresses outside this set are skipped. Whether the returned
    /// power is enough is for the caller to decide.
    /// # Errors
    /// Returns [`VerificationError::InvalidCommit`] if the commit is for another block, a member
    /// signed twice, or a member's signature does not verify.
    #[tracing::instrument(skip_all, fields(height = commit.height, signatures = commit.signatures.len()))]
    pub fn verify_commit_light<V>(
        &self,
        chain_id: &str,
        block_id: &BlockId,
        commit: &Commit,
        verifier: &V,
    ) -> Result<u64, VerificationError>
    where
        V: SignatureVerifier + ?Sized,
    {
        ensure!(
            commit.block_id == *block_id,
            CommitError::BlockIdMismatch {
                expected: block_id.hash,
                found: commit.block_id.hash,
            }
            .into()
        );

        let mut seen = BTreeSet::new();
        let mut signed_power = 0_u64;
        for (index, sig) in commit.signatures.iter().enumerate() {
            let CommitSig::Commit {
                validator_address,
                timestamp,
                signature,
            } = sig
            else {
                continue;
            };
            let Some(validator) = self.validator(validator_address) else {
                tracing::trace!(%validator_address, "skipping signature from unknown validator");
                continue;
            };
            ensure!(
                seen.insert(*validator_address),
                CommitError::DuplicateSignature {
                    address: *validator_address,
                }
                .into()
            );

            let sign_bytes = CanonicalVote::new(chain_id, commit, *timestamp).sign_bytes();
            verifier
                .verify(&validator.pub_key, &sign_bytes, signature)
                .map_err(|source| CommitError::InvalidSignature {
                    index,
                    address: *validator_address,
                    source,
                })?;

            // bounded by the set total, which fits in u64
            signed_power += validator.voting_power;
        }

        tracing::trace!(signed_power, total = self.total_voting_power);
        Ok(signed_power)
    }
}

impl<'a> IntoIterator for &'a ValidatorSet {
    type Item = &'a Validator;
    type IntoIter = std::slice::Iter<'a, Validator>;

    fn into_iter(self) -> Self::IntoIter {
        self.validators.iter()
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use time::macros::datetime;

    use super::{Address, PublicKey, Validator, ValidatorSet, MAX_TOTAL_VOTING_POWER};
    use crate::{
        crypto::{Ed25519Verifier, Signature},
        error::{CommitError, ErrorKind, VerificationError},
        hash::Hash,
        header::{BlockId, CommitSig},
        test_utils::generator::{validator_set, BlockBuilder, TestValidator},
    };

    fn block_with_signers(signers: &[u8]) -> crate::store::LightBlock {
        BlockBuilder::new(
            "test-chain",
            2,
            datetime!(2020-01-01 0:00 UTC),
            vec![
                TestValidator::new(1, 1),
                TestValidator::new(2, 1),
                TestValidator::new(3, 2),
            ],
        )
        .signers(signers)
        .build()
        .unwrap()
    }

    #[test]
    fn test_new_sorts_by_address() {
        let set = validator_set(&[
            TestValidator::new(3, 1),
            TestValidator::new(1, 1),
            TestValidator::new(2, 1),
        ])
        .unwrap();

        let addresses: Vec<Address> = set.iter().map(Validator::address).collect();
        let mut sorted = addresses.clone();
        sorted.sort();
        assert_eq!(addresses, sorted);
        assert_eq!(set.len(), 3);
        assert_eq!(set.total_voting_power(), 3);
    }

    #[test]
    fn test_hash_is_order_independent() {
        let a = validator_set(&[TestValidator::new(1, 1), TestValidator::new(2, 5)]).unwrap();
        let b = validator_set(&[TestValidator::new(2, 5), TestValidator::new(1, 1)]).unwrap();
        assert_eq!(a.hash(), b.hash());

        let c = validator_set(&[TestValidator::new(1, 1), TestValidator::new(2, 6)]).unwrap();
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let v = TestValidator::new(1, 1).validator();
        let err = ValidatorSet::new(vec![v.clone(), v.clone()]).unwrap_err();
        assert_eq!(
            err,
            VerificationError::DuplicateValidator {
                address: v.address()
            }
        );
        assert_eq!(err.kind(), ErrorKind::DuplicateValidator);
    }

    #[test]
    fn test_new_rejects_empty() {
        let err = ValidatorSet::new(vec![]).unwrap_err();
        assert_eq!(err, VerificationError::EmptyValidatorSet);
        assert_eq!(err.kind(), ErrorKind::InvalidValidatorSet);
    }

    #[test]
    fn test_new_rejects_zero_total_voting_power() {
        let err = validator_set(&[
            TestValidator::new(1, 0),
            TestValidator::new(2, 0),
            TestValidator::new(3, 0),
        ])
        .unwrap_err();
        assert_eq!(err, VerificationError::ZeroVotingPower);
        assert_eq!(err.kind(), ErrorKind::InvalidValidatorSet);

        let set = validator_set(&[TestValidator::new(1, 0), TestValidator::new(2, 1)]).unwrap();
        assert_eq!(set.total_voting_power(), 1);
    }

    #[rstest]
    #[case(MAX_TOTAL_VOTING_POWER, 1)]
    #[case(u64::MAX, u64::MAX)]
    fn test_new_rejects_overflow(#[case] first: u64, #[case] second: u64) {
        let err = ValidatorSet::new(vec![
            TestValidator::new(1, first).validator(),
            TestValidator::new(2, second).validator(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VotingPowerOverflow);
    }

    #[test]
    fn test_validator_lookup() {
        let set = validator_set(&[TestValidator::new(1, 1), TestValidator::new(2, 7)]).unwrap();
        let two = TestValidator::new(2, 7).address();
        assert_eq!(set.validator(&two).map(|v| v.voting_power), Some(7));
        assert!(set
            .validator(&TestValidator::new(9, 1).address())
            .is_none());
    }

    #[test]
    fn test_validator_serde() {
        let validator = Validator::new(PublicKey::Ed25519([1; 32]), 10);
        let json = serde_json::to_value(&validator).unwrap();
        assert_eq!(json["voting_power"], "10");
        assert_eq!(json["pub_key"]["type"], "ed25519");
        assert_eq!(json["pub_key"]["value"], "01".repeat(32));

        // the address is always derived, never trusted from input
        let mut tampered = json;
        tampered["address"] = serde_json::Value::String("00".repeat(20));
        let decoded: Validator = serde_json::from_value(tampered).unwrap();
        assert_eq!(decoded, validator);
    }

    #[test]
    fn test_validator_set_deserialize_validates() {
        let v = serde_json::to_value(TestValidator::new(1, 1).validator()).unwrap();
        let json = serde_json::json!({ "validators": [v.clone(), v] });
        let err = serde_json::from_value::<ValidatorSet>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate validator"));
    }

    #[rstest]
    #[case::all(&[1, 2, 3], 4)]
    #[case::two(&[1, 2], 2)]
    #[case::one(&[3], 2)]
    #[case::none(&[], 0)]
    fn test_verify_commit_light_sums_power(#[case] signers: &[u8], #[case] expected: u64) {
        let block = block_with_signers(signers);
        let signed = block
            .validators
            .verify_commit_light(
                "test-chain",
                &block.signed_header.block_id(),
                block.signed_header.commit(),
                &Ed25519Verifier,
            )
            .unwrap();
        assert_eq!(signed, expected);
    }

    #[test]
    fn test_verify_commit_light_ignores_unknown_signers() {
        let block = block_with_signers(&[1, 2, 3]);
        let subset = validator_set(&[TestValidator::new(1, 1)]).unwrap();
        let signed = subset
            .verify_commit_light(
                "test-chain",
                &block.signed_header.block_id(),
                block.signed_header.commit(),
                &Ed25519Verifier,
            )
            .unwrap();
        assert_eq!(signed, 1);
    }

    #[test]
    fn test_verify_commit_light_rejects_wrong_chain() {
        let block = block_with_signers(&[1]);
        let err = block
            .validators
            .verify_commit_light(
                "other-chain",
                &block.signed_header.block_id(),
                block.signed_header.commit(),
                &Ed25519Verifier,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::InvalidCommit(CommitError::InvalidSignature { index: 0, .. })
        ));
    }

    #[test]
    fn test_verify_commit_light_rejects_other_block() {
        let block = block_with_signers(&[1]);
        let other = BlockId {
            hash: Hash::digest(b"other"),
        };
        let err = block
            .validators
            .verify_commit_light(
                "test-chain",
                &other,
                block.signed_header.commit(),
                &Ed25519Verifier,
            )
            .unwrap_err();
        assert_eq!(
            err,
            VerificationError::InvalidCommit(CommitError::BlockIdMismatch {
                expected: other.hash,
                found: block.signed_header.block_id().hash,
            })
        );
    }

    #[test]
    fn test_verify_commit_light_rejects_double_sign() {
        let block = block_with_signers(&[1]);
        let mut commit = block.signed_header.commit().clone();
        commit.signatures.push(commit.signatures[0].clone());

        let err = block
            .validators
            .verify_commit_light(
                "test-chain",
                &block.signed_header.block_id(),
                &commit,
                &Ed25519Verifier,
            )
            .unwrap_err();
        assert_eq!(
            err,
            VerificationError::InvalidCommit(CommitError::DuplicateSignature {
                address: TestValidator::new(1, 1).address(),
            })
        );
    }

    #[test]
    fn test_verify_commit_light_skips_absent() {
        let block = block_with_signers(&[1]);
        let mut commit = block.signed_header.commit().clone();
        commit.signatures.insert(0, CommitSig::Absent);

        let signed = block
            .validators
            .verify_commit_light(
                "test-chain",
                &block.signed_header.block_id(),
                &commit,
                &Ed25519Verifier,
            )
            .unwrap();
        assert_eq!(signed, 1);
    }

    #[test]
    fn test_verify_commit_light_rejects_bad_signature() {
        let block = block_with_signers(&[1, 2]);
        let mut commit = block.signed_header.commit().clone();
        if let CommitSig::Commit { signature, .. } = &mut commit.signatures[1] {
            *signature = Signature::new(vec![0; 64]);
        }

        let err = block
            .validators
            .verify_commit_light(
                "test-chain",
                &block.signed_header.block_id(),
                &commit,
                &Ed25519Verifier,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::InvalidCommit(CommitError::InvalidSignature { index: 1, .. })
        ));
    }
}
