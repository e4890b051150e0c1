//! Deterministic validators and signed blocks for tests and fixtures

use ed25519_dalek::{Signer, SigningKey};
use time::OffsetDateTime;

use crate::{
    crypto::Signature,
    error::VerificationError,
    hash::Hash,
    header::{BlockId, CanonicalVote, Commit, CommitSig, Header, SignedHeader},
    store::LightBlock,
    validator::{Address, PublicKey, Validator, ValidatorSet},
};

/// A validator whose ed25519 key is derived from a one byte seed
#[derive(Clone, Debug)]
pub struct TestValidator {
    seed: u8,
    power: u64,
    signing_key: SigningKey,
}

impl TestValidator {
    /// Creates the validator for `seed` with `power`.
    #[must_use]
    pub fn new(seed: u8, power: u64) -> Self {
        Self {
            seed,
            power,
            signing_key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    /// The seed.
    #[must_use]
    pub const fn seed(&self) -> u8 {
        self.seed
    }

    /// The public key.
    #[must_use]
    pub fn pub_key(&self) -> PublicKey {
        PublicKey::Ed25519(self.signing_key.verifying_key().to_bytes())
    }

    /// The validator with its voting power.
    #[must_use]
    pub fn validator(&self) -> Validator {
        Validator::new(self.pub_key(), self.power)
    }

    /// The validator address.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_pub_key(&self.pub_key())
    }

    /// Signs `msg`.
    #[must_use]
    pub fn sign(&self, msg: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(msg).to_bytes().to_vec())
    }
}

/// Builds a validator set from test validators.
/// # Errors
/// Returns an error if the set is empty, has duplicates or overflows.
pub fn validator_set(validators: &[TestValidator]) -> Result<ValidatorSet, VerificationError> {
    ValidatorSet::new(validators.iter().map(TestValidator::validator).collect())
}

/// Builds a [`LightBlock`] signed by a chosen subset of validators
#[derive(Clone, Debug)]
pub struct BlockBuilder {
    chain_id: String,
    height: u64,
    time: OffsetDateTime,
    validators: Vec<TestValidator>,
    next_validators: Option<Vec<TestValidator>>,
    signers: Option<Vec<u8>>,
    corrupt_signers: Vec<u8>,
}

impl BlockBuilder {
    /// A block at `height` and `time` signed by all of `validators`, which also sign the next block.
    #[must_use]
    pub fn new(
        chain_id: impl Into<String>,
        height: u64,
        time: OffsetDateTime,
        validators: Vec<TestValidator>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
            validators,
            next_validators: None,
            signers: None,
            corrupt_signers: Vec::new(),
        }
    }

    /// Sets the validators for the next block.
    #[must_use]
    pub fn next_validators(mut self, next_validators: Vec<TestValidator>) -> Self {
        self.next_validators = Some(next_validators);
        self
    }

    /// Signs with the validators of the given seeds only. Seeds outside the validator set still
    /// sign, as unknown validators.
    #[must_use]
    pub fn signers(mut self, seeds: &[u8]) -> Self {
        self.signers = Some(seeds.to_vec());
        self
    }

    /// Replaces the signatures of the given seeds with invalid ones.
    #[must_use]
    pub fn corrupt_signers(mut self, seeds: &[u8]) -> Self {
        self.corrupt_signers = seeds.to_vec();
        self
    }

    /// Builds and signs the block.
    /// # Errors
    /// Returns an error if a validator set or the signed header is invalid.
    pub fn build(&self) -> Result<LightBlock, VerificationError> {
        let validators = validator_set(&self.validators)?;
        let next_validators =
            validator_set(self.next_validators.as_deref().unwrap_or(&self.validators))?;

        let header = Header {
            chain_id: self.chain_id.clone(),
            height: self.height,
            time: self.time,
            app_hash: Hash::digest(self.height.to_be_bytes()).as_bytes().to_vec(),
            validators_hash: validators.hash(),
            next_validators_hash: next_validators.hash(),
            proposer_address: validators
                .iter()
                .next()
                .map(Validator::address)
                .unwrap_or_default(),
        };

        let mut commit = Commit {
            height: self.height,
            round: 0,
            block_id: BlockId {
                hash: header.hash(),
            },
            signatures: Vec::new(),
        };
        let sign_bytes = CanonicalVote::new(&self.chain_id, &commit, self.time).sign_bytes();

        let signers = self
            .signers
            .clone()
            .unwrap_or_else(|| self.validators.iter().map(TestValidator::seed).collect());
        commit.signatures = signers
            .into_iter()
            .map(|seed| {
                let signer = TestValidator::new(seed, 0);
                let mut signature = signer.sign(&sign_bytes).as_bytes().to_vec();
                if self.corrupt_signers.contains(&seed) {
                    signature[0] ^= 0xff;
                }
                CommitSig::Commit {
                    validator_address: signer.address(),
                    timestamp: self.time,
                    signature: Signature::new(signature),
                }
            })
            .collect();

        Ok(LightBlock {
            signed_header: SignedHeader::new(header, commit)?,
            validators,
            next_validators,
        })
    }
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use super::{BlockBuilder, TestValidator};
    use crate::header::CommitSig;

    #[test]
    fn test_build_is_deterministic() {
        let builder = BlockBuilder::new(
            "test-chain",
            3,
            datetime!(2020-01-01 0:00 UTC),
            vec![TestValidator::new(1, 1), TestValidator::new(2, 1)],
        );
        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }

    #[test]
    fn test_signers_and_corruption() {
        let block = BlockBuilder::new(
            "test-chain",
            3,
            datetime!(2020-01-01 0:00 UTC),
            vec![TestValidator::new(1, 1), TestValidator::new(2, 1)],
        )
        .signers(&[2, 9])
        .corrupt_signers(&[9])
        .build()
        .unwrap();

        let signatures = &block.signed_header.commit().signatures;
        assert_eq!(signatures.len(), 2);
        let CommitSig::Commit {
            validator_address, ..
        } = &signatures[1]
        else {
            panic!("expected a vote");
        };
        assert_eq!(*validator_address, TestValidator::new(9, 0).address());
    }
}
