//! This module defines the block [`Header`], its [`Commit`] and the [`SignedHeader`] pairing.

use serde::{Deserialize, Serialize};
use serde_with::{formats::Uppercase, hex::Hex, serde_as};
use tendermint_lite_utils::serde::number_as_string;
use time::OffsetDateTime;

use crate::{
    crypto::Signature,
    error::{HeaderError, VerificationError},
    hash::{encode_bytes, simple_hash_from_byte_vectors, Hash},
    validator::Address,
};

/// Domain tag prepended to every vote sign payload
pub const VOTE_DOMAIN: &[u8] = b"tendermint-lite/vote/v1";

/// A block header
#[serde_as]
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Header {
    /// Chain identifier
    pub chain_id: String,
    /// Block height, starting at 1
    #[serde(with = "number_as_string")]
    pub height: u64,
    /// Block time
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    /// Application state root after the previous block
    #[serde_as(as = "Hex<Uppercase>")]
    pub app_hash: Vec<u8>,
    /// Hash of the validator set that signs this block
    pub validators_hash: Hash,
    /// Hash of the validator set that signs the next block
    pub next_validators_hash: Hash,
    /// Address of the block proposer
    pub proposer_address: Address,
}

impl Header {
    /// Merkle root over the encoded header fields, in declaration order.
    #[must_use]
    pub fn hash(&self) -> Hash {
        let mut chain_id = Vec::new();
        encode_bytes(&mut chain_id, self.chain_id.as_bytes());
        let mut app_hash = Vec::new();
        encode_bytes(&mut app_hash, &self.app_hash);

        let fields: [Vec<u8>; 7] = [
            chain_id,
            self.height.to_be_bytes().to_vec(),
            encode_time(self.time).to_vec(),
            app_hash,
            self.validators_hash.as_bytes().to_vec(),
            self.next_validators_hash.as_bytes().to_vec(),
            self.proposer_address.as_bytes().to_vec(),
        ];
        simple_hash_from_byte_vectors(&fields)
    }
}

fn encode_time(time: OffsetDateTime) -> [u8; 16] {
    time.unix_timestamp_nanos().to_be_bytes()
}

/// Identifies a block by its header hash
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockId {
    /// Header hash
    pub hash: Hash,
}

/// A single validator's entry in a commit
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(tag = "block_id_flag", rename_all = "snake_case")]
pub enum CommitSig {
    /// The validator did not vote
    Absent,
    /// The validator voted for the committed block
    Commit {
        /// Address of the voting validator
        validator_address: Address,
        /// Vote time
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
        /// Signature over the canonical vote
        signature: Signature,
    },
}

/// Votes finalizing a block
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Commit {
    /// Height of the committed block
    #[serde(with = "number_as_string")]
    pub height: u64,
    /// Consensus round the block was committed in
    pub round: u32,
    /// The committed block
    pub block_id: BlockId,
    /// One entry per vote, in any order
    pub signatures: Vec<CommitSig>,
}

/// The message a validator signs when voting for a block
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CanonicalVote<'a> {
    /// Chain the vote is for
    pub chain_id: &'a str,
    /// Block height
    pub height: u64,
    /// Consensus round
    pub round: u32,
    /// Block voted for
    pub block_id: BlockId,
    /// Vote time
    pub timestamp: OffsetDateTime,
}

impl<'a> CanonicalVote<'a> {
    /// The vote of a commit signature with the given timestamp.
    #[must_use]
    pub const fn new(chain_id: &'a str, commit: &Commit, timestamp: OffsetDateTime) -> Self {
        Self {
            chain_id,
            height: commit.height,
            round: commit.round,
            block_id: commit.block_id,
            timestamp,
        }
    }

    /// Deterministic encoding of the vote, prefixed with [`VOTE_DOMAIN`].
    #[must_use]
    pub fn sign_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        encode_bytes(&mut buf, VOTE_DOMAIN);
        encode_bytes(&mut buf, self.chain_id.as_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.round.to_be_bytes());
        buf.extend_from_slice(self.block_id.hash.as_bytes());
        buf.extend_from_slice(&encode_time(self.timestamp));
        buf
    }
}

/// A header together with the commit that finalizes it.
///
/// Construction checks that the commit is for this header, so a mismatched pair cannot exist.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(try_from = "RawSignedHeader", into = "RawSignedHeader")]
pub struct SignedHeader {
    header: Header,
    commit: Commit,
    hash: Hash,
}

#[derive(Serialize, Deserialize)]
struct RawSignedHeader {
    header: Header,
    commit: Commit,
}

impl TryFrom<RawSignedHeader> for SignedHeader {
    type Error = VerificationError;

    fn try_from(raw: RawSignedHeader) -> Result<Self, Self::Error> {
        Self::new(raw.header, raw.commit)
    }
}

impl From<SignedHeader> for RawSignedHeader {
    fn from(signed: SignedHeader) -> Self {
        Self {
            header: signed.header,
            commit: signed.commit,
        }
    }
}

impl SignedHeader {
    /// Pairs a header with its commit.
    /// # Errors
    /// Returns [`VerificationError::InvalidHeader`] if the header has height zero or an empty chain
    /// id, or the commit is for another height or block.
    pub fn new(header: Header, commit: Commit) -> Result<Self, VerificationError> {
        ensure!(header.height != 0, HeaderError::ZeroHeight.into());
        ensure!(!header.chain_id.is_empty(), HeaderError::EmptyChainId.into());
        ensure!(
            commit.height == header.height,
            HeaderError::CommitHeightMismatch {
                header: header.height,
                commit: commit.height,
            }
            .into()
        );

        let hash = header.hash();
        ensure!(
            commit.block_id.hash == hash,
            HeaderError::CommitBlockIdMismatch {
                header_hash: hash,
                commit_hash: commit.block_id.hash,
            }
            .into()
        );

        Ok(Self {
            header,
            commit,
            hash,
        })
    }

    /// The header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// The commit.
    #[must_use]
    pub const fn commit(&self) -> &Commit {
        &self.commit
    }

    /// Hash of the header.
    #[must_use]
    pub const fn hash(&self) -> Hash {
        self.hash
    }

    /// Block id of the header.
    #[must_use]
    pub const fn block_id(&self) -> BlockId {
        BlockId { hash: self.hash }
    }

    /// Height of the header.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.header.height
    }

    /// Time of the header.
    #[must_use]
    pub const fn time(&self) -> OffsetDateTime {
        self.header.time
    }

    /// Chain id of the header.
    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }
}
