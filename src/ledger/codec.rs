//! SCALE decoding of Substrate extrinsics and SS58 address rendering
//!
//! Only the parts of an extrinsic the explorer needs are decoded: the
//! signer, the call's pallet and method, and the arguments of the balance
//! transfer calls. Pallet indices and the signed-extension layout differ per
//! runtime and are supplied through [`RuntimeLayout`].

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use parity_scale_codec::{Compact, Decode, Encode, Input};
use serde::Deserialize;
use thiserror::Error;

use super::{Address, Operation};

type Blake2b256 = Blake2b<U32>;

/// Storage key of `Timestamp::Now` (twox128("Timestamp") ++ twox128("Now")).
pub const TIMESTAMP_NOW_KEY: &str =
    "0xf0c365c3cf59d671eb72da0e7a4113c49f1f0515f462cdcf84e0f1d6045dfcbb";

const EXTRINSIC_VERSION: u8 = 4;
const SIGNED_BIT: u8 = 0b1000_0000;
const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid SCALE data: {0}")]
    Scale(#[from] parity_scale_codec::Error),

    #[error("unsupported extrinsic version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown address variant {0}")]
    AddressVariant(u8),

    #[error("unknown signature variant {0}")]
    SignatureVariant(u8),
}

/// Runtime-specific layout needed to read extrinsics without metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeLayout {
    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,
    /// Pallet names by call index, in `construct_runtime!` order.
    #[serde(default = "default_pallets")]
    pub pallets: Vec<String>,
    /// Balances pallet predating `transfer_allow_death` (call 0 is `transfer`).
    #[serde(default)]
    pub legacy_transfer: bool,
    /// Signers and destinations are `MultiAddress` rather than bare account ids.
    #[serde(default = "default_true")]
    pub multi_address: bool,
    /// The runtime carries the `CheckMetadataHash` signed extension.
    #[serde(default = "default_true")]
    pub metadata_hash_extension: bool,
}

impl Default for RuntimeLayout {
    fn default() -> Self {
        Self {
            ss58_prefix: default_ss58_prefix(),
            pallets: default_pallets(),
            legacy_transfer: false,
            multi_address: true,
            metadata_hash_extension: true,
        }
    }
}

impl RuntimeLayout {
    fn section(&self, pallet: u8) -> String {
        match self.pallets.get(pallet as usize) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("pallet{}", pallet),
        }
    }
}

fn default_ss58_prefix() -> u16 {
    42
}

fn default_true() -> bool {
    true
}

// solochain node template runtime
fn default_pallets() -> Vec<String> {
    [
        "system",
        "timestamp",
        "aura",
        "grandpa",
        "balances",
        "transactionPayment",
        "sudo",
        "template",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Strip an optional `0x` prefix and hex-decode.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(hex::decode(value.trim_start_matches("0x"))?)
}

/// Blake2b-256 of the full encoded extrinsic, length prefix included.
pub fn extrinsic_hash(encoded: &[u8]) -> String {
    format!("0x{}", hex::encode(Blake2b256::digest(encoded)))
}

/// Render a 32-byte account id as an SS58 address.
pub fn ss58_encode(account: &[u8; 32], prefix: u16) -> Address {
    let mut payload = Vec::with_capacity(36);
    match prefix {
        0..=63 => payload.push(prefix as u8),
        _ => {
            payload.push((((prefix & 0b1111_1100) as u8) >> 2) | 0b0100_0000);
            payload.push(((prefix >> 8) as u8) | (((prefix & 0b11) as u8) << 6));
        }
    }
    payload.extend_from_slice(account);

    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(&payload);
    let checksum = hasher.finalize();
    payload.extend_from_slice(&checksum[..2]);

    bs58::encode(payload).into_string()
}

/// Decode a `Timestamp::Now` storage value.
pub fn decode_timestamp(value: &str) -> Result<u64, DecodeError> {
    let bytes = decode_hex(value)?;
    Ok(u64::decode(&mut bytes.as_slice())?)
}

/// SCALE-encoded length of a header with the given number and digest logs.
pub fn header_size(number: u64, digest_logs: &[Vec<u8>]) -> u64 {
    let logs: usize = digest_logs.iter().map(Vec::len).sum();
    let size = 32 // parent hash
        + Compact(number).encoded_size()
        + 32 // state root
        + 32 // extrinsics root
        + Compact(digest_logs.len() as u32).encoded_size()
        + logs;
    size as u64
}

/// Decode one encoded extrinsic (as returned by `chain_getBlock`).
pub fn decode_extrinsic(encoded: &[u8], layout: &RuntimeLayout) -> Result<Operation, DecodeError> {
    let hash = extrinsic_hash(encoded);
    let mut input = encoded;

    let _length = Compact::<u32>::decode(&mut input)?;
    let version = u8::decode(&mut input)?;
    if version & !SIGNED_BIT != EXTRINSIC_VERSION {
        return Err(DecodeError::UnsupportedVersion(version & !SIGNED_BIT));
    }

    let signer = if version & SIGNED_BIT != 0 {
        let signer = decode_address(&mut input, layout)?;
        skip_signature(&mut input)?;
        skip_signed_extra(&mut input, layout)?;
        Some(signer)
    } else {
        None
    };

    let pallet = u8::decode(&mut input)?;
    let call = u8::decode(&mut input)?;
    let section = layout.section(pallet);
    let (method, args) = decode_call(&section, call, &mut input, layout)?;

    Ok(Operation {
        hash,
        is_signed: signer.is_some(),
        signer,
        section,
        method,
        args,
    })
}

fn decode_call(
    section: &str,
    call: u8,
    input: &mut &[u8],
    layout: &RuntimeLayout,
) -> Result<(String, Vec<String>), DecodeError> {
    let method = match section {
        "balances" => balances_method(call, layout.legacy_transfer),
        "timestamp" if call == 0 => Some("set"),
        _ => None,
    };
    let Some(method) = method else {
        return Ok((format!("call{}", call), Vec::new()));
    };

    let args = match method {
        "transfer" | "transferAllowDeath" | "transferKeepAlive" => vec![
            decode_address(input, layout)?,
            Compact::<u128>::decode(input)?.0.to_string(),
        ],
        "forceTransfer" => vec![
            decode_address(input, layout)?,
            decode_address(input, layout)?,
            Compact::<u128>::decode(input)?.0.to_string(),
        ],
        "transferAll" => vec![
            decode_address(input, layout)?,
            bool::decode(input)?.to_string(),
        ],
        "set" => vec![Compact::<u64>::decode(input)?.0.to_string()],
        _ => Vec::new(),
    };
    Ok((method.to_string(), args))
}

fn balances_method(call: u8, legacy: bool) -> Option<&'static str> {
    let name = match (call, legacy) {
        (0, true) => "transfer",
        (0, false) => "transferAllowDeath",
        (1, true) => "setBalance",
        (2, _) => "forceTransfer",
        (3, _) => "transferKeepAlive",
        (4, _) => "transferAll",
        (5, _) => "forceUnreserve",
        (6, false) => "upgradeAccounts",
        (8, false) => "forceSetBalance",
        (9, false) => "forceAdjustTotalIssuance",
        (10, false) => "burn",
        _ => return None,
    };
    Some(name)
}

fn decode_address(input: &mut &[u8], layout: &RuntimeLayout) -> Result<Address, DecodeError> {
    if !layout.multi_address {
        return Ok(ss58_encode(&<[u8; 32]>::decode(input)?, layout.ss58_prefix));
    }
    match u8::decode(input)? {
        0 => Ok(ss58_encode(&<[u8; 32]>::decode(input)?, layout.ss58_prefix)),
        1 => Ok(format!("index:{}", Compact::<u32>::decode(input)?.0)),
        2 => Ok(format!("0x{}", hex::encode(Vec::<u8>::decode(input)?))),
        3 => Ok(format!("0x{}", hex::encode(<[u8; 32]>::decode(input)?))),
        4 => Ok(format!("0x{}", hex::encode(<[u8; 20]>::decode(input)?))),
        other => Err(DecodeError::AddressVariant(other)),
    }
}

fn skip_signature(input: &mut &[u8]) -> Result<(), DecodeError> {
    let len = match u8::decode(input)? {
        0 | 1 => 64, // ed25519, sr25519
        2 => 65,     // ecdsa
        other => return Err(DecodeError::SignatureVariant(other)),
    };
    skip(input, len)
}

fn skip_signed_extra(input: &mut &[u8], layout: &RuntimeLayout) -> Result<(), DecodeError> {
    // mortal eras take two bytes, immortal is a single zero
    if u8::decode(input)? != 0 {
        skip(input, 1)?;
    }
    let _nonce = Compact::<u64>::decode(input)?;
    let _tip = Compact::<u128>::decode(input)?;
    if layout.metadata_hash_extension {
        let _mode = u8::decode(input)?;
    }
    Ok(())
}

fn skip(input: &mut &[u8], len: usize) -> Result<(), DecodeError> {
    let mut buf = vec![0u8; len];
    input.read(&mut buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    // transferKeepAlive Alice -> Bob, 10^12, nonce 5, immortal, sr25519
    const TRANSFER_EXTRINSIC: &str = "41028400d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d0111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111111001400000403008eaf04151687736326c9fea17e25fc5287613693c912909cb226aa4794f26a48070010a5d4e8";
    const TRANSFER_HASH: &str =
        "0x368bf574013024c862b8b6de4d8b73ecc8b7d1bb8f90777205188c5bb10b3506";

    #[test]
    fn test_ss58_well_known_accounts() {
        let alice = decode_hex("0xd43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d")
            .unwrap();
        let alice: [u8; 32] = alice.try_into().unwrap();
        assert_eq!(ss58_encode(&alice, 42), ALICE);
        assert_eq!(
            ss58_encode(&alice, 0),
            "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5"
        );
    }

    #[test]
    fn test_decode_signed_transfer() {
        let bytes = decode_hex(TRANSFER_EXTRINSIC).unwrap();
        let op = decode_extrinsic(&bytes, &RuntimeLayout::default()).unwrap();

        assert_eq!(op.hash, TRANSFER_HASH);
        assert!(op.is_signed);
        assert_eq!(op.signer.as_deref(), Some(ALICE));
        assert_eq!(op.section, "balances");
        assert_eq!(op.method, "transferKeepAlive");
        assert_eq!(op.args, vec![BOB.to_string(), "1000000000000".to_string()]);
    }

    #[test]
    fn test_decode_unsigned_timestamp_set() {
        let bytes = decode_hex("0x280401000b0068e5cf8b01").unwrap();
        let op = decode_extrinsic(&bytes, &RuntimeLayout::default()).unwrap();

        assert_eq!(
            op.hash,
            "0x3f2bf184b6782bfff3994f1dd9cbac3eae8cae3baed74ed4ee90ec3122fcba6a"
        );
        assert!(!op.is_signed);
        assert!(op.signer.is_none());
        assert_eq!(op.section, "timestamp");
        assert_eq!(op.method, "set");
        assert_eq!(op.args, vec!["1700000000000".to_string()]);
    }

    #[test]
    fn test_unknown_pallet_keeps_index() {
        // unsigned call 9 of pallet 42
        let bytes = decode_hex("0x0c042a09").unwrap();
        let op = decode_extrinsic(&bytes, &RuntimeLayout::default()).unwrap();
        assert_eq!(op.section, "pallet42");
        assert_eq!(op.method, "call9");
        assert!(op.args.is_empty());
    }

    #[test]
    fn test_truncated_extrinsic_is_an_error() {
        let bytes = decode_hex(&TRANSFER_EXTRINSIC[..80]).unwrap();
        assert!(decode_extrinsic(&bytes, &RuntimeLayout::default()).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let bytes = decode_hex("0x0c050000").unwrap();
        let err = decode_extrinsic(&bytes, &RuntimeLayout::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion(5)));
    }

    #[test]
    fn test_decode_timestamp_storage() {
        assert_eq!(decode_timestamp("0x0068e5cf8b010000").unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_header_size() {
        // 96 bytes of hashes/roots, 1-byte compact number, 1-byte log count
        assert_eq!(header_size(10, &[]), 98);
        assert_eq!(header_size(100, &[vec![0u8; 10]]), 96 + 2 + 1 + 10);
    }
}
