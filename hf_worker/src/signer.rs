//! Local transaction signing, for endpoints that only accept `eth_sendRawTransaction`.
//!
//! Transactions are legacy (`gasPrice`) transactions with EIP-155 replay protection.

use hodlerfc::model::Address;
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use secrecy::{ExposeSecret, SecretString};
use sha3::{Digest, Keccak256};

/// Unsigned legacy transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender account nonce.
    pub nonce: u64,
    /// Wei per gas.
    pub gas_price: u128,
    /// Gas limit.
    pub gas: u64,
    /// Contract.
    pub to: Address,
    /// Wei to send.
    pub value: u128,
    /// Calldata.
    pub data: Vec<u8>,
}
impl LegacyTransaction {
    fn rlp_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.nonce)
            .append(&uint_bytes(&self.gas_price.to_be_bytes()))
            .append(&self.gas)
            .append(&self.to.0.to_vec())
            .append(&uint_bytes(&self.value.to_be_bytes()))
            .append(&self.data);
    }

    /// Keccak-256 of the EIP-155 signing payload for `chain_id`.
    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.rlp_fields(&mut stream);
        stream.append(&chain_id).append(&0_u64).append(&0_u64);
        Keccak256::digest(stream.out()).into()
    }
}

/// Big-endian integer bytes with leading zeros removed, as RLP expects.
fn uint_bytes(be: &[u8]) -> Vec<u8> {
    let start = be.iter().position(|&b| b != 0).unwrap_or(be.len());
    be[start..].to_vec()
}

/// Signs transactions with a private key held by the worker.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}
impl LocalSigner {
    /// Parse a `0x`-optional hex private key.
    pub fn from_hex(private_key: &SecretString) -> Result<Self, String> {
        let hex_key = private_key.expose_secret().trim();
        let bytes = hex::decode(hex_key.strip_prefix("0x").unwrap_or(hex_key))
            .map_err(|e| format!("Private key is not hex: {}", e))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| "Private key is not a valid secp256k1 scalar.".to_owned())?;
        let point = key.verifying_key().to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        let mut address = [0; 20];
        address.copy_from_slice(&hash[12..]);
        Ok(Self {
            key,
            address: Address(address),
        })
    }

    /// Account of this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `tx` for `chain_id`, returning the raw transaction bytes.
    pub fn sign(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<Vec<u8>, String> {
        let hash = tx.signing_hash(chain_id);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| format!("Signing failed: {}", e))?;
        let v = chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + u64::from(recovery_id.to_byte())))
            .ok_or_else(|| format!("Chain id {} too large.", chain_id))?;
        let bytes = signature.to_bytes();
        let (r, s) = bytes.split_at(32);

        let mut stream = RlpStream::new_list(9);
        tx.rlp_fields(&mut stream);
        stream
            .append(&v)
            .append(&uint_bytes(r))
            .append(&uint_bytes(s));
        Ok(stream.out().to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn eip155_signer() -> LocalSigner {
        LocalSigner::from_hex(&"0x4646464646464646464646464646464646464646464646464646464646464646".to_owned().into())
            .unwrap()
    }

    fn eip155_tx() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas: 21_000,
            to: Address([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(
            "9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f",
            hex::encode(eip155_signer().address().0)
        );
        assert!(LocalSigner::from_hex(&"0x00".to_owned().into()).is_err());
        assert!(LocalSigner::from_hex(&"nope".to_owned().into()).is_err());
    }

    #[test]
    fn test_signing_hash() {
        assert_eq!(
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53",
            hex::encode(eip155_tx().signing_hash(1))
        );
    }

    #[test]
    fn test_sign_eip155() {
        let raw = eip155_signer().sign(&eip155_tx(), 1).unwrap();
        assert_eq!(
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025\
             a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276\
             a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83",
            hex::encode(raw)
        );
    }

    #[test]
    fn test_uint_bytes() {
        assert_eq!(Vec::<u8>::new(), uint_bytes(&0_u128.to_be_bytes()));
        assert_eq!(vec![0x04, 0xa8, 0x17, 0xc8, 0x00], uint_bytes(&20_000_000_000_u128.to_be_bytes()));
    }
}
