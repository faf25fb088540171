//! EIP-155 legacy transactions.
//!
//! Legacy transactions are accepted by every chain the project targets,
//! including Harmony which has no EIP-1559 support.

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    rlp::{Encodable, Header},
};

use crate::{error::Result, signer::LocalKey};

/// RLP encoding of an empty string, used for the `to` of a contract creation.
const EMPTY_STRING_CODE: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: u64,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
}

impl LegacyTransaction {
    /// Hash signed by the sender: `keccak(rlp([.., chainId, 0, 0]))`.
    pub fn signing_hash(&self) -> B256 {
        keccak256(self.encode_unsigned())
    }

    pub fn encode_unsigned(&self) -> Vec<u8> {
        self.encode_with(&[&self.chain_id, &0u8, &0u8])
    }

    pub fn sign(&self, key: &LocalKey) -> Result<SignedTransaction> {
        let signature = key.sign_prehash(&self.signing_hash())?;
        let v = self.chain_id * 2 + 35 + u64::from(signature.y_parity);
        let raw = self.encode_with(&[&v, &signature.r, &signature.s]);
        Ok(SignedTransaction {
            hash: keccak256(&raw),
            raw: raw.into(),
        })
    }

    fn encode_with(&self, trailer: &[&dyn Encodable]) -> Vec<u8> {
        let mut payload = Vec::new();
        self.nonce.encode(&mut payload);
        self.gas_price.encode(&mut payload);
        self.gas_limit.encode(&mut payload);
        match &self.to {
            Some(to) => to.encode(&mut payload),
            None => payload.push(EMPTY_STRING_CODE),
        }
        self.value.encode(&mut payload);
        self.input.encode(&mut payload);
        for field in trailer {
            field.encode(&mut payload);
        }

        let mut out = Vec::with_capacity(payload.len() + 9);
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    use super::*;

    /// The example transaction of EIP-155.
    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000_000_000_000u128),
            input: Bytes::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn test_eip155_signing_payload() {
        let tx = eip155_example();
        assert_eq!(
            hex::encode(tx.encode_unsigned()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            tx.signing_hash().to_string(),
            "0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_example() {
        let key = LocalKey::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let signed = eip155_example().sign(&key).unwrap();

        assert_eq!(
            hex::encode(&signed.raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }

    #[test]
    fn test_creation_encodes_empty_recipient() {
        let tx = LegacyTransaction {
            to: None,
            input: Bytes::from_static(&[0x60, 0x80]),
            ..eip155_example()
        };
        let encoded = tx.encode_unsigned();
        // The address (0x94 + 20 bytes) is replaced by a single 0x80.
        assert_eq!(encoded.len(), eip155_example().encode_unsigned().len() - 20 + 2);
        assert!(encoded.windows(4).any(|w| w == [0x82, 0x52, 0x08, EMPTY_STRING_CODE]));
    }

    #[test]
    fn test_signed_transaction_recovers_sender() {
        let key = LocalKey::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let tx = eip155_example();
        let signed = tx.sign(&key).unwrap();

        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert_eq!(signed.raw[0], 0xf8);

        let signature = key.sign_prehash(&tx.signing_hash()).unwrap();

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
        bytes[32..].copy_from_slice(&signature.s.to_be_bytes::<32>());
        let recovered = VerifyingKey::recover_from_prehash(
            tx.signing_hash().as_slice(),
            &Signature::from_slice(&bytes).unwrap(),
            RecoveryId::new(signature.y_parity, false),
        )
        .unwrap();
        let point = recovered.to_encoded_point(false);
        assert_eq!(
            Address::from_slice(&keccak256(&point.as_bytes()[1..])[12..]),
            key.address()
        );
    }
}
