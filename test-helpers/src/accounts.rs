//! The deterministic accounts of a local development node

use alloy::{
    primitives::{address, b256, Address},
    signers::local::PrivateKeySigner,
};

/// The first development account, used to deploy contracts
pub fn deployer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
    ))
    .unwrap()
}

/// The second development account
pub fn alice() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
    ))
    .unwrap()
}

/// The third development account
pub fn bob() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a"
    ))
    .unwrap()
}

/// The address trusted by deployed contracts to sign offchain payloads
pub fn offchain_signer() -> Address {
    address!("7d26ba8d75bc5f4d5a3c3a29f8ea4c39e7fe8126")
}
