use std::{sync::Once, time::Duration};

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolValue},
};
use contracts_common::{
    constants::{DEFAULT_LOGIC_CONTRACT, IMPLEMENTATION_STORAGE_SLOT},
    solidity::IOwnable,
    types::{DeployedInstance, DeploymentDescriptor, ProxyKind},
};
use eyre::Result;
use scripts::{
    artifacts::Artifacts,
    chain::{address_from_word, ChainClient, WaitOptions},
    deploy::Deployer,
};
use test_helpers::{accounts, fixtures::test_artifacts, sim::SimulatedChain};
use tokio::task::JoinHandle;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

// ---------------------
// | META TEST HELPERS |
// ---------------------

/// Every kind of proxy the deployer supports
pub const ALL_PROXY_KINDS: [ProxyKind; 3] =
    [ProxyKind::Uups, ProxyKind::Transparent, ProxyKind::Beacon];

/// The token id the shop starts minting from
pub const STARTING_TOKEN_ID: u64 = 1;

/// How long tests wait on a transaction before failing
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How often [`spawn_miner`] mines a block
pub const MINING_INTERVAL: Duration = Duration::from_millis(10);

static TRACING_INIT: Once = Once::new();

pub fn global_setup() {
    TRACING_INIT.call_once(|| {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    });
}

/// The state of a test scenario: a fresh chain, the deployer driving it, and
/// the accounts involved
pub struct TestContext {
    /// The chain the scenario runs against
    pub chain: SimulatedChain,
    /// The deployer under test
    pub deployer: Deployer<SimulatedChain>,
    /// The account deploying, and owning, the shop
    pub owner: PrivateKeySigner,
    /// The offchain signer trusted by the shop
    pub offchain_signer: Address,
}

impl TestContext {
    /// A scenario over a fresh chain knowing the test artifacts
    pub fn new() -> Self {
        Self::with_artifacts(test_artifacts())
    }

    /// A scenario over a fresh chain knowing the given artifacts
    pub fn with_artifacts(artifacts: Artifacts) -> Self {
        global_setup();

        let chain = SimulatedChain::with_artifacts(&artifacts);
        let deployer = Deployer::new(chain.clone(), artifacts)
            .with_wait_options(WaitOptions::default().with_timeout(TEST_TIMEOUT));

        Self {
            chain,
            deployer,
            owner: accounts::deployer(),
            offchain_signer: accounts::offchain_signer(),
        }
    }

    /// Use different wait options in the deployer
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.deployer = self.deployer.with_wait_options(wait);
        self
    }

    /// The descriptor of the shop, owned by the scenario's owner
    pub fn shop_descriptor(&self, kind: ProxyKind) -> DeploymentDescriptor {
        DeploymentDescriptor::new(
            DEFAULT_LOGIC_CONTRACT,
            vec![
                self.owner.address().to_string(),
                STARTING_TOKEN_ID.to_string(),
            ],
            kind,
        )
    }

    /// Deploy the shop behind the given kind of proxy
    pub async fn deploy_shop(&self, kind: ProxyKind) -> Result<DeployedInstance> {
        debug!("Deploying the shop behind a {kind} proxy...");
        let instance = self
            .deployer
            .deploy(&self.shop_descriptor(kind), &self.owner, self.offchain_signer)
            .await?;

        Ok(instance)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

// --------------------------------
// | CONTRACT INTERACTION HELPERS |
// --------------------------------

/// Read the EIP-1967 implementation slot of a proxy
pub async fn implementation_slot(chain: &SimulatedChain, proxy: Address) -> Result<Address> {
    let word = chain.storage_at(proxy, IMPLEMENTATION_STORAGE_SLOT).await?;
    Ok(address_from_word(word))
}

/// Call a view function returning a single address
pub async fn call_address(
    chain: &SimulatedChain,
    to: Address,
    calldata: impl Into<Bytes>,
) -> Result<Address> {
    let tx = TransactionRequest::default().with_to(to).with_input(calldata);
    let output = chain.call(tx).await?;
    Ok(Address::abi_decode(&output)?)
}

/// The owner reported by a contract, or by the logic behind a proxy
pub async fn owner_of(chain: &SimulatedChain, contract: Address) -> Result<Address> {
    call_address(chain, contract, IOwnable::ownerCall {}.abi_encode()).await
}

/// Mine pending transactions every few milliseconds until aborted
pub fn spawn_miner(chain: &SimulatedChain) -> JoinHandle<()> {
    let chain = chain.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(MINING_INTERVAL).await;
            chain.mine();
        }
    })
}

/// Submit a transaction directly, bypassing the deployer
pub async fn send_raw(
    chain: &SimulatedChain,
    signer: &PrivateKeySigner,
    to: Address,
    calldata: impl Into<Bytes>,
) -> Result<(), scripts::errors::ScriptError> {
    let tx = TransactionRequest::default().with_to(to).with_input(calldata);
    chain.submit(signer, tx).await?;
    Ok(())
}
