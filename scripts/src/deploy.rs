//! Deployment & upgrade of logic contracts behind upgradeable proxies

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, B256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolValue},
};
use contracts_common::{
    constants::{
        BEACON_STORAGE_SLOT, ERC1967_PROXY_CONTRACT, IMPLEMENTATION_STORAGE_SLOT,
        PROXY_ADMIN_STORAGE_SLOT, UPGRADEABLE_BEACON_CONTRACT,
    },
    solidity::{IOwnable, IProxyAdmin, IUUPSUpgradeable, IUpgradeableBeacon},
    types::{DeployedInstance, DeploymentDescriptor, ProxyKind},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    artifacts::Artifacts,
    chain::{
        address_from_word, wait_for_receipt, ChainClient, ChainError, TxReceipt, WaitOptions,
    },
    errors::{RevertReason, ScriptError},
    report::DeploymentReport,
};

/// Deploys logic contracts behind proxies and upgrades them.
///
/// The deployer holds no key material: every operation borrows the signer it
/// submits with for its own duration only. Operations sharing a signer must
/// not be run concurrently, as their nonces would collide.
pub struct Deployer<C> {
    /// The chain to deploy to
    client: C,
    /// The compiled contracts available for deployment
    artifacts: Artifacts,
    /// How long to wait on each transaction
    wait: WaitOptions,
    /// Aborts any in-progress wait when cancelled
    cancel: CancellationToken,
}

impl<C: ChainClient> Deployer<C> {
    /// A deployer waiting indefinitely on each transaction
    pub fn new(client: C, artifacts: Artifacts) -> Self {
        Self {
            client,
            artifacts,
            wait: WaitOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use the given wait options for every transaction
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Abort waiting on transactions once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The underlying chain client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The artifacts this deployer resolves contracts from
    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    // -----------
    // | DEPLOY |
    // -----------

    /// Deploy the described logic contract behind a new proxy, initializing
    /// it atomically with the proxy's construction.
    ///
    /// `offchain_signer` is appended to the initializer arguments as the
    /// trusted signer of the logic contract.
    pub async fn deploy(
        &self,
        descriptor: &DeploymentDescriptor,
        signer: &PrivateKeySigner,
        offchain_signer: Address,
    ) -> Result<DeployedInstance, ScriptError> {
        let DeploymentDescriptor {
            contract_name,
            kind,
            ..
        } = descriptor;
        debug!("Deploying {contract_name} behind a {kind} proxy");

        // Resolve every artifact up front so that nothing is deployed for an
        // unknown contract
        let logic_artifact = self.artifacts.resolve(contract_name)?;
        self.artifacts.resolve(kind.proxy_contract())?;
        if *kind == ProxyKind::Beacon {
            self.artifacts.resolve(UPGRADEABLE_BEACON_CONTRACT)?;
        }

        let init_data = encode_initializer(&logic_artifact.abi, descriptor, offchain_signer)?;

        let (logic, _) = self.deploy_contract(contract_name, Bytes::new(), signer).await?;
        info!("{contract_name} implementation deployed at {logic:#x}");

        let (proxy, receipt) = match kind {
            ProxyKind::Uups => {
                let args = (logic, init_data).abi_encode_params();
                self.deploy_contract(ERC1967_PROXY_CONTRACT, args.into(), signer).await?
            }
            ProxyKind::Transparent => {
                let args = (logic, signer.address(), init_data).abi_encode_params();
                self.deploy_contract(kind.proxy_contract(), args.into(), signer).await?
            }
            ProxyKind::Beacon => {
                let args = (logic, signer.address()).abi_encode_params();
                let (beacon, _) =
                    self.deploy_contract(UPGRADEABLE_BEACON_CONTRACT, args.into(), signer).await?;
                debug!("Beacon deployed at {beacon:#x}");

                let args = (beacon, init_data).abi_encode_params();
                self.deploy_contract(kind.proxy_contract(), args.into(), signer).await?
            }
        };
        info!("{contract_name} proxy deployed at {proxy:#x}");

        let instance = self
            .instance_after(proxy, *kind, logic, receipt.transaction_hash)
            .await?;
        info!("{}", DeploymentReport::new(contract_name, &instance, &receipt));

        Ok(instance)
    }

    /// Call the described initializer on an existing proxy.
    ///
    /// Proxies are initialized on deployment, so against a proxy returned by
    /// [`Deployer::deploy`] this fails with
    /// [`RevertReason::AlreadyInitialized`].
    pub async fn initialize(
        &self,
        proxy: Address,
        descriptor: &DeploymentDescriptor,
        signer: &PrivateKeySigner,
        offchain_signer: Address,
    ) -> Result<TxReceipt, ScriptError> {
        let artifact = self.artifacts.resolve(&descriptor.contract_name)?;
        let init_data = encode_initializer(&artifact.abi, descriptor, offchain_signer)?;

        debug!("Initializing {} at {proxy:#x}", descriptor.contract_name);
        self.send(proxy, init_data, signer).await
    }

    // -----------
    // | UPGRADE |
    // -----------

    /// Deploy `new_contract_name` and point the proxy at it.
    ///
    /// The signer must be the proxy's upgrade authority; this is checked
    /// before anything is deployed. On failure the proxy keeps its current
    /// implementation.
    pub async fn upgrade(
        &self,
        proxy: Address,
        new_contract_name: &str,
        signer: &PrivateKeySigner,
    ) -> Result<DeployedInstance, ScriptError> {
        self.artifacts.resolve(new_contract_name)?;

        let kind = self.detect_proxy_kind(proxy).await?;
        let (owner, admin) = self.resolve_upgrade_authority(proxy, kind).await?;
        if owner != signer.address() {
            return Err(ScriptError::UnauthorizedUpgrade {
                signer: signer.address(),
                owner,
            });
        }

        debug!("Upgrading {kind} proxy {proxy:#x} to {new_contract_name}");
        let (implementation, _) =
            self.deploy_contract(new_contract_name, Bytes::new(), signer).await?;
        info!("{new_contract_name} implementation deployed at {implementation:#x}");

        let (target, calldata) = match kind {
            ProxyKind::Uups => (
                proxy,
                IUUPSUpgradeable::upgradeToAndCallCall {
                    newImplementation: implementation,
                    data: Bytes::new(),
                }
                .abi_encode(),
            ),
            ProxyKind::Transparent => (
                admin.ok_or_else(|| missing_admin(proxy))?,
                IProxyAdmin::upgradeAndCallCall {
                    proxy,
                    implementation,
                    data: Bytes::new(),
                }
                .abi_encode(),
            ),
            ProxyKind::Beacon => (
                admin.ok_or_else(|| missing_admin(proxy))?,
                IUpgradeableBeacon::upgradeToCall {
                    newImplementation: implementation,
                }
                .abi_encode(),
            ),
        };

        let receipt = self
            .send(target, calldata.into(), signer)
            .await
            .map_err(|e| match e {
                ScriptError::DeploymentFailed(RevertReason::Unauthorized(account)) => {
                    ScriptError::UnauthorizedUpgrade {
                        signer: account,
                        owner,
                    }
                }
                e => e,
            })?;

        let instance = self
            .instance_after(proxy, kind, implementation, receipt.transaction_hash)
            .await?;
        info!(
            "{}",
            DeploymentReport::new(new_contract_name, &instance, &receipt)
        );

        Ok(instance)
    }

    // -------------
    // | INSPECTION |
    // -------------

    /// The implementation currently live behind the proxy, read from chain
    pub async fn resolve_implementation(
        &self,
        proxy: Address,
        kind: ProxyKind,
    ) -> Result<Address, ScriptError> {
        match kind {
            ProxyKind::Uups | ProxyKind::Transparent => {
                self.read_address_slot(proxy, IMPLEMENTATION_STORAGE_SLOT).await
            }
            ProxyKind::Beacon => {
                let beacon = self.read_address_slot(proxy, BEACON_STORAGE_SLOT).await?;
                self.view_address(beacon, IUpgradeableBeacon::implementationCall {}.abi_encode())
                    .await
            }
        }
    }

    /// The account allowed to upgrade the proxy, along with the contract it
    /// upgrades through (the `ProxyAdmin` or the beacon), if any
    pub async fn resolve_upgrade_authority(
        &self,
        proxy: Address,
        kind: ProxyKind,
    ) -> Result<(Address, Option<Address>), ScriptError> {
        let admin = match kind {
            ProxyKind::Uups => None,
            ProxyKind::Transparent => {
                Some(self.read_address_slot(proxy, PROXY_ADMIN_STORAGE_SLOT).await?)
            }
            ProxyKind::Beacon => Some(self.read_address_slot(proxy, BEACON_STORAGE_SLOT).await?),
        };

        let owner = self
            .view_address(admin.unwrap_or(proxy), IOwnable::ownerCall {}.abi_encode())
            .await?;
        Ok((owner, admin))
    }

    /// Infer the kind of a proxy from the EIP-1967 slots it populates
    pub async fn detect_proxy_kind(&self, proxy: Address) -> Result<ProxyKind, ScriptError> {
        if !self.read_address_slot(proxy, BEACON_STORAGE_SLOT).await?.is_zero() {
            return Ok(ProxyKind::Beacon);
        }
        if !self.read_address_slot(proxy, PROXY_ADMIN_STORAGE_SLOT).await?.is_zero() {
            return Ok(ProxyKind::Transparent);
        }
        if !self.read_address_slot(proxy, IMPLEMENTATION_STORAGE_SLOT).await?.is_zero() {
            return Ok(ProxyKind::Uups);
        }

        Err(ScriptError::ContractInteraction(format!(
            "{proxy:#x} is not an EIP-1967 proxy"
        )))
    }

    // -----------
    // | HELPERS |
    // -----------

    /// Build the record of a proxy after a deployment or upgrade that
    /// installed `expected_implementation`
    async fn instance_after(
        &self,
        proxy: Address,
        kind: ProxyKind,
        expected_implementation: Address,
        deployment_tx: TxHash,
    ) -> Result<DeployedInstance, ScriptError> {
        let implementation = self.resolve_implementation(proxy, kind).await?;
        if implementation != expected_implementation {
            warn!(
                "Proxy {proxy:#x} points at {implementation:#x}, expected {expected_implementation:#x}"
            );
        }

        let (owner, admin) = self.resolve_upgrade_authority(proxy, kind).await?;

        Ok(DeployedInstance {
            proxy,
            implementation,
            deployment_tx,
            owner,
            kind,
            admin,
        })
    }

    /// Deploy the named contract with the given ABI-encoded constructor
    /// arguments, returning its address
    async fn deploy_contract(
        &self,
        name: &str,
        constructor_args: Bytes,
        signer: &PrivateKeySigner,
    ) -> Result<(Address, TxReceipt), ScriptError> {
        let artifact = self.artifacts.resolve(name)?;
        if !artifact.is_deployable() {
            return Err(ScriptError::ArtifactParsing(format!(
                "{name} has no creation bytecode"
            )));
        }

        let code: Bytes = [artifact.bytecode.as_ref(), constructor_args.as_ref()]
            .concat()
            .into();
        let tx = TransactionRequest::default().with_deploy_code(code);

        let tx_hash = self.client.submit(signer, tx.clone()).await?;
        debug!("{name} deployment submitted in {tx_hash:#x}");

        let receipt = self.confirm(tx_hash, tx).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractInteraction(format!("no contract created by {tx_hash:#x}"))
        })?;

        Ok((address, receipt))
    }

    /// Send a call to the given contract and wait for it to be mined
    async fn send(
        &self,
        to: Address,
        calldata: Bytes,
        signer: &PrivateKeySigner,
    ) -> Result<TxReceipt, ScriptError> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);
        let tx_hash = self.client.submit(signer, tx.clone()).await?;
        self.confirm(tx_hash, tx).await
    }

    /// Wait on a transaction, failing with its revert reason if it was mined
    /// but reverted
    async fn confirm(
        &self,
        tx_hash: TxHash,
        tx: TransactionRequest,
    ) -> Result<TxReceipt, ScriptError> {
        let receipt = wait_for_receipt(&self.client, tx_hash, self.wait, &self.cancel).await?;
        if !receipt.status {
            let reason = self.replay_revert(&receipt, tx).await;
            return Err(ScriptError::DeploymentFailed(reason));
        }

        debug!(
            "{tx_hash:#x} mined in block {} using {} gas",
            receipt.block_number, receipt.gas_used
        );
        Ok(receipt)
    }

    /// Recover the revert reason of a failed transaction by replaying it on
    /// top of the parent block of its receipt
    async fn replay_revert(&self, receipt: &TxReceipt, tx: TransactionRequest) -> RevertReason {
        let tx = tx.with_from(receipt.from);
        let parent_block = receipt.block_number.saturating_sub(1);

        match self.client.call_at(tx, parent_block).await {
            Err(ChainError::Reverted(data)) if !data.is_empty() => {
                RevertReason::from_revert_data(&data)
            }
            outcome => {
                debug!(
                    "Replay of {:#x} gave no revert data: {outcome:?}",
                    receipt.transaction_hash
                );
                RevertReason::TransactionFailed(receipt.transaction_hash)
            }
        }
    }

    /// Read an EIP-1967 slot holding an address
    async fn read_address_slot(&self, address: Address, slot: B256) -> Result<Address, ScriptError> {
        let word = self.client.storage_at(address, slot).await?;
        Ok(address_from_word(word))
    }

    /// Call a view function returning a single address
    async fn view_address(&self, to: Address, calldata: Vec<u8>) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);
        let output = self.client.call(tx).await?;

        Address::abi_decode(&output).map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }
}

/// The error raised when a proxy lost track of its admin or beacon
fn missing_admin(proxy: Address) -> ScriptError {
    ScriptError::ContractInteraction(format!("{proxy:#x} has no upgrade admin"))
}

// ---------------
// | INITIALIZER |
// ---------------

/// ABI-encode the initializer call of a deployment.
///
/// The initializer's parameters are the descriptor's textual arguments,
/// coerced to the parameter types, followed by a trailing `address`
/// parameter receiving `offchain_signer`.
pub fn encode_initializer(
    abi: &JsonAbi,
    descriptor: &DeploymentDescriptor,
    offchain_signer: Address,
) -> Result<Bytes, ScriptError> {
    let function = find_initializer(abi, descriptor)?;

    let Some((trusted_signer, params)) = function.inputs.split_last() else {
        return Err(ScriptError::CalldataConstruction(format!(
            "{} takes no offchain signer",
            function.signature()
        )));
    };
    if trusted_signer.ty != "address" {
        return Err(ScriptError::CalldataConstruction(format!(
            "last parameter of {} is not an address",
            function.signature()
        )));
    }
    if params.len() != descriptor.init_args.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "{} expects {} arguments before the offchain signer, got {}",
            function.signature(),
            params.len(),
            descriptor.init_args.len()
        )));
    }

    let mut values = params
        .iter()
        .zip(&descriptor.init_args)
        .map(|(param, arg)| {
            DynSolType::parse(&param.selector_type())
                .and_then(|ty| ty.coerce_str(arg))
                .map_err(|e| ScriptError::CalldataConstruction(format!("{}: {e}", param.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    values.push(DynSolValue::Address(offchain_signer));

    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// Find the initializer named by the descriptor, either by full signature or
/// by name and arity
fn find_initializer<'a>(
    abi: &'a JsonAbi,
    descriptor: &DeploymentDescriptor,
) -> Result<&'a Function, ScriptError> {
    let initializer = descriptor.initializer.as_str();

    let found = if initializer.contains('(') {
        abi.functions().find(|f| f.signature() == initializer)
    } else {
        let arity = descriptor.init_args.len() + 1;
        abi.function(initializer)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
    };

    found.ok_or_else(|| {
        ScriptError::CalldataConstruction(format!(
            "{} has no initializer {initializer} taking {} arguments and an offchain signer",
            descriptor.contract_name,
            descriptor.init_args.len()
        ))
    })
}
