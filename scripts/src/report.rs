//! The human-readable summary printed after a deployment or an upgrade

use std::fmt::{self, Display, Formatter};

use contracts_common::types::{DeployedInstance, ProxyKind};

use crate::chain::TxReceipt;

/// A summary of a proxy's state after the transaction that last changed it
pub struct DeploymentReport<'a> {
    /// The logic contract behind the proxy
    pub contract_name: &'a str,
    /// The resulting deployment
    pub instance: &'a DeployedInstance,
    /// The receipt of the deployment or upgrade transaction
    pub receipt: &'a TxReceipt,
}

impl<'a> DeploymentReport<'a> {
    /// Summarize the given deployment
    pub fn new(
        contract_name: &'a str,
        instance: &'a DeployedInstance,
        receipt: &'a TxReceipt,
    ) -> Self {
        Self {
            contract_name,
            instance,
            receipt,
        }
    }
}

impl Display for DeploymentReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let DeployedInstance {
            proxy,
            implementation,
            owner,
            kind,
            admin,
            ..
        } = self.instance;

        writeln!(f, "{} ({kind} proxy)", self.contract_name)?;
        writeln!(f, "  proxy:          {proxy:#x}")?;
        writeln!(f, "  implementation: {implementation:#x}")?;
        writeln!(f, "  owner:          {owner:#x}")?;
        if let Some(admin) = admin {
            let label = match kind {
                ProxyKind::Beacon => "beacon:        ",
                _ => "proxy admin:   ",
            };
            writeln!(f, "  {label} {admin:#x}")?;
        }

        let status = if self.receipt.status { "success" } else { "failed" };
        writeln!(f, "  transaction:    {:#x}", self.receipt.transaction_hash)?;
        writeln!(f, "  block:          {}", self.receipt.block_number)?;
        writeln!(f, "  gas used:       {}", self.receipt.gas_used)?;
        write!(f, "  status:         {status}")
    }
}
