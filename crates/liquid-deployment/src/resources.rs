//! Resource totals across every job a deployment would run

use crate::error::DeployResult;
use liquid_cluster::ClusterError;
use liquid_types::ResourceRequirement;
use std::collections::BTreeMap;

/// Summed amounts keyed by `"<kind> <resource>"`, e.g. `task MemoryMB`
pub type ResourceTotals = BTreeMap<String, u64>;

/// Sum requirements by kind and resource.
///
/// A requirement without an amount means the scheduler is too old to report
/// it, which is an error rather than a zero.
pub fn sum_requirements<I>(requirements: I) -> DeployResult<ResourceTotals>
where
    I: IntoIterator<Item = ResourceRequirement>,
{
    let mut totals = ResourceTotals::new();

    for requirement in requirements {
        let amount = requirement.amount.ok_or_else(|| {
            ClusterError::decode(
                "scheduler",
                format!(
                    "{} {} has no {}; please update the scheduler",
                    requirement.kind, requirement.owner, requirement.resource
                ),
            )
        })?;

        *totals
            .entry(format!("{} {}", requirement.kind, requirement.resource))
            .or_default() += amount;
    }

    Ok(totals)
}
