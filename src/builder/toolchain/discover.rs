//! Toolchain discovery and selection.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::builder::toolchain::probe::{HostProbe, Installation};
use crate::builder::toolchain::{DiscoveryError, Toolchain, ToolchainFamily};
use crate::core::context::BuildContext;
use crate::core::platform::{Architecture, Platform};

/// Build a toolchain for every candidate and validate it, keeping the
/// validation outcome alongside.
///
/// Candidates are `configured` installations first, then whatever
/// `probe` finds. Order is preserved; a later candidate whose name is
/// already taken is dropped.
pub fn probe_toolchains(
    ctx: &BuildContext,
    configured: &[Installation],
    probe: &dyn HostProbe,
) -> Result<Vec<(Toolchain, Result<(), DiscoveryError>)>, DiscoveryError> {
    let host = Platform::host()?;
    let host_arch = Architecture::host()?;

    let mut candidates = configured.to_vec();
    let probed = probe.probe(host, host_arch);
    debug!(
        "{} configured and {} probed toolchain candidate(s) on {}-{}",
        configured.len(),
        probed.len(),
        host,
        host_arch
    );
    candidates.extend(probed);

    let built: Vec<(Toolchain, Result<(), DiscoveryError>)> = candidates
        .par_iter()
        .map(|install| {
            let toolchain = install.to_toolchain(ctx);
            let validation = toolchain.validate(ctx);
            (toolchain, validation)
        })
        .collect();

    let mut names = HashSet::new();
    Ok(built
        .into_iter()
        .filter(|(tc, _)| {
            let fresh = names.insert(tc.name.clone());
            if !fresh {
                debug!("ignoring duplicate toolchain `{}`", tc.name);
            }
            fresh
        })
        .collect())
}

/// Discover every valid toolchain on this host.
///
/// Invalid candidates are logged and dropped. Only an unsupported host is
/// an error.
pub fn discover_system_toolchains(
    ctx: &BuildContext,
    configured: &[Installation],
    probe: &dyn HostProbe,
) -> Result<Vec<Toolchain>, DiscoveryError> {
    let toolchains: Vec<Toolchain> = probe_toolchains(ctx, configured, probe)?
        .into_iter()
        .filter_map(|(tc, validation)| match validation {
            Ok(()) => {
                debug!("toolchain `{}`: {}", tc.name, tc.description);
                Some(tc)
            }
            Err(e) => {
                warn!("skipping toolchain `{}`: {}", tc.name, e);
                None
            }
        })
        .collect();

    info!("discovered {} toolchain(s)", toolchains.len());
    Ok(toolchains)
}

/// Pick a toolchain by name or family and target architecture.
///
/// `name_or_family` matches a toolchain's name exactly or its family
/// (`clang` matches every clang flavour). Without an architecture, a
/// native (non-cross) toolchain is preferred.
pub fn select_toolchain<'a>(
    toolchains: &'a [Toolchain],
    name_or_family: Option<&str>,
    arch: Option<Architecture>,
) -> Option<&'a Toolchain> {
    let matches_name = |tc: &Toolchain| match name_or_family {
        None => true,
        Some(wanted) => {
            tc.name == wanted
                || tc.family.as_str() == wanted
                || (wanted == ToolchainFamily::Clang.as_str() && tc.family.is_clang())
        }
    };

    let mut eligible = toolchains
        .iter()
        .filter(|tc| matches_name(tc))
        .filter(|tc| arch.map_or(true, |a| tc.arch == a));

    match arch {
        Some(_) => eligible.next(),
        None => {
            let eligible: Vec<&Toolchain> = eligible.collect();
            eligible
                .iter()
                .find(|tc| !tc.is_cross_compiler)
                .or_else(|| eligible.first())
                .copied()
        }
    }
}
