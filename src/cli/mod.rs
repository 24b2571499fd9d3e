// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;

use crate::config::{resolve_listen_addr, GatewayConfig};

/// Lodestone gateway
#[derive(Parser, Debug)]
#[command(name = "lodestone-gateway")]
#[command(version)]
#[command(about = "JSON API in front of the Lodestone character database", long_about = None)]
pub struct Cli {
    /// Listen address, `:8080` binds every interface
    pub addr: Option<String>,

    /// Port to bind on every interface, overrides the listen address
    #[arg(long, env = "PORT")]
    pub port: Option<String>,

    /// Lodestone region (eu, na, jp, fr, de)
    #[arg(long, env = "LODESTONE_REGION")]
    pub region: Option<String>,

    /// Disable the upstream document cache
    #[arg(long)]
    pub no_cache: bool,
}

impl Cli {
    /// Apply command line overrides on top of `config`
    pub fn apply(&self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(addr) = resolve_listen_addr(self.addr.as_deref(), self.port.as_deref()) {
            config.listen_addr = addr;
        }
        if let Some(region) = self.region.as_ref().filter(|r| !r.is_empty()) {
            config.region = region.clone();
        }
        if self.no_cache {
            config.upstream_cache_enabled = false;
        }
        config
    }
}
