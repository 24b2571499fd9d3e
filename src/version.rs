// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Lodestone gateway

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Full version string
pub fn get_version_string() -> String {
    format!("lodestone-gateway v{}", VERSION_NUMBER)
}
