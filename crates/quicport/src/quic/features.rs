// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Optional advanced-feature configuration carried by the QUIC manager.
//!
//! A plain validated struct; nothing here changes wire behavior yet, but
//! the manager refuses configurations naming an unsupported version.

use std::fmt;

/// Versions the stack knows how to offer.
const SUPPORTED_VERSIONS: [&str; 3] = ["v1", "v2", "v3"];

/// Errors raised while validating advanced features.
#[derive(Debug)]
pub enum FeatureError {
    /// Version outside the supported set.
    UnsupportedVersion(String),
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => write!(
                f,
                "QUIC version '{}' is not supported; choose from {:?}",
                v, SUPPORTED_VERSIONS
            ),
        }
    }
}

impl std::error::Error for FeatureError {}

/// Advanced QUIC feature toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedFeatures {
    /// Preferred QUIC version, validated against the supported set.
    pub quic_version: Option<String>,
    /// Extension identifiers to offer.
    pub quic_extensions: Vec<String>,
    /// Transport parameters as key/value pairs.
    pub transport_parameters: Vec<(String, String)>,
    /// Priority weights the peer may assign to our streams.
    pub stream_priorities: Vec<u16>,
}

impl AdvancedFeatures {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if let Some(version) = &self.quic_version {
            if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
                return Err(FeatureError::UnsupportedVersion(version.clone()));
            }
        }
        Ok(())
    }

    /// Set the preferred version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.quic_version = Some(version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AdvancedFeatures::default().validate().is_ok());
    }

    #[test]
    fn test_supported_versions_pass() {
        for v in ["v1", "v2", "v3"] {
            assert!(AdvancedFeatures::default().with_version(v).validate().is_ok());
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let features = AdvancedFeatures::default().with_version("v99");
        assert!(matches!(
            features.validate(),
            Err(FeatureError::UnsupportedVersion(_))
        ));
    }
}
