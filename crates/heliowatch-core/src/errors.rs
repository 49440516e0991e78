// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Error taxonomy for the orchestration layer
//!
//! Telemetry provider failures are deliberately absent here: they are
//! recovered locally (stale data + `error` status) and never terminate
//! an enclosing operation. Weather and classifier failures do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Resource absent or not owned by the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// Weather or classifier service unreachable or unusable.
    #[error("{service} error: {message}")]
    Upstream { service: String, message: String },

    /// Request rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
