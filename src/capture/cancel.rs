// SPDX-License-Identifier: GPL-3.0-only

//! Cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::errors::{AppError, AppResult};

/// Shared shutdown request flag
///
/// Clones observe the same flag. The capture loop polls it once per
/// iteration; nothing interrupts a blocking frame wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel this token on Ctrl+C (SIGINT)
    ///
    /// Only one handler can be installed per process.
    pub fn install_interrupt_handler(&self) -> AppResult<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            info!("Interrupt received, shutting down");
            token.cancel();
        })
        .map_err(|e| AppError::Other(format!("Failed to install signal handler: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
