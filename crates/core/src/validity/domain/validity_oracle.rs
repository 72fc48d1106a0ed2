use thiserror::Error;

use crate::shared::frame::Frame;

use super::frame_check::FrameCheck;
use super::verdict::Verdict;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("validity oracle used before initialization")]
    NotInitialized,
    #[error("validity oracle is already initialized")]
    AlreadyInitialized,
    #[error("frame {index} check failed: {message}")]
    Check { index: usize, message: String },
}

/// Judges whether a frame may belong to a fragment.
///
/// Starts uninitialized; `initialize` installs the ordered criteria exactly
/// once. The first criterion that rejects a frame decides the verdict.
pub struct ValidityOracle {
    checks: Option<Vec<Box<dyn FrameCheck>>>,
}

impl ValidityOracle {
    pub fn new() -> Self {
        Self { checks: None }
    }

    pub fn initialize(&mut self, checks: Vec<Box<dyn FrameCheck>>) -> Result<(), OracleError> {
        if self.checks.is_some() {
            return Err(OracleError::AlreadyInitialized);
        }
        self.checks = Some(checks);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.checks.is_some()
    }

    pub fn check(
        &mut self,
        frame: &Frame,
        previous: Option<&Frame>,
    ) -> Result<Verdict, OracleError> {
        let checks = self.checks.as_mut().ok_or(OracleError::NotInitialized)?;
        for check in checks.iter_mut() {
            let verdict = check
                .check(frame, previous)
                .map_err(|e| OracleError::Check {
                    index: frame.index(),
                    message: e.to_string(),
                })?;
            if !verdict.is_valid() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Valid)
    }
}

impl Default for ValidityOracle {
    fn default() -> Self {
        Self::new()
    }
}
