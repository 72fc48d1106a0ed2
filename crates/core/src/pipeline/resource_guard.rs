use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("failed to spawn release thread for {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("closing {what} failed: {message}")]
    Close { what: String, message: String },
    #[error("closing {what} did not finish within {timeout:?}")]
    TimedOut { what: String, timeout: Duration },
    #[error("closing {what} panicked")]
    Panicked { what: String },
}

/// Closes `resource` on a dedicated thread and waits for the outcome.
///
/// The caller blocks until `close` returns or `timeout` elapses. A close
/// that hangs past the timeout is left running detached; its result is
/// dropped.
pub fn release_guarded<T, F>(
    what: &str,
    resource: T,
    timeout: Duration,
    close: F,
) -> Result<(), ReleaseError>
where
    T: Send + 'static,
    F: FnOnce(T) -> Result<(), String> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);

    std::thread::Builder::new()
        .name(format!("release-{what}"))
        .spawn(move || {
            let result = close(resource);
            let _ = tx.send(result);
        })
        .map_err(|source| ReleaseError::Spawn {
            what: what.to_string(),
            source,
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(message)) => Err(ReleaseError::Close {
            what: what.to_string(),
            message,
        }),
        Err(RecvTimeoutError::Timeout) => Err(ReleaseError::TimedOut {
            what: what.to_string(),
            timeout,
        }),
        // sender dropped without a result: the close call unwound
        Err(RecvTimeoutError::Disconnected) => Err(ReleaseError::Panicked {
            what: what.to_string(),
        }),
    }
}
