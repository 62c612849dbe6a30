//! Signal handling for cooperative cancellation in plain mode.

use std::thread;

use cursor_installer_core::CancelFlag;
use tokio::signal;
use tracing::warn;

use crate::actions::LogSink;

async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Set `cancel` on SIGINT or SIGTERM; the running step finishes first.
pub(super) fn cancel_on_signal(cancel: CancelFlag, log: LogSink) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(?err, "signal listener unavailable");
                return;
            }
        };
        runtime.block_on(shutdown_signal());
        cancel.cancel();
        log.line("Cancellation requested; stopping after the current step.");
    });
}
