//! # Host power-off signal.
//!
//! On the device, power-off arrives through the shell or a key handler calling
//! [`Orchestrator::shutdown`](crate::Orchestrator::shutdown). Simulator and CI builds
//! get the same path from a process signal through
//! [`Orchestrator::run_until_signal`](crate::Orchestrator::run_until_signal).
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

/// Resolves with the name of the first power-off signal received.
#[cfg(unix)]
pub(super) async fn power_off_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub(super) async fn power_off_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
