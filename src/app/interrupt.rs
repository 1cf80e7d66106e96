use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The process-wide flag set on SIGINT/SIGTERM.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Listens for SIGINT/SIGTERM on a background thread and raises the interrupt flag instead of
/// terminating, so the run unwinds through the normal error path and the device session still
/// gets torn down.
pub fn install_interrupt_handler() -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start signal runtime: {err}"))?;
    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            if runtime.block_on(wait_for_signal()).is_ok() {
                INTERRUPTED.store(true, Ordering::SeqCst);
            }
        })
        .map_err(|err| format!("Failed to spawn signal listener: {err}"))?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
