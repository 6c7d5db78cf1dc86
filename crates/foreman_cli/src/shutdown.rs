use console::Term;
use foreman::CancelToken;

/// Set up the Ctrl+C handler for graceful termination.
///
/// The first interrupt cancels the running job through its token; the job
/// finishes the target it is on and skips the rest. A second interrupt
/// force-quits.
pub fn spawn_shutdown_handler(token: CancelToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nCancellation requested, finishing the current project...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Cancellation requested, finishing the current project");
        }

        token.cancel();

        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install second Ctrl+C handler");

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
