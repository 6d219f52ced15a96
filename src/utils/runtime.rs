use anyhow::Result;

/// Runtime for the CLI. Commands run one after another on the calling thread.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
