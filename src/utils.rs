use once_cell::sync::Lazy;
use tokio::sync::mpsc;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn spawn_async<F>(fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    RUNTIME.spawn(fut);
}

/// Run `fut` on the runtime and post its output to a view's event queue.
pub fn run_async_to_main<T, Fut>(fut: Fut, tx: mpsc::UnboundedSender<T>)
where
    T: Send + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
{
    spawn_async(async move {
        let res = fut.await;
        let _ = tx.send(res);
    });
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_and_drops_trailing_slash() {
        assert_eq!(normalize_url(" api.medihub.test/ "), "https://api.medihub.test");
        assert_eq!(normalize_url("http://localhost:4000"), "http://localhost:4000");
        assert_eq!(normalize_url("ws://localhost:4000/"), "ws://localhost:4000");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn async_results_reach_the_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_async_to_main(async { 21 * 2 }, tx);
        assert_eq!(rx.blocking_recv(), Some(42));
    }
}
