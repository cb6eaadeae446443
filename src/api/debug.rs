use std::{
    env,
    future::Future,
    sync::OnceLock,
    time::{Duration, Instant},
};

const DEBUG_DELAY_ENV: &str = "SEGSCOPE_DEBUG_API_DELAY_MS";

pub async fn send_api_request<F, Fut, T, E>(send: F) -> (Result<T, E>, Duration)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    debug_api_delay().await;
    let started = Instant::now();
    let result = send().await;
    (result, started.elapsed())
}

async fn debug_api_delay() {
    if let Some(delay) = debug_api_delay_duration() {
        tracing::trace!(delay_ms = delay.as_millis(), "Applying debug API delay");
        tokio::time::sleep(delay).await;
    }
}

fn debug_api_delay_duration() -> Option<Duration> {
    static DELAY: OnceLock<Option<Duration>> = OnceLock::new();
    *DELAY.get_or_init(|| parse_delay(env::var(DEBUG_DELAY_ENV).ok().as_deref()))
}

fn parse_delay(raw: Option<&str>) -> Option<Duration> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!(
                env = DEBUG_DELAY_ENV,
                value = %raw,
                "Invalid API debug delay"
            );
            None
        }
    }
}
