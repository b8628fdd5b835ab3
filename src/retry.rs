macro_rules! retry_provider_request {
    ($context:expr, $delay:expr, $operation:expr) => {{
        const MAX_ATTEMPTS: u32 = 3;

        let context_value: String = $context.into();
        let delay: std::time::Duration = $delay;
        let mut attempt = 1;

        loop {
            match ($operation).await {
                Ok(value) => break Ok(value),
                Err(err) if attempt >= MAX_ATTEMPTS || !err.is_retryable() => break Err(err),
                Err(err) => {
                    log::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {}ms.",
                        attempt,
                        MAX_ATTEMPTS,
                        context_value,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }};
}

pub(crate) use retry_provider_request;
