//! Retry with exponential backoff and jitter.
//!
//! Each call is independent; there is no circuit breaker. The attempt budget
//! bounds the total number of calls, and only errors the provider error type
//! classifies as retryable consume it; anything else returns immediately.

use std::{future::Future, time::Duration};

use rand::Rng;
use tokio::time as tokio_time;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Total attempt budget, including the first call.
	pub max_retries: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
		Self { max_retries: max_retries.max(1), base_delay, max_delay }
	}

	pub fn from_limits(limits: &decora_config::Limits) -> Self {
		Self::new(
			limits.max_retries,
			Duration::from_millis(limits.base_delay_ms),
			Duration::from_millis(limits.max_delay_ms),
		)
	}

	/// Shopping lookups are best-effort and keep a smaller budget.
	pub fn shopping_from_limits(limits: &decora_config::Limits) -> Self {
		Self::new(
			limits.shopping_max_retries,
			Duration::from_millis(limits.base_delay_ms),
			Duration::from_millis(limits.max_delay_ms),
		)
	}
}

pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt = 0_u32;

	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_retryable() && attempt + 1 < policy.max_retries => {
				let delay = backoff_delay(policy, attempt);

				tracing::warn!(
					label,
					attempt = attempt + 1,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"Provider call failed. Retrying.",
				);
				tokio_time::sleep(delay).await;

				attempt += 1;
			},
			Err(err) => return Err(err),
		}
	}
}

/// `base * 2^attempt`, capped, with up to 30% uniform random jitter added.
fn backoff_delay(policy: RetryPolicy, attempt: u32) -> Duration {
	let exp = attempt.min(16);
	let capped = policy.base_delay.saturating_mul(1_u32 << exp).min(policy.max_delay);
	let jitter = rand::thread_rng().gen_range(0.0..0.3);

	capped.mul_f64(1.0 + jitter)
}
