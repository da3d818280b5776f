mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ChatProviderConfig, Config, ImageProviderConfig, Limits, ObjectStoreConfig, Postgres,
	PriceOverride, Providers, Service, ShoppingProviderConfig, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.objects.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.objects.api_base must be non-empty.".to_string(),
		});
	}

	for (label, key) in [
		("chat", &cfg.providers.chat.api_key),
		("image", &cfg.providers.image.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if let Some(shopping) = cfg.providers.shopping.as_ref()
		&& shopping.storefront_domain.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "providers.shopping.storefront_domain must be non-empty.".to_string(),
		});
	}
	if cfg.limits.window_secs <= 0 {
		return Err(Error::Validation {
			message: "limits.window_secs must be greater than zero.".to_string(),
		});
	}

	for (label, limit) in [
		("limits.analysis_per_hour", cfg.limits.analysis_per_hour),
		("limits.recommendations_per_hour", cfg.limits.recommendations_per_hour),
		("limits.visualizations_per_hour", cfg.limits.visualizations_per_hour),
	] {
		if limit == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.limits.base_delay_ms == 0 {
		return Err(Error::Validation {
			message: "limits.base_delay_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.limits.max_delay_ms < cfg.limits.base_delay_ms {
		return Err(Error::Validation {
			message: "limits.max_delay_ms must be at least limits.base_delay_ms.".to_string(),
		});
	}

	for (label, price) in &cfg.pricing {
		if price.input_per_million < 0.0
			|| price.output_per_million < 0.0
			|| price.per_unit < 0.0
		{
			return Err(Error::Validation {
				message: format!("pricing.{label} prices must be zero or greater."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	// A shopping section with a blank api_key means enrichment is disabled,
	// not misconfigured.
	if cfg
		.providers
		.shopping
		.as_ref()
		.map(|shopping| shopping.api_key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.shopping = None;
	}
}
