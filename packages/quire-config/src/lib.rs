mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Engine, LlmProviderConfig, ProviderConfig, Providers,
	Retrieval, Service, Session, Timeouts,
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
	if cfg.session.max_messages_per_session == 0 {
		return Err(Error::Validation {
			message: "session.max_messages_per_session must be greater than zero.".to_string(),
		});
	}
	if cfg.session.ttl_hours <= 0 {
		return Err(Error::Validation {
			message: "session.ttl_hours must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.raptor_top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.raptor_top_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.retrieval.min_raptor_score.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.min_raptor_score must be a finite number.".to_string(),
		});
	}
	if cfg.retrieval.candidate_k < cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be at least retrieval.top_k.".to_string(),
		});
	}
	if cfg.retrieval.raptor_candidate_k < cfg.retrieval.raptor_top_k {
		return Err(Error::Validation {
			message: "retrieval.raptor_candidate_k must be at least retrieval.raptor_top_k."
				.to_string(),
		});
	}

	for (label, value) in [
		("timeouts.probe_ms", cfg.timeouts.probe_ms),
		("timeouts.chunk_fetch_ms", cfg.timeouts.chunk_fetch_ms),
		("timeouts.summary_fetch_ms", cfg.timeouts.summary_fetch_ms),
		("timeouts.rerank_ms", cfg.timeouts.rerank_ms),
		("timeouts.load_nodes_ms", cfg.timeouts.load_nodes_ms),
		("timeouts.completion_ms", cfg.timeouts.completion_ms),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number of zero or greater."
				.to_string(),
		});
	}

	let mut keys = vec![
		("embedding", cfg.providers.embedding.api_key.as_str()),
		("llm", cfg.providers.llm.api_key.as_str()),
	];

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		keys.push(("rerank", rerank.api_key.as_str()));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
	if cfg.providers.rerank.as_ref().map(|rerank| rerank.api_base.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.rerank = None;
	}
	if cfg.engine.system_prompt.as_deref().map(|prompt| prompt.trim().is_empty()).unwrap_or(false) {
		cfg.engine.system_prompt = None;
	}

	cfg.retrieval.candidate_k = cfg.retrieval.candidate_k.max(cfg.retrieval.top_k);
	cfg.retrieval.raptor_candidate_k =
		cfg.retrieval.raptor_candidate_k.max(cfg.retrieval.raptor_top_k);
}
