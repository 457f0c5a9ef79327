use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Select};
use merj_core::config::{Config, StoreBackend};

pub(crate) struct WizardState {
    pub(crate) embedding_model: String,
    pub(crate) embedding_base_url: String,
    pub(crate) backend: StoreBackend,
    pub(crate) qdrant_url: String,
    pub(crate) k: u64,
    pub(crate) distance_threshold: f32,
    pub(crate) max_context_length: Option<usize>,
    pub(crate) collection_prefix: String,
}

impl Default for WizardState {
    fn default() -> Self {
        let config = Config::default();
        Self {
            embedding_model: config.embedding.model,
            embedding_base_url: config.embedding.base_url,
            backend: config.store.backend,
            qdrant_url: config.store.qdrant_url,
            k: config.retrieval.k,
            distance_threshold: config.retrieval.distance_threshold,
            max_context_length: config.retrieval.max_context_length,
            collection_prefix: config.index.collection_prefix,
        }
    }
}

/// Write a configuration file. With `accept_defaults` no prompt is shown
/// and an existing file is overwritten.
///
/// # Errors
///
/// Returns an error if a prompt fails or the file cannot be written.
pub fn run(output: Option<PathBuf>, accept_defaults: bool) -> anyhow::Result<()> {
    let mut state = WizardState::default();

    if !accept_defaults {
        println!("merj init - configuration wizard\n");
        step_embedding(&mut state)?;
        step_store(&mut state)?;
        step_retrieval(&mut state)?;
    }

    let config = build_config(&state);
    config.validate()?;
    let toml_str = config.to_toml()?;

    let default_path = PathBuf::from("config/default.toml");
    let path = match output {
        Some(path) => path,
        None if accept_defaults => default_path,
        None => Input::new()
            .with_prompt("Write config to")
            .default(default_path.display().to_string())
            .interact_text()
            .map(PathBuf::from)
            .unwrap_or(default_path),
    };

    if !accept_defaults {
        println!("--- Generated config ---");
        println!("{toml_str}");
        println!("------------------------\n");

        if path.exists() {
            let overwrite = Confirm::new()
                .with_prompt(format!("{} already exists. Overwrite?", path.display()))
                .default(false)
                .interact()?;
            if !overwrite {
                println!("Aborted.");
                return Ok(());
            }
        }
    }

    write_config(&path, &toml_str)?;
    println!("Config written to {}", path.display());
    println!("\nSet your Voyage AI key before embedding:\n  export VOYAGE_API_KEY=<key>");
    Ok(())
}

fn step_embedding(state: &mut WizardState) -> anyhow::Result<()> {
    println!("== Step 1/3: Embeddings ==\n");
    state.embedding_model = Input::new()
        .with_prompt("Voyage model")
        .default(state.embedding_model.clone())
        .interact_text()?;
    state.embedding_base_url = Input::new()
        .with_prompt("API base URL")
        .default(state.embedding_base_url.clone())
        .interact_text()?;
    println!();
    Ok(())
}

fn step_store(state: &mut WizardState) -> anyhow::Result<()> {
    println!("== Step 2/3: Vector store ==\n");
    let backends = ["qdrant", "memory (not persisted between runs)"];
    let selection = Select::new()
        .with_prompt("Backend")
        .items(backends)
        .default(0)
        .interact()?;
    state.backend = if selection == 0 {
        StoreBackend::Qdrant
    } else {
        StoreBackend::Memory
    };
    if state.backend == StoreBackend::Qdrant {
        state.qdrant_url = Input::new()
            .with_prompt("Qdrant gRPC URL")
            .default(state.qdrant_url.clone())
            .interact_text()?;
    }
    println!();
    Ok(())
}

fn step_retrieval(state: &mut WizardState) -> anyhow::Result<()> {
    println!("== Step 3/3: Retrieval ==\n");
    state.k = Input::new()
        .with_prompt("Neighbours per chunk")
        .default(state.k)
        .validate_with(|k: &u64| if *k == 0 { Err("must be at least 1") } else { Ok(()) })
        .interact_text()?;
    state.distance_threshold = Input::new()
        .with_prompt("Maximum distance")
        .default(state.distance_threshold)
        .validate_with(|t: &f32| {
            if t.is_finite() && *t >= 0.0 {
                Ok(())
            } else {
                Err("must be a non-negative number")
            }
        })
        .interact_text()?;
    let max_len: usize = Input::new()
        .with_prompt("Context length limit in characters (0 for none)")
        .default(state.max_context_length.unwrap_or(0))
        .interact_text()?;
    state.max_context_length = (max_len > 0).then_some(max_len);
    println!();
    Ok(())
}

pub(crate) fn build_config(state: &WizardState) -> Config {
    let mut config = Config::default();
    config.embedding.model.clone_from(&state.embedding_model);
    config.embedding.base_url.clone_from(&state.embedding_base_url);
    config.store.backend = state.backend;
    config.store.qdrant_url.clone_from(&state.qdrant_url);
    config.retrieval.k = state.k;
    config.retrieval.distance_threshold = state.distance_threshold;
    config.retrieval.max_context_length = state.max_context_length;
    config.index.collection_prefix.clone_from(&state.collection_prefix);
    config
}

fn write_config(path: &Path, toml_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_builds_default_config() {
        let config = build_config(&WizardState::default());
        let defaults = Config::default();
        assert_eq!(config.embedding.model, defaults.embedding.model);
        assert_eq!(config.store.backend, StoreBackend::Qdrant);
        assert_eq!(config.retrieval.k, defaults.retrieval.k);
        assert!(config.retrieval.max_context_length.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn build_config_applies_answers() {
        let state = WizardState {
            backend: StoreBackend::Memory,
            k: 3,
            distance_threshold: 0.9,
            max_context_length: Some(4000),
            ..WizardState::default()
        };
        let config = build_config(&state);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.retrieval.k, 3);
        assert!((config.retrieval.distance_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_context_length, Some(4000));
    }

    #[test]
    fn run_with_defaults_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("merj.toml");
        run(Some(path.clone()), true).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[retrieval]"));
        assert!(!content.contains("api_key"));
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.retrieval.k, 5);
    }
}
