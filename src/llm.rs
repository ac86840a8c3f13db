//! Language model backends
//!
//! One registered backend: `llama_cpp`, in-process GGUF inference via
//! llama-cpp-2. A fresh context is created per chat call; the KV cache is
//! small for single-turn prompts and this keeps the model borrow scoped.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::OnceLock;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::LlamaModel;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::sampling::LlamaSampler;

use crate::config::LlmConfig;
use crate::registry;
use crate::{Error, Result};

/// Fixed system prompt for assistant replies
const SYSTEM_PROMPT: &str = "You are concise and helpful.";

/// llama_backend_init() is process-global; initialize once and never free
/// while models are live.
static LLAMA_BACKEND: OnceLock<LlamaBackend> = OnceLock::new();

fn llama_backend() -> Result<&'static LlamaBackend> {
    if let Some(backend) = LLAMA_BACKEND.get() {
        return Ok(backend);
    }
    let backend = LlamaBackend::init()
        .map_err(|e| Error::Llm(format!("failed to init llama backend: {e:?}")))?;
    Ok(LLAMA_BACKEND.get_or_init(|| backend))
}

/// LLM stage capability: prompt in, reply out
pub trait ChatModel {
    /// Generate a reply for one user utterance
    ///
    /// # Errors
    ///
    /// Returns error if inference fails
    fn chat(&mut self, user_text: &str) -> Result<String>;
}

impl std::fmt::Debug for dyn ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ChatModel")
    }
}

/// llama.cpp chat completion
pub struct LlamaChat {
    model: LlamaModel,
    n_ctx: u32,
    max_tokens: u32,
}

impl LlamaChat {
    /// Load a GGUF model file
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the model file is missing or fails to load
    pub fn new(model_path: &Path, n_ctx: u32, n_gpu_layers: u32, max_tokens: u32) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::Unavailable(format!(
                "GGUF model not found: {}",
                model_path.display()
            )));
        }

        let backend = llama_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(n_gpu_layers);

        tracing::info!(model = %model_path.display(), n_gpu_layers, "loading GGUF model");
        let model = LlamaModel::load_from_file(backend, model_path, &model_params)
            .map_err(|e| Error::Unavailable(format!("failed to load GGUF model: {e:?}")))?;

        Ok(Self {
            model,
            n_ctx,
            max_tokens,
        })
    }
}

impl ChatModel for LlamaChat {
    fn chat(&mut self, user_text: &str) -> Result<String> {
        let backend = llama_backend()?;

        // Disable flash attention to avoid a ggml symbol conflict with
        // whisper-rs-sys when both engines are linked.
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_batch(2048)
            .with_flash_attention_policy(0);

        let mut ctx = self
            .model
            .new_context(backend, ctx_params)
            .map_err(|e| Error::Llm(format!("failed to create context: {e:?}")))?;

        let prompt = format!("{SYSTEM_PROMPT}\n\nUser: {user_text}\nAssistant:");
        let tokens = self
            .model
            .str_to_token(&prompt, llama_cpp_2::model::AddBos::Always)
            .map_err(|e| Error::Llm(format!("tokenization failed: {e:?}")))?;

        let mut batch = LlamaBatch::new(2048, 1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let last_index = tokens.len() as i32 - 1;
        for (i, token) in (0_i32..).zip(tokens) {
            batch
                .add(token, i, &[0], i == last_index)
                .map_err(|e| Error::Llm(format!("batch add failed: {e:?}")))?;
        }

        ctx.decode(&mut batch)
            .map_err(|e| Error::Llm(format!("prompt decode failed: {e:?}")))?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::temp(0.7),
            LlamaSampler::top_p(0.9, 1),
            LlamaSampler::dist(42),
        ]);

        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut output = String::new();
        let mut n_cur = batch.n_tokens();

        for _ in 0..self.max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            // Render special tokens rather than failing on them; skip any
            // token that still cannot be decoded.
            match self.model.token_to_piece(token, &mut decoder, true, None) {
                Ok(piece) => output.push_str(&piece),
                Err(e) => {
                    tracing::debug!(token = token.0, error = ?e, "skipping undecodable token");
                    continue;
                }
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| Error::Llm(format!("batch add failed: {e:?}")))?;
            n_cur += 1;

            ctx.decode(&mut batch)
                .map_err(|e| Error::Llm(format!("decode failed: {e:?}")))?;
        }

        let reply = output.trim().to_string();
        tracing::info!(chars = reply.len(), "reply generated");
        Ok(reply)
    }
}

type LlmCtor = fn(&LlmConfig) -> Result<Box<dyn ChatModel>>;

const LLM_BACKENDS: &[(&str, LlmCtor)] = &[("llama_cpp", make_llama)];

/// Construct the configured LLM backend
///
/// # Errors
///
/// Returns `Config` for an unknown backend name, or whatever the
/// backend constructor reports for missing prerequisites
pub fn make_llm(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    let ctor = registry::lookup("llm", LLM_BACKENDS, &config.backend)?;
    ctor(config)
}

fn make_llama(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    let settings = config.llama_cpp.as_ref().ok_or_else(|| {
        Error::Config("missing 'llm.llama_cpp' section in configuration".to_string())
    })?;
    Ok(Box::new(LlamaChat::new(
        &settings.model_path,
        settings.n_ctx,
        settings.n_gpu_layers,
        settings.max_tokens,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_is_config_error() {
        let config = LlmConfig {
            backend: "mistral_rs".to_string(),
            llama_cpp: None,
        };
        let err = make_llm(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn llama_requires_section() {
        let config = LlmConfig {
            backend: "llama_cpp".to_string(),
            llama_cpp: None,
        };
        let err = make_llm(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
