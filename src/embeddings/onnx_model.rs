// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX sentence-transformer wrapper
//!
//! Runs all-MiniLM-L6-v2 (or any BERT-style sentence encoder exported to ONNX)
//! on the CPU execution provider:
//! - BERT tokenization, truncated to `max_length` tokens
//! - Attention-masked mean pooling over token embeddings
//! - L2 normalization, matching `SentenceTransformer.encode` output

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, Tokenizer};
use tracing::info;

use super::{l2_normalize, TextEmbedder};

/// ONNX-based sentence embedding model
///
/// Cloning is cheap; the session and tokenizer are shared behind `Arc`.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    /// ONNX Runtime session (Mutex because `Session::run` needs exclusive access)
    session: Arc<Mutex<Session>>,

    tokenizer: Arc<Tokenizer>,

    model_name: String,

    /// Output dimension (384 for all-MiniLM-L6-v2)
    dimension: usize,

    /// Maximum sequence length (256 for all-MiniLM-L6-v2)
    max_length: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Load a model and tokenizer from disk and verify the output dimension.
    ///
    /// # Errors
    /// Returns error if either file is missing or invalid, ONNX Runtime fails
    /// to initialise, or a probe inference does not produce `dimension`-wide
    /// token embeddings.
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "all-MiniLM-L6-v2",
    ///     "./models/all-MiniLM-L6-v2-onnx/model.onnx",
    ///     "./models/all-MiniLM-L6-v2-onnx/tokenizer.json",
    ///     384,
    /// ).await?;
    /// ```
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        dimension: usize,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!(
            "Loading embedding model {} from {}",
            model_name,
            model_path.display()
        );

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load ONNX model from {}",
                model_path.display()
            ))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension,
            max_length: 256,
        };

        // Probe inference catches a model/dimension mismatch at start-up
        let probe = model.encode_batch(&["validation probe".to_string()])?;
        if probe.first().map(Vec::len) != Some(dimension) {
            anyhow::bail!(
                "Model {} produced {:?}-dimensional embeddings (expected {})",
                model.model_name,
                probe.first().map(Vec::len),
                dimension
            );
        }

        info!("Embedding model {} ready ({}D)", model.model_name, dimension);
        Ok(model)
    }

    /// Override the token truncation length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length.max(1);
        self
    }

    fn tokenize(&self, text: &str) -> Result<Encoding> {
        self.tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))
    }

    /// Tokenize, pad to the longest item, run one inference and mean-pool.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = texts
            .iter()
            .map(|text| self.tokenize(text))
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = &encoding.get_ids()[..encoding.get_ids().len().min(max_len)];
            let mask = &encoding.get_attention_mask()[..ids.len()];

            input_ids.extend(ids.iter().map(|&id| id as i64));
            attention_mask.extend(mask.iter().map(|&m| m as i64));

            let padding = max_len - ids.len();
            input_ids.extend(std::iter::repeat(0i64).take(padding));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }

        let token_type_ids = vec![0i64; input_ids.len()];
        let pooling_mask = attention_mask.clone();

        let input_ids_array = Array2::from_shape_vec((texts.len(), max_len), input_ids)
            .context("Failed to create input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec((texts.len(), max_len), attention_mask)
            .context("Failed to create attention_mask array")?;
        let token_type_ids_array = Array2::from_shape_vec((texts.len(), max_len), token_type_ids)
            .context("Failed to create token_type_ids array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?,
            "token_type_ids" => Value::from_array(token_type_ids_array)?
        ])?;

        // Token-level output: [batch, seq_len, hidden_dim]
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        if output.ndim() != 3 {
            anyhow::bail!(
                "Model outputs unexpected shape {:?} (expected [batch, seq_len, hidden])",
                output.shape()
            );
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch_idx in 0..texts.len() {
            let item = output.index_axis(Axis(0), batch_idx);
            let seq_len = item.shape()[0];
            let hidden_dim = item.shape()[1];
            let mask = &pooling_mask[batch_idx * max_len..(batch_idx + 1) * max_len];

            let mut pooled = vec![0.0f32; hidden_dim];
            let mut sum_mask = 0.0f32;
            for i in 0..seq_len.min(mask.len()) {
                let weight = mask[i] as f32;
                sum_mask += weight;
                for j in 0..hidden_dim {
                    pooled[j] += item[[i, j]] * weight;
                }
            }
            for value in &mut pooled {
                *value /= sum_mask.max(1e-9);
            }

            l2_normalize(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl TextEmbedder for OnnxEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.encode_batch(&[text.to_string()])?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| anyhow!("Model returned no embedding"))?;
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Unexpected embedding dimension: {} (expected {})",
                embedding.len(),
                self.dimension
            );
        }
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.encode_batch(texts)?;
        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != self.dimension {
                anyhow::bail!(
                    "Unexpected embedding dimension at index {}: {} (expected {})",
                    i,
                    embedding.len(),
                    self.dimension
                );
            }
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
