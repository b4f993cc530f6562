//! Text embedders used by the vector index.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::core::config::{EmbeddingProviderKind, EmbeddingSettings};
use crate::core::errors::ApiError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name for logs (e.g. "hash", "openai").
    fn name(&self) -> &str;

    /// Embeds each input; the result has one vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Upstream("embedder returned no vector".to_string()))
    }
}

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, ApiError> {
    match settings.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimensions))),
        EmbeddingProviderKind::OpenAi => {
            let api_key = settings.api_key.clone().ok_or_else(|| {
                ApiError::BadRequest(
                    "embedding.provider is 'openai' but no API key is configured".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                settings.base_url.clone(),
                settings.model.clone(),
                Some(api_key),
            )?))
        }
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Unigrams and adjacent-word bigrams are hashed into a fixed number of
/// buckets and the vector is L2-normalised, so cosine similarity reflects
/// shared vocabulary. Needs no network and gives identical vectors across runs.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let bucket = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % self.dimensions;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|input| self.embed_text(input)).collect())
    }
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(ApiError::upstream)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "Embedding response had {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn hash_embedding_is_deterministic_and_normalised() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("Model Context Protocol servers");
        let b = embedder.embed_text("Model Context Protocol servers");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(approx_eq(norm, 1.0));
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_text("how do retrieval pipelines rank chunks");
        let related = embedder.embed_text("Retrieval pipelines rank chunks by similarity.");
        let unrelated = embedder.embed_text("Bake the bread at two hundred degrees.");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let vector = embedder.embed_text("  ... ");
        assert!(vector.iter().all(|v| *v == 0.0));
        assert_eq!(cosine_similarity(&vector, &vector), 0.0);
    }

    #[test]
    fn cosine_handles_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]), 1.0));
    }

    #[tokio::test]
    async fn openai_embedder_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2]},{"embedding":[0.3,0.4]}]}"#)
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new(
            server.url(),
            "text-embedding-3-small".to_string(),
            Some("sk-test".to_string()),
        )
        .unwrap();
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert!(approx_eq(vectors[1][0], 0.3));
    }

    #[tokio::test]
    async fn openai_embedder_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new(server.url(), "m".to_string(), None).unwrap();
        let err = embedder.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
