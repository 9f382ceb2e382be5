//! Embedding-service client and the similarity-based attribute extractor.
//!
//! The service exposes two endpoints:
//!
//! - `POST {endpoint}/embed/image` with `{"image": "<base64 PNG>"}` returning
//!   `{"embedding": [...]}`
//! - `POST {endpoint}/embed/text` with `{"texts": [...]}` returning
//!   `{"embeddings": [[...], ...]}`
//!
//! Images are decoded locally first so a corrupt file fails fast without a
//! network round trip.
use super::AttributeExtractor;
use crate::config::EmbeddingConfig;
use crate::error::StageError;
use crate::record::AttributeSet;
use crate::util::read_json_reply;
use crate::vocab::AttributeKey;
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Serialize)]
struct EmbedImageRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct EmbedImageResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct EmbedTextRequest<'a> {
    texts: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedTextResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Blocking HTTP client for the embedding service.
#[derive(Clone)]
pub struct EmbeddingClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Decode an image file and return its L2-normalized embedding.
    pub fn embed_image_file(&self, path: &Path) -> Result<Vec<f32>> {
        let png = encode_png(path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        let url = format!("{}/embed/image", self.endpoint);
        let start = Instant::now();
        let reply = self
            .agent
            .post(&url)
            .send_json(&EmbedImageRequest { image: &encoded })
            .with_context(|| format!("POST {url}"))?;
        let response: EmbedImageResponse = read_json_reply(reply, &url)?;
        tracing::debug!(
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            dims = response.embedding.len(),
            "image embedded"
        );
        normalized(response.embedding)
    }

    /// Return one L2-normalized embedding per input text, in order.
    pub fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embed/text", self.endpoint);
        let reply = self
            .agent
            .post(&url)
            .send_json(&EmbedTextRequest { texts })
            .with_context(|| format!("POST {url}"))?;
        let response: EmbedTextResponse = read_json_reply(reply, &url)?;
        if response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} texts",
                response.embeddings.len(),
                texts.len()
            ));
        }
        response.embeddings.into_iter().map(normalized).collect()
    }
}

fn encode_png(path: &Path) -> Result<Vec<u8>> {
    let image = image::open(path).with_context(|| format!("decode {}", path.display()))?;
    let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());
    let mut png = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| format!("re-encode {}", path.display()))?;
    Ok(png)
}

pub(crate) fn normalized(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if vector.is_empty() || !norm.is_finite() || norm == 0.0 {
        return Err(anyhow!("embedding is empty or has zero norm"));
    }
    for value in &mut vector {
        *value /= norm;
    }
    Ok(vector)
}

/// Dot product of two normalized vectors; `None` when dimensions differ.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

type VocabEmbeddings = Vec<(AttributeKey, Vec<Vec<f32>>)>;

/// Picks, for every attribute key, the vocabulary label closest to the image.
pub struct ClipExtractor {
    client: EmbeddingClient,
    vocab: OnceCell<VocabEmbeddings>,
}

impl ClipExtractor {
    pub fn new(client: EmbeddingClient) -> Self {
        Self {
            client,
            vocab: OnceCell::new(),
        }
    }

    /// Vocabulary embeddings are fetched on first use and kept for the run.
    fn vocab_embeddings(&self) -> Result<&VocabEmbeddings> {
        if let Some(vocab) = self.vocab.get() {
            return Ok(vocab);
        }
        let mut embedded = Vec::with_capacity(AttributeKey::ALL.len());
        for key in AttributeKey::ALL {
            let vectors = self
                .client
                .embed_texts(key.vocabulary())
                .with_context(|| format!("embed {key} vocabulary"))?;
            embedded.push((key, vectors));
        }
        tracing::info!(keys = embedded.len(), "vocabulary embeddings cached");
        Ok(self.vocab.get_or_init(|| embedded))
    }
}

impl AttributeExtractor for ClipExtractor {
    fn extract(&self, source: &Path) -> Result<AttributeSet, StageError> {
        let image = self
            .client
            .embed_image_file(source)
            .map_err(StageError::extraction)?;
        let vocab = self.vocab_embeddings().map_err(StageError::extraction)?;
        select_labels(&image, vocab).map_err(StageError::extraction)
    }
}

/// Choose the most similar label per key; ties keep the earliest entry.
pub(crate) fn select_labels(
    image: &[f32],
    vocab: &[(AttributeKey, Vec<Vec<f32>>)],
) -> Result<AttributeSet> {
    let mut labels = Vec::with_capacity(vocab.len());
    for (key, vectors) in vocab {
        let mut best: Option<(usize, f32)> = None;
        for (idx, vector) in vectors.iter().enumerate() {
            let score = cosine(image, vector).ok_or_else(|| {
                anyhow!(
                    "{key} embedding has {} dims, image has {}",
                    vector.len(),
                    image.len()
                )
            })?;
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
        let (idx, _) = best.ok_or_else(|| anyhow!("{key} vocabulary has no embeddings"))?;
        let label = key
            .vocabulary()
            .get(idx)
            .ok_or_else(|| anyhow!("{key} embedding index {idx} out of range"))?;
        labels.push((*key, *label));
    }
    AttributeSet::from_labels(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_url, serve, write_png};

    fn one_hot(dims: usize, hot: usize) -> Vec<f32> {
        (0..dims).map(|idx| if idx == hot { 1.0 } else { 0.0 }).collect()
    }

    fn vocab_with_winner(winner: usize) -> VocabEmbeddings {
        AttributeKey::ALL
            .into_iter()
            .map(|key| {
                let vectors = (0..key.vocabulary().len())
                    .map(|idx| if idx == winner { one_hot(4, 0) } else { one_hot(4, 1) })
                    .collect();
                (key, vectors)
            })
            .collect()
    }

    #[test]
    fn select_labels_picks_most_similar_entry() {
        let attrs = select_labels(&one_hot(4, 0), &vocab_with_winner(2)).expect("select");
        for (key, label) in attrs.iter() {
            assert_eq!(label, key.vocabulary()[2]);
        }
    }

    #[test]
    fn select_labels_breaks_ties_by_vocabulary_order() {
        let vocab: VocabEmbeddings = AttributeKey::ALL
            .into_iter()
            .map(|key| (key, vec![one_hot(4, 0); key.vocabulary().len()]))
            .collect();
        let attrs = select_labels(&one_hot(4, 0), &vocab).expect("select");
        for (key, label) in attrs.iter() {
            assert_eq!(label, key.vocabulary()[0]);
        }
    }

    #[test]
    fn select_labels_rejects_dimension_mismatch() {
        let err = select_labels(&one_hot(3, 0), &vocab_with_winner(0)).expect_err("dims differ");
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn normalized_rejects_zero_vector() {
        assert!(normalized(vec![0.0, 0.0]).is_err());
        let unit = normalized(vec![3.0, 4.0]).expect("normalize");
        assert!((unit[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn undecodable_image_fails_before_any_request() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").expect("write file");
        let err = encode_png(&path).expect_err("garbage is not an image");
        assert!(format!("{err:#}").contains("decode"));
    }

    fn client_for(base: &str) -> EmbeddingClient {
        EmbeddingClient::new(&EmbeddingConfig {
            endpoint: format!("{base}/"),
            timeout_secs: 10,
        })
    }

    /// Image queries embed to `[1, 0]`; the first label of every vocabulary
    /// embeds to `[1, 0]` and the rest to `[0, 1]`.
    fn fake_embedder(path: &str, body: &str) -> (u16, String) {
        let request: serde_json::Value = serde_json::from_str(body).expect("request JSON");
        match path {
            "/embed/image" => (200, r#"{"embedding": [2.0, 0.0]}"#.to_string()),
            "/embed/text" => {
                let count = request["texts"].as_array().expect("texts").len();
                let embeddings: Vec<[f32; 2]> = (0..count)
                    .map(|idx| if idx == 0 { [1.0, 0.0] } else { [0.0, 1.0] })
                    .collect();
                (200, serde_json::json!({ "embeddings": embeddings }).to_string())
            }
            other => (404, format!("no route {other}")),
        }
    }

    #[test]
    fn extract_embeds_vocabulary_once_per_extractor() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let first = write_png(dir.path(), "a.png");
        let second = write_png(dir.path(), "b.png");
        let (base, server) = serve(2 + AttributeKey::ALL.len(), fake_embedder);
        let extractor = ClipExtractor::new(client_for(&base));

        for path in [&first, &second] {
            let attrs = extractor.extract(path).expect("extract");
            for (key, label) in attrs.iter() {
                assert_eq!(label, key.vocabulary()[0]);
            }
        }

        let requests = server.join().expect("server thread");
        let text_calls = requests
            .iter()
            .filter(|request| request.path == "/embed/text")
            .count();
        assert_eq!(text_calls, AttributeKey::ALL.len());
        let image_request: serde_json::Value =
            serde_json::from_str(&requests[0].body).expect("image request JSON");
        let png = base64::engine::general_purpose::STANDARD
            .decode(image_request["image"].as_str().expect("image field"))
            .expect("base64 payload");
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn embed_texts_rejects_vector_count_mismatch() {
        let (base, server) = serve(1, |_path, _body| {
            (200, r#"{"embeddings": [[1.0, 0.0]]}"#.to_string())
        });
        let err = client_for(&base)
            .embed_texts(&["red", "blue"])
            .expect_err("one vector for two texts");
        assert!(err.to_string().contains("1 vectors for 2 texts"), "{err:#}");
        server.join().expect("server thread");
    }

    #[test]
    fn error_status_reports_server_body() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_png(dir.path(), "a.png");
        let (base, server) = serve(1, |_path, _body| (503, "model loading".to_string()));
        let err = client_for(&base)
            .embed_image_file(&path)
            .expect_err("service unavailable");
        let message = format!("{err:#}");
        assert!(message.contains("503"), "{message}");
        assert!(message.contains("model loading"), "{message}");
        server.join().expect("server thread");
    }

    #[test]
    fn extraction_failure_when_service_is_down() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_png(dir.path(), "a.png");
        let err = ClipExtractor::new(client_for(&closed_url()))
            .extract(&path)
            .expect_err("connection refused");
        assert_eq!(err.stage(), crate::error::Stage::Extraction);
    }
}
