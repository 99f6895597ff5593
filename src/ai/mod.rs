// src/ai/mod.rs
//! Model client abstraction. Every stage talks to the remote model through
//! `ModelClient`, so tests swap in `MockModel` and the pipeline never knows.

pub mod gemini;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelPricing;
use crate::error::DigestError;

/// Token counts reported by one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt + self.completion
    }
}

#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct GenRequest<'a> {
    pub model: &'a str,
    pub prompt: String,
    pub temperature: f32,
}

impl<'a> GenRequest<'a> {
    pub fn new(model: &'a str, prompt: String) -> Self {
        Self {
            model,
            prompt,
            temperature: 0.4,
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, req: GenRequest<'_>) -> Result<ModelReply, DigestError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynModelClient = Arc<dyn ModelClient>;

/// Run-level token accumulator, tallied per model so the cost estimate can
/// price each model with its own rates. Shared across concurrent summarizer
/// tasks; the mutex is the only synchronization the pipeline needs.
#[derive(Debug, Default)]
pub struct UsageMeter {
    per_model: Mutex<HashMap<String, TokenUsage>>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model: &str, usage: TokenUsage) {
        let mut g = self.per_model.lock().expect("usage meter poisoned");
        let e = g.entry(model.to_string()).or_default();
        e.prompt += usage.prompt;
        e.completion += usage.completion;
    }

    pub fn total(&self) -> TokenUsage {
        let g = self.per_model.lock().expect("usage meter poisoned");
        g.values().fold(TokenUsage::default(), |mut acc, u| {
            acc.prompt += u.prompt;
            acc.completion += u.completion;
            acc
        })
    }

    pub fn by_model(&self) -> HashMap<String, TokenUsage> {
        self.per_model.lock().expect("usage meter poisoned").clone()
    }

    /// None when no recorded model has a pricing entry; a partial table
    /// prices what it can and logs nothing extra.
    pub fn estimated_cost_usd(&self, pricing: &HashMap<String, ModelPricing>) -> Option<f64> {
        let g = self.per_model.lock().expect("usage meter poisoned");
        let mut cost = 0.0f64;
        let mut priced_any = false;
        for (model, usage) in g.iter() {
            if let Some(p) = pricing.get(model) {
                priced_any = true;
                cost += usage.prompt as f64 / 1_000_000.0 * p.input
                    + usage.completion as f64 / 1_000_000.0 * p.output;
            }
        }
        priced_any.then_some(cost)
    }
}

/// Scripted test client: replies are queued per model name, in call order.
/// An exhausted queue fails the call, which is itself useful for testing
/// the degraded paths.
#[derive(Default)]
pub struct MockModel {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    usage_per_call: TokenUsage,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            usage_per_call: TokenUsage {
                prompt: 100,
                completion: 40,
            },
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage_per_call = usage;
        self
    }

    pub fn enqueue_ok(&self, model: &str, text: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Ok(text.to_string()));
    }

    pub fn enqueue_err(&self, model: &str, msg: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(msg.to_string()));
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn generate(&self, req: GenRequest<'_>) -> Result<ModelReply, DigestError> {
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(req.model)
            .and_then(|q| q.pop_front());
        match next {
            Some(Ok(text)) => Ok(ModelReply {
                text,
                usage: self.usage_per_call,
            }),
            Some(Err(msg)) => Err(DigestError::Model(msg)),
            None => Err(DigestError::Model(format!(
                "mock: no scripted reply for {}",
                req.model
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_accumulates_per_model_and_totals() {
        let m = UsageMeter::new();
        m.record(
            "flash",
            TokenUsage {
                prompt: 10,
                completion: 5,
            },
        );
        m.record(
            "flash",
            TokenUsage {
                prompt: 1,
                completion: 2,
            },
        );
        m.record(
            "pro",
            TokenUsage {
                prompt: 100,
                completion: 50,
            },
        );
        let total = m.total();
        assert_eq!(total.prompt, 111);
        assert_eq!(total.completion, 57);
        assert_eq!(m.by_model()["flash"].prompt, 11);
    }

    #[test]
    fn cost_estimate_prices_each_model_separately() {
        let m = UsageMeter::new();
        m.record(
            "flash",
            TokenUsage {
                prompt: 1_000_000,
                completion: 1_000_000,
            },
        );
        m.record(
            "pro",
            TokenUsage {
                prompt: 2_000_000,
                completion: 0,
            },
        );

        let mut pricing = HashMap::new();
        pricing.insert(
            "flash".to_string(),
            ModelPricing {
                input: 0.10,
                output: 0.40,
            },
        );
        pricing.insert(
            "pro".to_string(),
            ModelPricing {
                input: 1.25,
                output: 10.0,
            },
        );
        let cost = m.estimated_cost_usd(&pricing).unwrap();
        assert!((cost - (0.10 + 0.40 + 2.50)).abs() < 1e-9);

        let empty = HashMap::new();
        assert!(m.estimated_cost_usd(&empty).is_none());
    }

    #[tokio::test]
    async fn mock_replays_in_order_then_fails() {
        let mock = MockModel::new();
        mock.enqueue_ok("m", "one");
        mock.enqueue_ok("m", "two");
        let r1 = mock.generate(GenRequest::new("m", "p".into())).await.unwrap();
        let r2 = mock.generate(GenRequest::new("m", "p".into())).await.unwrap();
        assert_eq!(r1.text, "one");
        assert_eq!(r2.text, "two");
        assert!(mock
            .generate(GenRequest::new("m", "p".into()))
            .await
            .is_err());
    }
}
