// src/tutorial.rs
//! Skill-up tutorial generation. Topic selection lives in `RunState`
//! (ordered list + persisted index); this module only builds the prompt
//! and runs the call. The caller advances the rotation on success, so a
//! failed topic is retried on the next run.

use crate::ai::{DynModelClient, GenRequest, UsageMeter};
use crate::error::DigestError;

fn tutorial_prompt(topic: &str) -> String {
    format!(
        "You are an expert educator writing a practical, concise tutorial for a highly \
         technical, time-poor CTO who wants to learn how to implement **{topic}**.\n\n\
         Generate a step-by-step tutorial focusing on practical application and core \
         concepts. Output well-formatted Markdown with this structure:\n\n\
         ## Skill-Up Tutorial: {topic}\n\
         **Objective:** what the reader will achieve.\n\
         **Core Concepts:** 1-3 essential ideas, extremely concise, no deep theory.\n\
         **Prerequisites:** the specific libraries needed, with versions.\n\
         **Step-by-Step Implementation:** numbered steps, each with a minimal runnable \
         code block and a one-line explanation.\n\
         **Key Considerations:** 1-2 practical points (key management, error handling).\n\
         **Next Steps:** 1-2 links to official documentation.\n\n\
         Keep it digestible within 10-15 minutes of reading. Prioritize clarity and \
         runnable code over exhaustive detail."
    )
}

pub async fn generate_tutorial(
    client: &DynModelClient,
    model: &str,
    topic: &str,
    meter: &UsageMeter,
) -> Result<String, DigestError> {
    tracing::info!(topic, model, "generating tutorial");
    let req = GenRequest::new(model, tutorial_prompt(topic)).with_temperature(0.7);
    let reply = client.generate(req).await?;
    meter.record(model, reply.usage);

    let text = reply.text.trim().to_string();
    if text.is_empty() {
        return Err(DigestError::Model(format!(
            "empty tutorial for topic {topic:?}"
        )));
    }
    Ok(text)
}
