use serde::Deserialize;
use tracing::{debug, warn};

use lakeflow_core::traits::TextGenerator;
use lakeflow_core::types::WorkflowSpec;
use lakeflow_core::verdict::Verdict;

use crate::generator::extract_json_block;
use crate::tools::ToolCatalog;

/// What the model may answer with on any round: a tool call or the verdict.
#[derive(Deserialize)]
#[serde(untagged)]
enum DialogueReply {
    Tool { tool_call: ToolCall },
    Final(Verdict),
}

#[derive(Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

/// Tool-using validation dialogue.
///
/// The model inspects the mock environment through the tool catalog and must
/// deliver a verdict within the round budget. Tool failures are fed back as
/// text so the model can recover; running out of rounds yields an `Error`
/// verdict, which is not a judgement about the workflow.
pub struct DialogueValidator<G> {
    generator: G,
    tools: ToolCatalog,
    max_rounds: usize,
}

impl<G: TextGenerator> DialogueValidator<G> {
    pub fn new(generator: G, tools: ToolCatalog, max_rounds: usize) -> Self {
        Self {
            generator,
            tools,
            max_rounds,
        }
    }

    pub async fn validate(
        &self,
        spec: &WorkflowSpec,
        requirement: &str,
        criteria: &[String],
    ) -> Verdict {
        let spec_json = match serde_json::to_string_pretty(spec) {
            Ok(json) => json,
            Err(e) => return Verdict::error(format!("workflow spec not serializable: {e}")),
        };

        // (model reply, observation) pairs accumulated across rounds
        let mut transcript: Vec<(String, String)> = Vec::new();

        for round in 1..=self.max_rounds {
            let prompt = self.build_prompt(&spec_json, requirement, criteria, &transcript);
            let reply = match self.generator.generate(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(round, error = %e, "validation dialogue request failed");
                    return Verdict::error(format!("validation dialogue failed: {e}"));
                }
            };

            let Some(block) = extract_json_block(&reply) else {
                debug!(round, "reply had no json block");
                transcript.push((
                    reply.clone(),
                    "Respond with a single ```json block containing either a tool_call or a verdict."
                        .to_string(),
                ));
                continue;
            };

            match serde_json::from_str::<DialogueReply>(block) {
                Ok(DialogueReply::Tool { tool_call }) => {
                    debug!(round, tool = %tool_call.name, "dialogue tool call");
                    let observation = match self.tools.invoke(&tool_call.name, tool_call.params).await
                    {
                        Ok(value) => value.to_string(),
                        // Tool errors are part of the dialogue, not fatal
                        Err(e) => format!("tool error: {e}"),
                    };
                    transcript.push((reply.clone(), observation));
                }
                Ok(DialogueReply::Final(verdict)) => {
                    debug!(round, status = ?verdict.status, "dialogue verdict delivered");
                    return verdict;
                }
                Err(e) => {
                    debug!(round, error = %e, "reply json did not parse");
                    transcript.push((
                        reply.clone(),
                        format!("Could not parse that block ({e}). Send a tool_call or a verdict."),
                    ));
                }
            }
        }

        warn!(max_rounds = self.max_rounds, "validation dialogue exhausted its round budget");
        Verdict::error(format!(
            "no verdict after {} dialogue rounds",
            self.max_rounds
        ))
    }

    fn build_prompt(
        &self,
        spec_json: &str,
        requirement: &str,
        criteria: &[String],
        transcript: &[(String, String)],
    ) -> String {
        let criteria_block = if criteria.is_empty() {
            String::new()
        } else {
            let bullets: Vec<String> = criteria.iter().map(|c| format!("- {c}")).collect();
            format!("Acceptance criteria:\n{}\n\n", bullets.join("\n"))
        };
        let mut prompt = format!(
            "You validate data lake ingestion workflows against their requirement,\n\
             acceptance criteria, and the live environment.\n\n\
             Requirement:\n{requirement}\n\n\
             {criteria_block}\
             Workflow spec:\n```json\n{spec_json}\n```\n\n\
             Available tools:\n{}\n\
             On each turn respond with exactly one ```json block: either\n\
             {{\"tool_call\": {{\"name\": \"...\", \"params\": {{...}}}}}}\n\
             or a final verdict\n\
             {{\"status\": \"valid\"|\"invalid\", \"feedback\": \"...\", \"issues\": [...], \"repair_hints\": {{...}}}}.",
            self.tools.render_for_prompt(),
        );

        for (reply, observation) in transcript {
            prompt.push_str(&format!(
                "\n\nYou said:\n{reply}\n\nObservation:\n{observation}"
            ));
        }
        prompt
    }
}
