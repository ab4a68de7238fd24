use tracing::{debug, warn};
use uuid::Uuid;

use lakeflow_core::traits::{StepDefinition, TextGenerator};
use lakeflow_core::types::WorkflowSpec;
use lakeflow_engine::presets::standard_lake_ingestion;

/// Extract the first fenced ```json block, falling back to the whole text
/// when it already looks like a JSON object.
pub(crate) fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }
    None
}

fn render_criteria(criteria: &[String]) -> String {
    if criteria.is_empty() {
        return String::new();
    }
    let bullets: Vec<String> = criteria.iter().map(|c| format!("- {c}")).collect();
    format!("Acceptance criteria:\n{}\n\n", bullets.join("\n"))
}

fn render_steps(steps: &[StepDefinition]) -> String {
    steps
        .iter()
        .map(|s| format!("- {} ({}): {}", s.name, s.category, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drafts workflow specs from a natural-language requirement.
///
/// Never errors: when the model output cannot be fetched or parsed, the
/// standard ingestion workflow is returned as a starting point for the
/// validation loop to work on.
pub struct WorkflowGenerator<G> {
    generator: G,
}

impl<G: TextGenerator> WorkflowGenerator<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub async fn generate(
        &self,
        requirement: &str,
        criteria: &[String],
        steps: &[StepDefinition],
    ) -> WorkflowSpec {
        let prompt = format!(
            "You design data lake ingestion workflows.\n\
             Available step types:\n{}\n\n\
             Requirement:\n{}\n\n\
             {}Respond with a single ```json block containing a workflow spec with\n\
             fields: name, description, steps (array of step type names),\n\
             transitions (array of {{from, to, condition?}}), step_configs.\n\
             Conditions are tagged objects, e.g. {{\"type\": \"upstream_failed\"}} or\n\
             {{\"type\": \"equals\", \"field\": \"...\", \"value\": ...}}.",
            render_steps(steps),
            requirement,
            render_criteria(criteria),
        );
        self.complete(&prompt, criteria).await
    }

    /// Redraft after a failed validation round.
    pub async fn revise(
        &self,
        requirement: &str,
        criteria: &[String],
        previous: &WorkflowSpec,
        feedback: &str,
        steps: &[StepDefinition],
    ) -> WorkflowSpec {
        let previous_json =
            serde_json::to_string_pretty(previous).unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            "You design data lake ingestion workflows.\n\
             Available step types:\n{}\n\n\
             Requirement:\n{}\n\n\
             {}Your previous draft:\n```json\n{}\n```\n\n\
             Validation feedback:\n{}\n\n\
             Respond with a corrected spec in a single ```json block.",
            render_steps(steps),
            requirement,
            render_criteria(criteria),
            previous_json,
            feedback,
        );
        self.complete(&prompt, criteria).await
    }

    async fn complete(&self, prompt: &str, criteria: &[String]) -> WorkflowSpec {
        let mut spec = self.draft(prompt).await;
        // The criteria the draft will be judged against travel with it
        spec.acceptance_criteria = criteria.to_vec();
        spec
    }

    async fn draft(&self, prompt: &str) -> WorkflowSpec {
        let text = match self.generator.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation failed, using standard workflow");
                return fallback_spec();
            }
        };

        let Some(block) = extract_json_block(&text) else {
            warn!("no json block in generator output, using standard workflow");
            return fallback_spec();
        };

        match serde_json::from_str::<WorkflowSpec>(block) {
            Ok(mut spec) => {
                if spec.name.is_empty() {
                    spec.name = generated_name();
                }
                spec.generated_by = Some("ai".to_string());
                debug!(workflow = %spec.name, steps = spec.steps.len(), "spec drafted");
                spec
            }
            Err(e) => {
                warn!(error = %e, "generator output did not parse, using standard workflow");
                fallback_spec()
            }
        }
    }
}

fn generated_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ai-workflow-{}", &id[..8])
}

fn fallback_spec() -> WorkflowSpec {
    let mut spec = standard_lake_ingestion();
    spec.name = generated_name();
    spec.generated_by = Some("fallback".to_string());
    spec
}
