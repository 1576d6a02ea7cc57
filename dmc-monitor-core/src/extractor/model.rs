//! Extraction through a hosted language model (OpenAI-compatible chat
//! completions). The model sees the plain text of the located region and the
//! expected column labels, and answers with a JSON array of row objects.

use super::{extraction_failed, ResolvedHeader, RowAssembler, TableExtractor};
use crate::config::ModelConfig;
use crate::error::PipelineError;
use crate::policy::TableLayout;
use crate::types::*;
use serde_json::{json, Value};
use std::time::Duration;

pub struct ModelExtractor {
    config: ModelConfig,
    agent: ureq::Agent,
    api_key: Option<String>,
}

impl ModelExtractor {
    pub fn new(config: ModelConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "model API key not set, requests will be unauthenticated"
            );
        }
        Self {
            config,
            agent,
            api_key,
        }
    }

    fn prompt(region: &LocatedRegion, layout: &TableLayout) -> String {
        let labels: Vec<&str> = layout.columns.iter().map(|c| c.label.as_str()).collect();
        format!(
            "The text below is a table from a Sri Lanka Disaster Management Centre {report} ({location}).\n\
             Return a JSON array with one object per data row, using exactly these keys: {keys}.\n\
             Copy cell text verbatim. Use \"\" for empty cells. Leave out total and header rows.\n\
             Answer with JSON only.\n\n{text}",
            report = region.report_type.display_name(),
            location = region.description,
            keys = serde_json::to_string(&labels).unwrap_or_default(),
            text = region.raw_text,
        )
    }

    fn complete(&self, prompt: &str) -> Result<String, String> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                {
                    "role": "system",
                    "content": "You convert report tables into JSON rows."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let mut request = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        let response: Value = match request.send_json(body) {
            Ok(response) => response
                .into_json()
                .map_err(|e| format!("unreadable model response: {e}"))?,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                return Err(format!("model endpoint returned HTTP {code}: {detail}"));
            }
            Err(e) => return Err(format!("model endpoint unreachable: {e}")),
        };

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "model response has no message content".to_string())
    }
}

impl TableExtractor for ModelExtractor {
    fn extract(
        &self,
        region: &LocatedRegion,
        layout: &TableLayout,
    ) -> Result<RawTable, PipelineError> {
        let prompt = Self::prompt(region, layout);
        tracing::info!(
            model = %self.config.model,
            region = %region.description,
            "requesting model extraction"
        );

        let content = self
            .complete(&prompt)
            .map_err(|reason| extraction_failed(region, reason))?;
        let table =
            parse_model_rows(&content, layout).map_err(|reason| extraction_failed(region, reason))?;

        if table.rows.is_empty() {
            return Err(extraction_failed(region, "model returned no data rows"));
        }
        Ok(table)
    }

    fn name(&self) -> &str {
        "model"
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Parse the model's answer into rows keyed by the layout's canonical labels.
/// Accepts a bare array or `{"rows": [...]}`, optionally inside a code fence.
pub fn parse_model_rows(content: &str, layout: &TableLayout) -> Result<RawTable, String> {
    let trimmed = content.trim();
    let json_text = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(json_text.trim())
        .map_err(|e| format!("model answer is not JSON: {e}"))?;
    let rows = value
        .as_array()
        .or_else(|| value.get("rows").and_then(Value::as_array))
        .ok_or_else(|| "model answer is not an array of rows".to_string())?;

    let labels: Vec<String> = layout.columns.iter().map(|c| c.label.clone()).collect();
    let header = ResolvedHeader::resolve(labels, layout)
        .ok_or_else(|| "layout has no label column".to_string())?;
    let numeric_labels: Vec<String> = layout
        .columns
        .iter()
        .filter(|c| c.kind.is_numeric())
        .map(|c| c.label.clone())
        .collect();

    let mut assembler = RowAssembler::new(layout);
    for row in rows {
        let Some(object) = row.as_object() else {
            continue;
        };
        let cells = layout
            .columns
            .iter()
            .map(|column| {
                object
                    .get(&column.label)
                    .or_else(|| object.get(&column.key))
                    .map(cell_text)
                    .unwrap_or_default()
            })
            .collect();
        assembler.push(&header, cells, false);
    }

    Ok(assembler.finish(&numeric_labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;

    fn layout(report_type: ReportType) -> TableLayout {
        PolicyTable::new().get(report_type).unwrap().layout.clone()
    }

    #[test]
    fn parses_fenced_array_answers() {
        let answer = "```json\n[\n  {\"District\": \"Colombo\", \"Affected\": 1250, \"Deaths\": null},\n  {\"District\": \"Total\", \"Affected\": 1250}\n]\n```";
        let table = parse_model_rows(answer, &layout(ReportType::Situation)).unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["District"], "Colombo");
        assert_eq!(table.rows[0]["Affected"], "1250");
        assert_eq!(table.rows[0]["Deaths"], "");
    }

    #[test]
    fn accepts_rows_object_and_metric_keys() {
        let answer = r#"{"rows": [{"district": "Badulla", "level_1_divisions": ["Ella", "Passara"]}]}"#;
        let table = parse_model_rows(answer, &layout(ReportType::Landslide)).unwrap();
        assert_eq!(table.rows[0]["District"], "Badulla");
        assert_eq!(table.rows[0]["Level 1 (Yellow)"], "Ella, Passara");
    }

    #[test]
    fn rejects_prose() {
        let err = parse_model_rows("Sorry, I cannot read this table.", &layout(ReportType::Weather))
            .unwrap_err();
        assert!(err.contains("not JSON"));
    }
}
