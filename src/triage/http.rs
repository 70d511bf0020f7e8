//! HTTP Recommendation Oracle
//!
//! Client for an OpenAI-compatible chat-completions deployment (Azure
//! style: deployment path + `api-version` query + `api-key` header).
//! Configured from environment variables:
//!
//! - `ARMWATCH_ORACLE_ENDPOINT` — base URL of the deployment
//! - `ARMWATCH_ORACLE_API_KEY` — API key
//! - `ARMWATCH_ORACLE_DEPLOYMENT` — model deployment name (default `gpt-4o`)
//! - `ARMWATCH_ORACLE_API_VERSION` — API version (default `2024-12-01-preview`)
//!
//! Responses are parsed defensively: the five report sections are pulled by
//! regex with a line-scanner fallback, and the `RISK_SCORE:` / `PRIORITY:`
//! sentinel lines fall back to the local heuristic's own computation when
//! missing or malformed. Nothing in here panics on a bad response.

use crate::normalize::standardize_error_code;
use crate::triage::oracle::{heuristic_assessment, RecommendationOracle, SimilarContext};
use crate::types::{MaintenanceReport, OracleAssessment, Priority, PromptKind, Record};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an expert industrial robot maintenance and diagnostics system. \
Your role is to analyze robot events, errors, and alerts to determine priority, assess risk, \
and provide actionable recommendations for robot technicians. Consider controller fault codes \
(SRVO, TEMP, MOTN, INTP, PROG), joint-specific issues (J1-J6: base, shoulder, elbow, wrist), \
safety implications, production impact, historical patterns, and severity indicators. \
Always provide clear, actionable recommendations specific to robot maintenance procedures.";

/// Oracle backed by an OpenAI-compatible chat-completions endpoint
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

impl HttpOracle {
    /// Build from environment variables. Returns `None` when the endpoint
    /// or key is missing — callers then run with the heuristic oracle.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("ARMWATCH_ORACLE_ENDPOINT").ok()?;
        let api_key = std::env::var("ARMWATCH_ORACLE_API_KEY").ok()?;
        if endpoint.is_empty() || api_key.is_empty() {
            return None;
        }
        let deployment = std::env::var("ARMWATCH_ORACLE_DEPLOYMENT")
            .unwrap_or_else(|_| "gpt-4o".to_string());
        let api_version = std::env::var("ARMWATCH_ORACLE_API_VERSION")
            .unwrap_or_else(|_| "2024-12-01-preview".to_string());

        info!(deployment = %deployment, "HTTP oracle configured");
        Some(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            deployment,
            api_version,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.3,
            "max_tokens": 1000
        });

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("oracle request failed")?
            .error_for_status()
            .context("oracle returned error status")?;

        let payload: Value = response.json().await.context("oracle response not JSON")?;
        if let Some(usage) = payload.get("usage") {
            debug!(
                prompt_tokens = usage.get("prompt_tokens").and_then(|v| v.as_u64()),
                completion_tokens = usage.get("completion_tokens").and_then(|v| v.as_u64()),
                "Oracle token usage"
            );
        }
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .context("oracle response missing message content")
    }
}

#[async_trait]
impl RecommendationOracle for HttpOracle {
    async fn analyze(
        &self,
        record: &Record,
        similar: &[SimilarContext],
        kind: PromptKind,
    ) -> Result<OracleAssessment> {
        let prompt = match kind {
            PromptKind::Triage => build_triage_prompt(record, similar),
            PromptKind::Default => build_default_prompt(record, similar),
        };
        let text = self.complete(&prompt).await?;
        Ok(parse_oracle_response(&text, record))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "HttpOracle"
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

/// Full five-section triage prompt with sentinel score lines
pub fn build_triage_prompt(record: &Record, similar: &[SimilarContext]) -> String {
    let mut prompt = format!(
        "You are an expert industrial robot maintenance technician. Analyze the following \
robot event and provide a comprehensive maintenance recommendation.\n\n\
EVENT TYPE: {}\n\n\
ROBOT EVENT DETAILS:\n\
- Joint: {} ({})\n\
- Force Value: {}\n\
- Severity: {}\n\
- Collision Type: {}\n\
- Timestamp: {}\n\
- Description: {}\n",
        record.source_kind.to_string().to_uppercase(),
        record.joint,
        record.joint.anatomy(),
        record
            .force_value
            .map_or_else(|| "N/A".to_string(), |f| format!("{f}N")),
        record.severity,
        record.collision_type,
        record.timestamp,
        record.description,
    );

    if let Some(code) = record.error_code.as_deref() {
        prompt.push_str(&format!(
            "\nController Error Code: {} ({})\n",
            code,
            standardize_error_code(code)
        ));
    }

    if record.recurrence_count > 1 {
        prompt.push_str(&format!(
            "\nRECURRENCE WARNING: This event has occurred {} times in the last 24 hours. \
This suggests a chronic issue requiring immediate attention.\n",
            record.recurrence_count
        ));
    }

    if !record.notes.is_empty() {
        prompt.push_str(&format!("\nDATA QUALITY NOTES: {}\n", record.notes.join("; ")));
    }

    if !similar.is_empty() {
        prompt.push_str(&format!(
            "\nSIMILAR HISTORICAL EVENTS ({} found):\n",
            similar.len()
        ));
        for (i, entry) in similar.iter().take(3).enumerate() {
            prompt.push_str(&format!(
                "{}. {} (Similarity: {:.0}%)\n",
                i + 1,
                entry.description,
                entry.similarity * 100.0
            ));
        }
    }

    prompt.push_str(
        "\nREQUIRED OUTPUT FORMAT (provide all 5 sections):\n\n\
1. DIAGNOSE CAUSE:\n\
   [Explain the root cause based on force level, joint location, frequency, and error patterns.]\n\n\
2. STEP-BY-STEP INSPECTION PROCEDURE:\n\
   [List specific checks the technician should perform, in order. Number each step.]\n\n\
3. REQUIRED MAINTENANCE ACTIONS:\n\
   [Specify exact repairs, replacements, or adjustments needed.]\n\n\
4. SAFETY CLEARANCE PROCEDURE:\n\
   [What must be verified before restarting the robot.]\n\n\
5. RETURN-TO-SERVICE CONDITIONS:\n\
   [Specific criteria for putting the robot back online.]\n\n\
CRITICAL: At the END of your response, provide these values on separate lines:\n\
RISK_SCORE: [number 0-100]\n\
PRIORITY: [CRITICAL or HIGH or MEDIUM or LOW]\n\n\
Provide your response in clear, technician-focused language. Be specific.",
    );

    prompt
}

/// Short JSON-shaped analysis prompt
pub fn build_default_prompt(record: &Record, similar: &[SimilarContext]) -> String {
    let mut prompt = format!(
        "Analyze the following industrial robot event and provide:\n\
1. Priority level (CRITICAL, HIGH, MEDIUM, LOW)\n\
2. Risk assessment (0-100 score)\n\
3. Recommended action\n\
4. Brief analysis\n\n\
Event Details:\n\
- Type: {}\n\
- Timestamp: {}\n\
- Description: {}\n",
        record.source_kind, record.timestamp, record.description
    );
    if let Some(code) = record.error_code.as_deref() {
        prompt.push_str(&format!("- Error Code: {code}\n"));
    }
    prompt.push_str(&format!("- Severity: {}\n", record.severity));

    if !similar.is_empty() {
        prompt.push_str(&format!(
            "\nSimilar Historical Events ({} found):\n",
            similar.len()
        ));
        for (i, entry) in similar.iter().take(3).enumerate() {
            prompt.push_str(&format!(
                "{}. {} (Similarity: {:.2})\n",
                i + 1,
                entry.description,
                entry.similarity
            ));
        }
    }

    prompt.push_str(
        "\nProvide your analysis in JSON format:\n\
{\"priority\": \"CRITICAL|HIGH|MEDIUM|LOW\", \"risk_score\": 0-100, \
\"recommendation\": \"action to take\", \"analysis\": \"brief explanation\"}",
    );
    prompt
}

// ============================================================================
// Defensive response parsing
// ============================================================================

fn heading_res() -> &'static [(usize, Regex)] {
    static RES: OnceLock<Vec<(usize, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            (0, r"(?i)(?:\d+\.\s*)?DIAGNOSE CAUSE:?"),
            (1, r"(?i)(?:\d+\.\s*)?STEP-BY-STEP INSPECTION(?: PROCEDURE)?:?"),
            (2, r"(?i)(?:\d+\.\s*)?REQUIRED MAINTENANCE(?: ACTIONS)?:?"),
            (3, r"(?i)(?:\d+\.\s*)?SAFETY CLEARANCE(?: PROCEDURE)?:?"),
            (4, r"(?i)(?:\d+\.\s*)?RETURN-TO-SERVICE(?: CONDITIONS)?:?"),
        ]
        .iter()
        .map(|(i, p)| (*i, Regex::new(p).expect("valid regex")))
        .collect()
    })
}

fn risk_score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)RISK_SCORE[:\s]+(\d+)").expect("valid regex"))
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)PRIORITY[:\s]+(CRITICAL|HIGH|MEDIUM|LOW)").expect("valid regex"))
}

/// Extract the five report sections. Heading positions are located first
/// and each section body is the text between consecutive headings (the
/// sentinel block bounds the last one). When no heading matches, a line
/// scanner assigns content to the most recent section keyword it saw.
pub fn parse_sections(text: &str) -> MaintenanceReport {
    let mut sections = [String::new(), String::new(), String::new(), String::new(), String::new()];

    let sentinel_start = risk_score_re().find(text).map_or(text.len(), |m| m.start());
    let mut marks: Vec<(usize, usize, usize)> = heading_res()
        .iter()
        .filter_map(|(index, re)| re.find(text).map(|m| (m.start(), m.end(), *index)))
        .filter(|(start, _, _)| *start < sentinel_start)
        .collect();
    marks.sort_by_key(|(start, _, _)| *start);

    for (i, (_, heading_end, index)) in marks.iter().enumerate() {
        let body_end = marks
            .get(i + 1)
            .map_or(sentinel_start, |(next_start, _, _)| *next_start)
            .max(*heading_end);
        sections[*index] = text[*heading_end..body_end].trim().to_string();
    }

    if sections.iter().all(String::is_empty) {
        let mut current: Option<usize> = None;
        for line in text.lines() {
            let upper = line.to_uppercase();
            if upper.contains("DIAGNOSE") || upper.contains("CAUSE") {
                current = Some(0);
            } else if upper.contains("INSPECTION") {
                current = Some(1);
            } else if upper.contains("MAINTENANCE") {
                current = Some(2);
            } else if upper.contains("SAFETY") {
                current = Some(3);
            } else if upper.contains("RETURN") || upper.contains("SERVICE") {
                current = Some(4);
            } else if let Some(index) = current {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    sections[index].push_str(trimmed);
                    sections[index].push('\n');
                }
            }
        }
        for section in &mut sections {
            *section = section.trim_end().to_string();
        }
    }

    let [diagnose_cause, inspection_procedure, maintenance_actions, safety_clearance, return_to_service] =
        sections;
    MaintenanceReport {
        diagnose_cause,
        inspection_procedure,
        maintenance_actions,
        safety_clearance,
        return_to_service,
    }
}

/// Extract `RISK_SCORE:` / `PRIORITY:` sentinel values, if present and
/// well-formed. Scores are clamped to [0, 100].
pub fn parse_sentinels(text: &str) -> (Option<f64>, Option<Priority>) {
    let risk_score = risk_score_re()
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|s| s.clamp(0.0, 100.0));
    let priority = priority_re()
        .captures(text)
        .and_then(|c| Priority::parse(&c[1]));
    (risk_score, priority)
}

/// Parse a full oracle response into an assessment.
///
/// Missing or malformed sentinel values default to the heuristic
/// computation over the record — a garbled oracle response degrades to the
/// documented local rules, it never throws.
pub fn parse_oracle_response(text: &str, record: &Record) -> OracleAssessment {
    let mut report = parse_sections(text);
    let (mut risk_score, mut priority) = parse_sentinels(text);

    if risk_score.is_none() || priority.is_none() {
        let fallback = heuristic_assessment(record);
        if risk_score.is_none() {
            warn!(record_id = %record.record_id, "Oracle omitted RISK_SCORE, using heuristic value");
            risk_score = fallback.risk_score;
        }
        if priority.is_none() {
            priority = fallback.priority;
        }
    }

    // Compact recommendation assembled from the most actionable sections
    let mut recommendation = String::new();
    if !report.diagnose_cause.is_empty() {
        recommendation.push_str(&format!("Diagnosis: {}", truncate(&report.diagnose_cause, 200)));
    }
    if !report.maintenance_actions.is_empty() {
        if !recommendation.is_empty() {
            recommendation.push_str("\n\n");
        }
        recommendation.push_str(&format!("Actions: {}", truncate(&report.maintenance_actions, 200)));
    }
    if recommendation.is_empty() {
        recommendation = "Review event details and follow standard maintenance procedures".to_string();
    }

    // Empty sections fall back to placeholders so every report is complete
    let defaults = super::oracle::default_report();
    if report.diagnose_cause.is_empty() {
        report.diagnose_cause = defaults.diagnose_cause;
    }
    if report.inspection_procedure.is_empty() {
        report.inspection_procedure = defaults.inspection_procedure;
    }
    if report.maintenance_actions.is_empty() {
        report.maintenance_actions = defaults.maintenance_actions;
    }
    if report.safety_clearance.is_empty() {
        report.safety_clearance = defaults.safety_clearance;
    }
    if report.return_to_service.is_empty() {
        report.return_to_service = defaults.return_to_service;
    }

    OracleAssessment {
        priority,
        risk_score,
        recommendation,
        narrative: text.to_string(),
        report,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}
