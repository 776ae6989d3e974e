//! Prompt templates for lecture analysis.
//!
//! Templates can be customized by placing an `analysis.toml` in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"));

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub analysis: AnalysisPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Templates for the transcript analysis calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPrompts {
    /// Single-pass analysis of a transcript that fits one call.
    pub single: String,
    /// Per-segment summary request used in the map phase.
    pub map: String,
    /// Final report request combining every segment summary.
    pub reduce: String,
    /// Heading placed above each summary inside `{{summaries}}`.
    pub section_label: String,
}

impl Default for AnalysisPrompts {
    fn default() -> Self {
        Self {
            single: "{{prompt}}\n\n---\n\n{{transcript}}".to_string(),

            map: r#"You are an expert analyst of online lectures. Below is one section of a long lecture.
Summarize this section in detail using the following structure:
- Core content summary (5-10 sentences)
- Key keywords and repeated messages
- Sales conversion points (enrollment pushes, discounts, urgency, etc.)
- Moments that prompt audience engagement
- Anything unusual

Section content:

{{segment}}"#
                .to_string(),

            reduce: r#"Below are section-by-section analyses of a long lecture ({{total}} sections in total).
Combine the analyses of every section into a final report that follows the format of the original analysis prompt below.

[Original analysis prompt]
{{prompt}}

[Section analyses]
{{summaries}}"#
                .to_string(),

            section_label: "=== Section {{index}}/{{total}} ===".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let analysis_path = custom_path.join("analysis.toml");
            if analysis_path.exists() {
                let content = std::fs::read_to_string(&analysis_path)?;
                prompts.analysis = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables in a single pass.
    ///
    /// Substituted values are never rescanned, and unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Prompt for a transcript short enough for one call.
    pub fn single_pass(&self, prompt: &str, transcript: &str) -> String {
        let vars = HashMap::from([
            ("prompt".to_string(), prompt.to_string()),
            ("transcript".to_string(), transcript.to_string()),
        ]);
        self.render_with_custom(&self.analysis.single, &vars)
    }

    /// Map-phase prompt for one transcript segment.
    pub fn map_segment(&self, segment: &str) -> String {
        let vars = HashMap::from([("segment".to_string(), segment.to_string())]);
        self.render_with_custom(&self.analysis.map, &vars)
    }

    /// Reduce-phase prompt combining all summaries in order.
    pub fn reduce(&self, prompt: &str, summaries: &[String]) -> String {
        let total = summaries.len().to_string();
        let labeled = summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| {
                let vars = HashMap::from([
                    ("index".to_string(), (i + 1).to_string()),
                    ("total".to_string(), total.clone()),
                ]);
                format!("{}\n{}", Self::render(&self.analysis.section_label, &vars), summary)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let vars = HashMap::from([
            ("prompt".to_string(), prompt.to_string()),
            ("total".to_string(), total),
            ("summaries".to_string(), labeled),
        ]);
        self.render_with_custom(&self.analysis.reduce, &vars)
    }
}
