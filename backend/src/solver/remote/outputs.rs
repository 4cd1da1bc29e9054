//! Decoding of a completed job's output artifacts.
//!
//! Each returned artifact is paired with the declared output whose pattern
//! matches its id. Tabular artifacts are read with their own field list, never
//! with another artifact's.

use base64::Engine;
use log::{debug, warn};
use regex::Regex;

use super::job::{DeclaredOutput, OutputArtifact, OutputKind};
use crate::error::{SolveError, SolveResult};
use crate::models::Record;
use crate::table::Table;

/// Decoded outputs of a completed job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOutputs {
    /// Site rows from the tabular artifact, if one was returned
    pub sites: Option<Vec<Record>>,
    /// Decoded status message from the text artifact, if one was returned
    pub message: Option<String>,
    /// Patterns of declared outputs with no matching artifact
    pub missing: Vec<String>,
}

struct Matcher {
    output: DeclaredOutput,
    regex: Regex,
}

fn compile(declared: &[DeclaredOutput]) -> SolveResult<Vec<Matcher>> {
    declared
        .iter()
        .map(|output| {
            Regex::new(&format!("^(?:{})$", output.pattern))
                .map(|regex| Matcher {
                    output: *output,
                    regex,
                })
                .map_err(|e| {
                    SolveError::data_shape(format!("invalid output pattern '{}': {}", output.pattern, e))
                })
        })
        .collect()
}

/// Pair and decode `artifacts` against `declared`.
pub fn resolve_outputs(
    artifacts: &[OutputArtifact],
    declared: &[DeclaredOutput],
) -> SolveResult<ResolvedOutputs> {
    let matchers = compile(declared)?;
    let mut seen = vec![false; matchers.len()];
    let mut resolved = ResolvedOutputs::default();

    for artifact in artifacts {
        let Some(idx) = matchers.iter().position(|m| m.regex.is_match(&artifact.id)) else {
            debug!("Skipping undeclared output artifact '{}'", artifact.id);
            continue;
        };
        seen[idx] = true;

        match matchers[idx].output.kind {
            OutputKind::Csv => {
                if resolved.sites.is_some() {
                    warn!(
                        "Several tabular artifacts returned; '{}' replaces the earlier one",
                        artifact.id
                    );
                }
                resolved.sites = Some(decode_table(artifact)?);
            }
            OutputKind::Text => {
                resolved.message = Some(decode_text(artifact)?);
            }
        }
    }

    resolved.missing = matchers
        .iter()
        .zip(seen)
        .filter(|(_, seen)| !seen)
        .map(|(m, _)| m.output.pattern.to_string())
        .collect();

    Ok(resolved)
}

fn decode_table(artifact: &OutputArtifact) -> SolveResult<Vec<Record>> {
    let fields = artifact.fields.clone().ok_or_else(|| {
        SolveError::data_shape(format!("artifact '{}' has no field list", artifact.id))
    })?;

    let table = Table::from_parts(fields, artifact.values.clone())
        .map_err(|e| SolveError::data_shape(format!("artifact '{}': {}", artifact.id, e)))?;

    Ok(table.to_records())
}

fn decode_text(artifact: &OutputArtifact) -> SolveResult<String> {
    let encoded = artifact
        .values
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_str())
        .ok_or_else(|| {
            SolveError::data_shape(format!("artifact '{}' has no encoded text", artifact.id))
        })?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| SolveError::data_shape(format!("artifact '{}': {}", artifact.id, e)))?;

    String::from_utf8(bytes)
        .map_err(|e| SolveError::data_shape(format!("artifact '{}': {}", artifact.id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveErrorKind;
    use crate::solver::remote::job::{DECLARED_OUTPUTS, TEXT_OUTPUT_PATTERN};
    use serde_json::json;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(text)
    }

    #[test]
    fn test_csv_and_text_outputs() {
        let artifacts = vec![
            OutputArtifact::table(
                "solution.csv",
                &["id", "score"],
                vec![vec![json!("p1"), json!(0.9)], vec![json!("p2"), json!(0.4)]],
            ),
            OutputArtifact::text("status.txt", encode("OPTIMAL_SOLUTION")),
        ];

        let resolved = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap();
        let sites = resolved.sites.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[1]["id"], json!("p2"));
        assert_eq!(resolved.message.as_deref(), Some("OPTIMAL_SOLUTION"));
        assert!(resolved.missing.is_empty());
    }

    #[test]
    fn test_csv_uses_its_own_fields_regardless_of_position() {
        let artifacts = vec![
            OutputArtifact {
                id: "log.txt".to_string(),
                fields: Some(vec!["wrong".to_string()]),
                values: vec![vec![json!(encode("done"))]],
            },
            OutputArtifact::table("solution.csv", &["id", "lat"], vec![vec![json!("p9"), json!(1.5)]]),
        ];

        let resolved = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap();
        let sites = resolved.sites.unwrap();
        assert_eq!(sites[0].keys().collect::<Vec<_>>(), vec!["id", "lat"]);
        assert_eq!(resolved.message.as_deref(), Some("done"));
    }

    #[test]
    fn test_width_mismatch_is_data_shape() {
        let artifacts = vec![OutputArtifact::table(
            "solution.csv",
            &["id", "lat"],
            vec![vec![json!("p1")]],
        )];

        let err = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap_err();
        assert_eq!(err.kind(), SolveErrorKind::DataShape);
    }

    #[test]
    fn test_missing_fields_is_data_shape() {
        let artifacts = vec![OutputArtifact {
            id: "solution.csv".to_string(),
            fields: None,
            values: vec![vec![json!("p1")]],
        }];
        let err = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap_err();
        assert!(err.to_string().contains("no field list"));
    }

    #[test]
    fn test_bad_base64_is_data_shape() {
        let artifacts = vec![OutputArtifact::text("status.txt", "%%%not-base64")];
        let err = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap_err();
        assert_eq!(err.kind(), SolveErrorKind::DataShape);
    }

    #[test]
    fn test_missing_outputs_are_reported() {
        let artifacts = vec![OutputArtifact::table("solution.csv", &["id"], vec![])];
        let resolved = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap();
        assert_eq!(resolved.sites, Some(vec![]));
        assert_eq!(resolved.missing, vec![TEXT_OUTPUT_PATTERN.to_string()]);

        let resolved = resolve_outputs(&[], &DECLARED_OUTPUTS).unwrap();
        assert_eq!(resolved.sites, None);
        assert_eq!(resolved.missing.len(), 2);
    }

    #[test]
    fn test_undeclared_artifacts_are_skipped() {
        let artifacts = vec![OutputArtifact::table("model.lp", &["line"], vec![vec![json!("x")]])];
        let resolved = resolve_outputs(&artifacts, &DECLARED_OUTPUTS).unwrap();
        assert_eq!(resolved.sites, None);
        assert_eq!(resolved.message, None);
    }
}
