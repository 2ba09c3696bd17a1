//! Example consumer: ingest a template, evaluate rules for a data file, write the filled document.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Paths come from the environment (or `.env`):
//! `DOCFORM_TEMPLATE` (required), `DOCFORM_SCHEMA` (optional; drafted when unset),
//! `DOCFORM_DATA` (optional JSON snapshot), `DOCFORM_OUTPUT` (default `filled.docx`).

use docform_sdk::{ingest, EngineSettings, ErrorBody, Snapshot, SubmissionValidator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docform_sdk=info")),
        )
        .init();

    let settings = EngineSettings::from_env();
    let template_path = std::env::var("DOCFORM_TEMPLATE").map_err(|_| "DOCFORM_TEMPLATE is not set")?;
    let output_path = std::env::var("DOCFORM_OUTPUT").unwrap_or_else(|_| "filled.docx".into());

    let template = tokio::fs::read(&template_path).await?;
    let schema = match std::env::var("DOCFORM_SCHEMA") {
        Ok(path) => Some(serde_json::from_slice(&tokio::fs::read(path).await?)?),
        Err(_) => None,
    };
    let snapshot: Snapshot = match std::env::var("DOCFORM_DATA") {
        Ok(path) => serde_json::from_slice(&tokio::fs::read(path).await?)?,
        Err(_) => Snapshot::new(),
    };

    let ingestion = match ingest(template, schema, &settings) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&ErrorBody::from(&e))?);
            return Err(e.into());
        }
    };
    if ingestion.drafted {
        println!("{}", serde_json::to_string_pretty(ingestion.template.schema().config())?);
    }
    for detail in ingestion.unresolved_details() {
        tracing::warn!("{}", detail.message);
    }

    let template = &ingestion.template;
    let state = template.evaluate(&snapshot);
    let hidden: Vec<&str> = state.hidden_fields().into_iter().collect();
    tracing::info!(?hidden, "rules evaluated");
    for issue in SubmissionValidator::validate(template.schema(), &state, &snapshot) {
        tracing::warn!(field_id = %issue.field_id, "{}", issue.message);
    }

    let bytes = template.generate(&snapshot)?;
    tokio::fs::write(&output_path, &bytes).await?;
    tracing::info!("Filled document written to {}", output_path);
    Ok(())
}
