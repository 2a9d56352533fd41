//! Run command implementation.

use super::open_store;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::loader::PlainTextLoader;
use crate::output::Formatter;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use veracity_domain::traits::DocumentLoader;
use veracity_domain::Document;
use veracity_llm::OllamaProvider;
use veracity_pipeline::{
    CancellationToken, ExtractionCollaborator, LlmExtractor, LlmVerifier, Pipeline,
    PipelineConfig, PipelineError, RunReport, VerificationCollaborator,
};
use veracity_store::SqliteStore;

/// Results of a multi-document run, paired with document names.
pub type RunResults = Vec<(String, std::result::Result<RunReport, PipelineError>)>;

/// Execute the run command.
pub async fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let documents = load_documents(&PlainTextLoader::new(), &args.files)?;

    let mut pipeline_config = config.pipeline.clone();
    pipeline_config.force_rechunk |= args.force_rechunk;

    let store = Arc::new(open_store(config)?);
    let provider = Arc::new(ollama_provider(config, &pipeline_config));
    info!(
        model = %provider.model(),
        attempts = provider.max_retries(),
        documents = documents.len(),
        "Starting run"
    );

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after in-flight calls");
            watcher.cancel();
        }
    });

    let results = run_pipeline(
        documents,
        store,
        LlmExtractor::new(Arc::clone(&provider)),
        LlmVerifier::new(provider),
        pipeline_config,
        &cancel,
    )
    .await;
    interrupt.abort();

    let results = results?;
    println!("{}", formatter.format_reports(&results)?);

    match results.iter().filter(|(_, r)| r.is_err()).count() {
        0 => Ok(()),
        failed => Err(CliError::RunFailed(failed)),
    }
}

/// An Ollama provider whose retries all finish within one collaborator call
fn ollama_provider(config: &Config, pipeline_config: &PipelineConfig) -> OllamaProvider {
    OllamaProvider::new(&config.llm.endpoint, &config.llm.model)
        .with_max_retries(config.llm.max_retries)
        .within_budget(pipeline_config.collaborator_timeout())
}

/// Build a pipeline over `store` and run every document through it.
pub async fn run_pipeline<E, V>(
    documents: Vec<Document>,
    store: Arc<SqliteStore>,
    extractor: E,
    verifier: V,
    config: PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RunResults>
where
    E: ExtractionCollaborator + 'static,
    V: VerificationCollaborator + 'static,
{
    let pipeline = Pipeline::new(store, extractor, verifier, config)?;
    Ok(pipeline.run_documents(documents, cancel).await)
}

/// Load every file, refusing unsupported formats and clashing names.
pub fn load_documents<L>(loader: &L, files: &[PathBuf]) -> Result<Vec<Document>>
where
    L: DocumentLoader<Error = CliError>,
{
    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(files.len());

    for path in files {
        let document = loader.load(path)?;
        if !seen.insert(document.name.clone()) {
            return Err(CliError::InvalidInput(format!(
                "Two files map to document name '{}'",
                document.name
            )));
        }
        documents.push(document);
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::fs;
    use veracity_domain::traits::FactRepository;
    use veracity_domain::{Verdict, VerificationStatus};
    use veracity_pipeline::{extraction_fn, verification_fn};

    #[test]
    fn test_load_documents() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        let paper = dir.path().join("paper.md");
        fs::write(&notes, "Some notes.").unwrap();
        fs::write(&paper, "# Paper\n\nBody.").unwrap();

        let documents = load_documents(&PlainTextLoader::new(), &[notes, paper]).unwrap();
        let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["notes", "paper"]);
    }

    #[test]
    fn test_clashing_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        let md = dir.path().join("notes.md");
        fs::write(&txt, "a").unwrap();
        fs::write(&md, "b").unwrap();

        let result = load_documents(&PlainTextLoader::new(), &[txt, md]);
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_provider_fits_collaborator_timeout() {
        let config = Config::default();
        let pipeline_config = PipelineConfig {
            collaborator_timeout_secs: 30,
            ..Default::default()
        };

        let provider = ollama_provider(&config, &pipeline_config);
        assert_eq!(provider.model(), config.llm.model);
        assert_eq!(provider.max_retries(), config.llm.max_retries);
        // 1s + 2s of backoff between three attempts
        assert_eq!(provider.request_timeout(), std::time::Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_run_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moon.md");
        fs::write(&path, "# Moon\n\nThe moon orbits the earth.").unwrap();
        let documents = load_documents(&PlainTextLoader::new(), &[path]).unwrap();

        let store = Arc::new(SqliteStore::new(dir.path().join("facts.db")).unwrap());
        let results = run_pipeline(
            documents,
            Arc::clone(&store),
            extraction_fn(|_, context| {
                assert_eq!(context.title.as_deref(), Some("Moon"));
                Ok(vec!["The moon orbits the earth.".to_string()])
            }),
            verification_fn(|_, _| Ok(Verdict::accept())),
            PipelineConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        let report = results[0].1.as_ref().unwrap();
        assert_eq!(report.stats.verified, 1);
        assert_eq!(
            store
                .list_facts(Some("moon"), VerificationStatus::Verified)
                .unwrap()[0]
                .statement,
            "The moon orbits the earth."
        );

        let quiet = Formatter::new(OutputFormat::Quiet, false)
            .format_reports(&results)
            .unwrap();
        assert_eq!(quiet, "moon\tcompleted");
    }

    #[tokio::test]
    async fn test_invalid_pipeline_config() {
        let result = run_pipeline(
            Vec::new(),
            Arc::new(SqliteStore::in_memory().unwrap()),
            extraction_fn(|_, _| Ok(vec![])),
            verification_fn(|_, _| Ok(Verdict::accept())),
            PipelineConfig {
                max_concurrent_chunks: 0,
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(CliError::Pipeline(PipelineError::Config(_)))
        ));
    }
}
