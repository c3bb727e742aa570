use log::{ debug, info, warn };
use regex::Regex;
use serde::Deserialize;
use std::collections::{ HashMap, HashSet };
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::{ ForgeError, ForgeResult };
use crate::implementations::config::{ render_template, GeneratorConfig, CHECKPOINT_EXTRACTION_TEMPLATE };
use crate::implementations::llm::{ extract_json_object, strip_code_fences };
use crate::models::checkpoint::{ Checkpoint, CheckpointRecord, SectionKind };
use crate::traits::llm_client::LlmClient;
use crate::traits::vector_store::{ DocumentChunk, VectorStore };

pub const RESULTS_PER_QUERY: usize = 4;
pub const MAX_CONTEXT_CHUNKS: usize = 10;
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";
const DEDUP_PREFIX_CHARS: usize = 500;
const MIN_CONTEXT_CHARS: usize = 100;

fn leading_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+(?:\.\d+)+)").expect("valid regex"))
}

/// Checkpoint id at the start of a free-text query, e.g. "1.1.1.1 Ensure ..."
pub fn checkpoint_id_of(query: &str) -> Option<String> {
    leading_id_re()
        .captures(query)
        .map(|caps| caps[1].to_string())
}

/// Structured checkpoint records, as written by `cisforge parse`
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    records: Vec<CheckpointRecord>,
}

impl CheckpointStore {
    pub fn new(records: Vec<CheckpointRecord>) -> Self {
        Self { records }
    }

    pub fn from_checkpoints(checkpoints: &[Checkpoint]) -> Self {
        Self::new(checkpoints.iter().map(CheckpointRecord::from).collect())
    }

    pub fn from_file(path: &Path) -> ForgeResult<Self> {
        if !path.exists() {
            return Err(ForgeError::InputNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)?;
        let records: Vec<CheckpointRecord> = serde_json::from_str(&contents)?;
        info!("Loaded {} checkpoint records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    /// Exact-id lookup
    pub fn find(&self, id: &str) -> ForgeResult<Checkpoint> {
        let matches: Vec<&CheckpointRecord> = self.records
            .iter()
            .filter(|r| r.id == id)
            .collect();
        match matches.as_slice() {
            [] => Err(ForgeError::CheckpointNotFound(id.to_string())),
            [record] => Ok(Checkpoint::from((*record).clone())),
            [first, rest @ ..] => {
                if rest.iter().all(|r| r == first) {
                    Ok(Checkpoint::from((*first).clone()))
                } else {
                    Err(
                        ForgeError::ParseAmbiguity(
                            format!("{} records share checkpoint id {}", matches.len(), id)
                        )
                    )
                }
            }
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.id.clone()))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Query variants used to pull every part of a checkpoint out of the index
pub fn build_queries(checkpoint_id: &str, query: &str) -> Vec<String> {
    let candidates = [
        format!("{} Ensure", checkpoint_id),
        format!("checkpoint {}", checkpoint_id),
        format!("{} Audit", checkpoint_id),
        format!("{} Remediation", checkpoint_id),
        query.to_string(),
        format!("CIS {}", checkpoint_id),
        format!("Profile Applicability {}", checkpoint_id),
    ];
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|q| seen.insert(q.clone()))
        .collect()
}

/// Relevance of a chunk to a checkpoint id
pub fn relevance_score(chunk: &str, checkpoint_id: &str) -> u32 {
    let lower = chunk.to_lowercase();
    let has_id = chunk.contains(checkpoint_id);
    let mut score = 0;
    if has_id {
        score += 10;
        if lower.contains("ensure") {
            score += 5;
        }
    }
    if lower.contains("audit") {
        score += 2;
    }
    if lower.contains("remediation") {
        score += 2;
    }
    score
}

/// Keep the first chunk for each distinct 500-character prefix, then rank.
pub fn rank_chunks(chunks: Vec<DocumentChunk>, checkpoint_id: &str) -> Vec<DocumentChunk> {
    let mut seen = HashSet::new();
    let mut unique: Vec<DocumentChunk> = chunks
        .into_iter()
        .filter(|c| seen.insert(c.text.chars().take(DEDUP_PREFIX_CHARS).collect::<String>()))
        .collect();
    // Stable sort keeps retrieval order among equal scores.
    unique.sort_by_key(|c| std::cmp::Reverse(relevance_score(&c.text, checkpoint_id)));
    unique.truncate(MAX_CONTEXT_CHUNKS);
    unique
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractedCheckpoint {
    id: String,
    name: String,
    profile_applicability: String,
    description: String,
    rationale: String,
    impact: String,
    audit: String,
    remediation: String,
    default_value: String,
    references: String,
}

/// Locates a checkpoint in the record store or, failing that, in the vector index
pub struct CheckpointRetriever {
    store: Option<CheckpointStore>,
    vector_store: Option<Box<dyn VectorStore>>,
}

impl CheckpointRetriever {
    pub fn new(store: Option<CheckpointStore>, vector_store: Option<Box<dyn VectorStore>>) -> Self {
        Self { store, vector_store }
    }

    pub fn store(&self) -> Option<&CheckpointStore> {
        self.store.as_ref()
    }

    /// Resolve a checkpoint id or an id-prefixed free-text query
    pub async fn retrieve(
        &self,
        query: &str,
        llm: &dyn LlmClient,
        config: &GeneratorConfig
    ) -> ForgeResult<Checkpoint> {
        let checkpoint_id = checkpoint_id_of(query).ok_or_else(||
            ForgeError::InvalidInput(format!("No checkpoint id in query: {}", query))
        )?;

        if let Some(store) = &self.store {
            match store.find(&checkpoint_id) {
                Ok(checkpoint) => {
                    info!("Checkpoint {} found in record store", checkpoint_id);
                    return Ok(checkpoint);
                }
                Err(ForgeError::CheckpointNotFound(_)) if self.vector_store.is_some() => {
                    warn!("Checkpoint {} not in record store, trying semantic search", checkpoint_id);
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        match &self.vector_store {
            Some(vector_store) => {
                let context = self.gather_context(vector_store.as_ref(), &checkpoint_id, query).await?;
                self.extract_checkpoint(&checkpoint_id, &context, llm, config).await
            }
            None => Err(ForgeError::CheckpointNotFound(checkpoint_id)),
        }
    }

    /// Run every query variant and join the ranked chunks into one context block
    pub async fn gather_context(
        &self,
        vector_store: &dyn VectorStore,
        checkpoint_id: &str,
        query: &str
    ) -> ForgeResult<String> {
        let mut chunks = Vec::new();
        for q in build_queries(checkpoint_id, query) {
            let results = vector_store.similarity_search(&q, RESULTS_PER_QUERY).await?;
            debug!("Query '{}' returned {} chunks", q, results.len());
            chunks.extend(results);
        }

        let ranked = rank_chunks(chunks, checkpoint_id);
        if !ranked.iter().any(|c| c.text.contains(checkpoint_id)) {
            return Err(ForgeError::CheckpointNotFound(checkpoint_id.to_string()));
        }

        let context = ranked
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);
        if context.len() < MIN_CONTEXT_CHARS {
            warn!("Retrieved context for {} is only {} characters", checkpoint_id, context.len());
        }
        info!("Assembled {} chunks ({} characters) for {}", ranked.len(), context.len(), checkpoint_id);
        Ok(context)
    }

    async fn extract_checkpoint(
        &self,
        checkpoint_id: &str,
        context: &str,
        llm: &dyn LlmClient,
        config: &GeneratorConfig
    ) -> ForgeResult<Checkpoint> {
        let template = config
            .get_template(CHECKPOINT_EXTRACTION_TEMPLATE)
            .ok_or_else(|| ForgeError::ConfigError("Missing checkpoint_extraction template".to_string()))?;
        let mut params = HashMap::new();
        params.insert("checkpoint_id", checkpoint_id.to_string());
        params.insert("context", context.to_string());
        let prompt = render_template(&template, &params);

        let answer = llm.complete(
            "You extract CIS benchmark checkpoints verbatim and answer with JSON only.",
            &prompt
        ).await?;
        let cleaned = strip_code_fences(&answer);
        let json = extract_json_object(&cleaned).ok_or_else(||
            ForgeError::LlmError(format!("No JSON object in extraction for {}", checkpoint_id))
        )?;
        let extracted: ExtractedCheckpoint = serde_json::from_str(json)?;

        if extracted.audit.trim().is_empty() && extracted.description.trim().is_empty() {
            return Err(ForgeError::CheckpointNotFound(checkpoint_id.to_string()));
        }
        if !extracted.id.is_empty() && extracted.id != checkpoint_id {
            warn!("Extraction returned id {} for requested {}", extracted.id, checkpoint_id);
        }

        let mut checkpoint = Checkpoint::new(checkpoint_id, extracted.name.trim());
        let fields = [
            (SectionKind::ProfileApplicability, extracted.profile_applicability),
            (SectionKind::Description, extracted.description),
            (SectionKind::Rationale, extracted.rationale),
            (SectionKind::Impact, extracted.impact),
            (SectionKind::Audit, extracted.audit),
            (SectionKind::Remediation, extracted.remediation),
            (SectionKind::DefaultValue, extracted.default_value),
            (SectionKind::References, extracted.references),
        ];
        for (kind, text) in fields {
            let text = text.trim().to_string();
            if !text.is_empty() {
                checkpoint.sections.insert(kind, text);
            }
        }
        Ok(checkpoint)
    }
}
