//! Per-tenant knowledge base
//!
//! Knowledge text is loaded from the tenant's URL, its own file, or the
//! shared default file (first source that succeeds) and cached until cleared.
//! Lookups try a line-level substring search first and only hand the whole
//! document to the LLM when that finds nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use careline_config::{KnowledgeConfig, PromptsConfig};
use careline_core::{Cache, GenerateRequest, Organization};
use careline_llm::LlmBackend;

use crate::{generate_within, AgentError};

/// Answers containing any of these mean the model found nothing
pub const NO_INFO_PHRASES: &[&str] = &[
    "no_relevant_info",
    "no relevant information",
    "no information",
    "not mentioned",
    "does not contain",
    "doesn't contain",
    "does not mention",
    "not provided",
    "couldn't find",
    "could not find",
    "unable to find",
    "i don't know",
    "i do not know",
];

/// Shorter answers are treated as empty
pub const MIN_ANSWER_CHARS: usize = 4;

/// Lines containing `query`, case-insensitively
pub fn matching_lines<'a>(text: &'a str, query: &str) -> Vec<&'a str> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.to_lowercase().contains(&needle))
        .collect()
}

/// Whether a whole-document answer actually found something
pub fn is_informative(answer: &str) -> bool {
    let answer = answer.trim();
    if answer.chars().count() < MIN_ANSWER_CHARS {
        return false;
    }
    let lowered = answer.to_lowercase();
    !NO_INFO_PHRASES.iter().any(|p| lowered.contains(p))
}

pub struct KnowledgeStore {
    cache: Arc<dyn Cache<String, Arc<str>>>,
    http: reqwest::Client,
    directory: PathBuf,
    default_file: String,
    llm: Arc<dyn LlmBackend>,
    llm_timeout: Duration,
}

impl KnowledgeStore {
    pub fn new(
        config: &KnowledgeConfig,
        cache: Arc<dyn Cache<String, Arc<str>>>,
        llm: Arc<dyn LlmBackend>,
        llm_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| AgentError::Initialization(e.to_string()))?;

        Ok(Self {
            cache,
            http,
            directory: PathBuf::from(&config.directory),
            default_file: config.default_file.clone(),
            llm,
            llm_timeout,
        })
    }

    /// Knowledge text for the tenant, loading it on first use
    pub async fn load(&self, organization: &Organization) -> Option<Arc<str>> {
        if let Some(text) = self.cache.get(&organization.id) {
            return Some(text);
        }

        let text: Arc<str> = Arc::from(self.fetch(organization).await?);
        self.cache.set(organization.id.clone(), text.clone());
        Some(text)
    }

    /// Drop one tenant's cached text, or all of it
    pub fn clear(&self, tenant: Option<&str>) -> usize {
        match tenant {
            Some(id) => usize::from(self.cache.invalidate(&id.to_string())),
            None => {
                let cleared = self.cache.len();
                self.cache.clear();
                cleared
            }
        }
    }

    async fn fetch(&self, organization: &Organization) -> Option<String> {
        if let Some(url) = &organization.knowledge_url {
            match self.fetch_url(url).await {
                Ok(text) => return Some(text),
                Err(e) => tracing::warn!(
                    tenant = %organization.id,
                    url = %url,
                    error = %e,
                    "Knowledge URL fetch failed, trying files"
                ),
            }
        }

        let tenant_file = organization
            .knowledge_file
            .clone()
            .unwrap_or_else(|| format!("{}.txt", organization.id));

        for file in [tenant_file.as_str(), self.default_file.as_str()] {
            if let Some(text) = read_file(&self.directory.join(file)).await {
                tracing::info!(tenant = %organization.id, file, "Knowledge loaded from file");
                return Some(text);
            }
        }

        tracing::warn!(tenant = %organization.id, "No knowledge source available");
        None
    }

    async fn fetch_url(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Answer a question from the tenant's knowledge text
    pub async fn lookup(
        &self,
        organization: &Organization,
        query: &str,
        prompts: &PromptsConfig,
    ) -> String {
        let no_info = PromptsConfig::render(&prompts.knowledge_no_info, &organization.name);

        let Some(text) = self.load(organization).await else {
            return no_info;
        };

        let lines = matching_lines(&text, query);
        if !lines.is_empty() {
            tracing::debug!(tenant = %organization.id, matches = lines.len(), "Knowledge substring hit");
            return self.summarize(organization, query, &lines).await;
        }

        match self.search_document(organization, query, &text).await {
            Some(answer) => answer,
            None => no_info,
        }
    }

    async fn summarize(&self, organization: &Organization, query: &str, lines: &[&str]) -> String {
        let excerpt = lines.join("\n");
        let request = GenerateRequest::new(format!(
            "You answer questions for {} on WhatsApp. Use only the information given. \
             Keep the answer short and friendly.",
            organization.name
        ))
        .with_user_message(format!("Information:\n{}\n\nQuestion: {}", excerpt, query));

        match generate_within(self.llm.as_ref(), request, self.llm_timeout).await {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_string(),
            Ok(_) => excerpt,
            Err(e) => {
                tracing::warn!(tenant = %organization.id, error = %e, "Knowledge summary failed");
                excerpt
            }
        }
    }

    async fn search_document(
        &self,
        organization: &Organization,
        query: &str,
        text: &str,
    ) -> Option<String> {
        let request = GenerateRequest::new(format!(
            "You answer questions for {} on WhatsApp using the document below. \
             If it has nothing relevant, reply exactly NO_RELEVANT_INFO.\n\n{}",
            organization.name, text
        ))
        .with_user_message(query);

        match generate_within(self.llm.as_ref(), request, self.llm_timeout).await {
            Ok(response) if is_informative(&response.text) => Some(response.text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(tenant = %organization.id, error = %e, "Knowledge search failed");
                None
            }
        }
    }
}

async fn read_file(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Knowledge file unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::{ExpiryPolicy, MemoryCache};
    use careline_llm::{LlmError, ScriptedBackend};

    const KNOWLEDGE: &str = "Acme Clinic\nVisiting hours: 9am-5pm\nParking is free for patients\n";

    fn store(dir: &Path, llm: Arc<ScriptedBackend>) -> KnowledgeStore {
        let config = KnowledgeConfig {
            directory: dir.to_string_lossy().to_string(),
            ..KnowledgeConfig::default()
        };
        KnowledgeStore::new(
            &config,
            Arc::new(MemoryCache::<String, Arc<str>>::new(ExpiryPolicy::Never)),
            llm,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_matching_lines_case_insensitive() {
        assert_eq!(matching_lines(KNOWLEDGE, "visiting hours"), vec!["Visiting hours: 9am-5pm"]);
        assert!(matching_lines(KNOWLEDGE, "cafeteria").is_empty());
        assert!(matching_lines(KNOWLEDGE, "  ").is_empty());
    }

    #[test]
    fn test_is_informative() {
        assert!(is_informative("We are open on Sundays."));
        assert!(!is_informative("NO_RELEVANT_INFO"));
        assert!(!is_informative("The document does not contain that."));
        assert!(!is_informative("ok"));
    }

    #[tokio::test]
    async fn test_substring_tier_runs_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acme.txt"), KNOWLEDGE).unwrap();
        let llm = Arc::new(ScriptedBackend::new().with_text("We're open 9am to 5pm."));
        let store = store(dir.path(), llm.clone());
        let org = Organization::new("acme", "Acme Clinic");

        let answer = store.lookup(&org, "visiting hours", &PromptsConfig::default()).await;

        assert_eq!(answer, "We're open 9am to 5pm.");
        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        let user = &requests[0].messages[1].content;
        assert!(user.contains("Visiting hours: 9am-5pm"));
        assert!(!user.contains("Parking"));
    }

    #[tokio::test]
    async fn test_summary_failure_returns_raw_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acme.txt"), KNOWLEDGE).unwrap();
        let llm = Arc::new(ScriptedBackend::new().with_error(LlmError::Timeout));
        let store = store(dir.path(), llm);
        let org = Organization::new("acme", "Acme Clinic");

        let answer = store.lookup(&org, "PARKING", &PromptsConfig::default()).await;
        assert_eq!(answer, "Parking is free for patients");
    }

    #[tokio::test]
    async fn test_whole_document_fallback_no_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.txt"), KNOWLEDGE).unwrap();
        let llm = Arc::new(ScriptedBackend::new().with_text("NO_RELEVANT_INFO"));
        let store = store(dir.path(), llm.clone());
        let org = Organization::new("acme", "Acme Clinic");

        let answer = store.lookup(&org, "cafeteria menu", &PromptsConfig::default()).await;

        assert!(answer.contains("Acme Clinic"));
        assert!(answer.starts_with("Sorry"));
        assert!(llm.requests()[0].messages[0].content.contains("Parking is free"));
    }

    #[tokio::test]
    async fn test_source_cached_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.txt");
        std::fs::write(&path, "first version").unwrap();
        let store = store(dir.path(), Arc::new(ScriptedBackend::new()));
        let org = Organization::new("acme", "Acme Clinic");

        assert_eq!(store.load(&org).await.as_deref(), Some("first version"));
        std::fs::write(&path, "second version").unwrap();
        assert_eq!(store.load(&org).await.as_deref(), Some("first version"));

        assert_eq!(store.clear(Some("acme")), 1);
        assert_eq!(store.load(&org).await.as_deref(), Some("second version"));
    }

    #[tokio::test]
    async fn test_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), Arc::new(ScriptedBackend::new()));
        let org = Organization::new("acme", "Acme Clinic");

        assert!(store.load(&org).await.is_none());
        let answer = store.lookup(&org, "anything", &PromptsConfig::default()).await;
        assert!(answer.contains("Acme Clinic"));
    }
}
