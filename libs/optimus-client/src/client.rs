//! Entry point wiring the backend, the query cache and both orchestrators.

use std::sync::Arc;

use optimus_common::config::ClientConfig;

use crate::api::JudgeApi;
use crate::cache::{Invalidation, QueryCache};
use crate::error::{ApiError, ClientError, ClientResult};
use crate::http::HttpJudgeApi;
use crate::registry::LanguageRegistry;
use crate::run::RunSlot;
use crate::submission::{PollConfig, SubmissionManager};
use crate::tags::{Mutation, Tag, TagKind};

/// One client session: a backend, a shared cache, and configuration.
///
/// Orchestrators created from the same client share its cache, so a
/// submission made through one manager refreshes list views opened through
/// another.
pub struct OptimusClient<A: JudgeApi = HttpJudgeApi> {
    api: Arc<A>,
    cache: QueryCache,
    config: ClientConfig,
}

impl OptimusClient<HttpJudgeApi> {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let api = HttpJudgeApi::new(&config)?;
        Self::with_api(api, config)
    }
}

impl<A: JudgeApi> OptimusClient<A> {
    /// Fails if `config` does not pass [`ClientConfig::validated`].
    pub fn with_api(api: A, config: ClientConfig) -> ClientResult<Self> {
        let config = config.validated().map_err(ClientError::Config)?;
        Ok(Self {
            api: Arc::new(api),
            cache: QueryCache::new(config.cache_capacity),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Language snapshot, fetched once and cached under `Language:LIST`.
    pub async fn languages(&self) -> ClientResult<Arc<LanguageRegistry>> {
        let api = Arc::clone(&self.api);
        let default_language = self.config.default_language.clone();
        let view = self
            .cache
            .fetch("languages", vec![Tag::list(TagKind::Language)], move || {
                let api = Arc::clone(&api);
                let default_language = default_language.clone();
                async move {
                    let languages = api.list_languages().await?;
                    Ok::<_, ApiError>(LanguageRegistry::from_snapshot(
                        languages,
                        &default_language,
                    ))
                }
            })
            .await?;
        Ok(view.value())
    }

    /// A fresh run slot for one editor.
    pub async fn run_slot(&self) -> ClientResult<RunSlot<A>> {
        Ok(RunSlot::new(Arc::clone(&self.api), self.languages().await?))
    }

    pub async fn submissions(&self) -> ClientResult<SubmissionManager<A>> {
        Ok(SubmissionManager::new(
            Arc::clone(&self.api),
            self.cache.clone(),
            self.languages().await?,
            PollConfig::from_config(&self.config),
        )
        .with_page_limit(self.config.page_limit))
    }

    /// Report a mutation made elsewhere in the application.
    pub fn apply(&self, mutation: &Mutation) -> Invalidation {
        self.cache.apply(mutation)
    }
}
