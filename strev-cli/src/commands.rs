use crate::{
    cli::OutputFormat,
    config::AppConfig,
    error::{CliError, Result},
    output::{OutputManager, write_output},
};
#[cfg(feature = "colored-output")]
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use platforms_parser::{
    aggregator::Aggregator,
    enrichment::EnrichmentClient,
    extractor::{ExtractorFactory, HttpClients, ProviderSelection},
    gateway::{BatchGateway, parse_method, parse_urls},
    media::{EpisodeId, EpisodeStreams, QualityLabel},
    resolver::StreamResolver,
};
use std::{path::Path, sync::Arc, time::Duration};
use strev_cache::CacheManager;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, info};

pub struct CommandExecutor {
    config: AppConfig,
    clients: HttpClients,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Result<Self> {
        let clients = HttpClients::new(config.proxy(), config.timeout())?;
        Ok(Self { config, clients })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn output_format(&self, requested: Option<OutputFormat>) -> OutputFormat {
        requested.unwrap_or(self.config.default_output_format)
    }

    fn output_manager(&self) -> OutputManager {
        OutputManager::new(self.config.colored_output)
    }

    pub fn factory(&self) -> ExtractorFactory {
        ExtractorFactory::new(self.clients.clone(), self.config.providers.clone())
    }

    pub fn gateway(&self) -> BatchGateway {
        let gateway = BatchGateway::new(self.clients.client.clone());
        match &self.config.user_agent {
            Some(user_agent) => gateway.with_user_agent(user_agent),
            None => gateway,
        }
    }

    pub fn enrichment(&self) -> EnrichmentClient {
        EnrichmentClient::new(self.clients.client.clone(), &self.config.enrichment)
    }

    pub async fn cache(&self) -> Result<Option<Arc<CacheManager>>> {
        if !self.config.cache.enabled {
            return Ok(None);
        }
        Ok(Some(Arc::new(CacheManager::new(self.config.cache.clone()).await?)))
    }

    /// Resolve every episode, at most `max_concurrent` at a time. Results keep
    /// the input order.
    pub async fn resolve(
        &self,
        episodes: &[String],
        providers: &[String],
        min_quality: Option<QualityLabel>,
        output_format: Option<OutputFormat>,
        output_file: Option<&Path>,
        use_cache: bool,
    ) -> Result<()> {
        let episodes = episodes
            .iter()
            .map(|raw| EpisodeId::parse(raw).map_err(CliError::from))
            .collect::<Result<Vec<_>>>()?;

        if self.config.providers.is_empty() {
            return Err(CliError::invalid_input(
                "no providers configured, add [[providers]] entries to the configuration",
            ));
        }

        let selection = if providers.is_empty() {
            ProviderSelection::All
        } else {
            ProviderSelection::parse(&providers.join(","))
        };

        let cache = if use_cache { self.cache().await? } else { None };
        let aggregator = Arc::new(Aggregator::new(Arc::new(self.factory())));
        let resolver = Arc::new(StreamResolver::new(aggregator, cache.clone()));

        let pb = self.create_progress_bar(&format!("Resolving {} episode(s)...", episodes.len()));
        let results = self
            .resolve_all(resolver, episodes, selection, min_quality)
            .await;
        pb.finish_and_clear();

        // Detached cache writes must land before the process exits
        if let Some(cache) = &cache {
            cache.settle().await;
        }

        let results = results?;
        let found = results.iter().filter(|r| r.has_streams()).count();
        info!(episodes = results.len(), found, "Resolution finished");

        let output = self
            .output_manager()
            .format_streams(&results, &self.output_format(output_format))?;
        write_output(&output, output_file)?;

        match results.as_slice() {
            [single] if !single.has_streams() => {
                Err(CliError::no_streams_found(single.episode.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn resolve_all(
        &self,
        resolver: Arc<StreamResolver>,
        episodes: Vec<EpisodeId>,
        selection: ProviderSelection,
        min_quality: Option<QualityLabel>,
    ) -> Result<Vec<EpisodeStreams>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let timeout_duration = self.config.timeout().saturating_mul(2);
        let mut tasks = Vec::with_capacity(episodes.len());

        for episode in episodes {
            let permit = semaphore.clone().acquire_owned().await?;
            let resolver = resolver.clone();
            let selection = selection.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                debug!(episode = %episode, "Resolving");
                match timeout(timeout_duration, resolver.resolve(&episode, &selection, None)).await
                {
                    Ok(Ok(resolved)) => Ok(match min_quality {
                        Some(min) => resolved.streams.with_min_quality(min),
                        None => resolved.streams,
                    }),
                    Ok(Err(e)) => Err(CliError::from(e)),
                    Err(_) => Err(CliError::timeout(timeout_duration.as_secs())),
                }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await??);
        }
        Ok(results)
    }

    pub async fn fetch(
        &self,
        url: Option<&str>,
        urls: Option<&str>,
        method: Option<&str>,
        body: Option<&str>,
        output_format: Option<OutputFormat>,
        output_file: Option<&Path>,
    ) -> Result<()> {
        let method = parse_method(method)?;
        let gateway = self.gateway();

        if let Some(url) = url {
            let pb = self.create_progress_bar("Fetching...");
            let response = gateway.fetch_raw(url, &method, body).await;
            pb.finish_and_clear();
            let response = response?;
            debug!(status = response.status, "Fetched");
            let content = String::from_utf8_lossy(&response.body);
            write_output(&content, output_file)?;
            return Ok(());
        }

        let urls = parse_urls(urls.unwrap_or_default());
        if urls.is_empty() {
            return Err(platforms_parser::gateway::GatewayError::NoUrls.into());
        }

        let pb = self.create_progress_bar(&format!("Fetching {} url(s)...", urls.len()));
        let results = gateway.fetch_all(&urls, &method, body).await;
        pb.finish_and_clear();

        let output = self
            .output_manager()
            .format_fetch_results(&results, &self.output_format(output_format))?;
        write_output(&output, output_file)
    }

    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        output_format: Option<OutputFormat>,
    ) -> Result<()> {
        let pb = self.create_progress_bar("Searching...");
        let results = self.enrichment().search(query, limit).await;
        pb.finish_and_clear();

        let output = self
            .output_manager()
            .format_search(&results?, &self.output_format(output_format))?;
        write_output(&output, None)
    }

    pub async fn details(&self, id: u64, output_format: Option<OutputFormat>) -> Result<()> {
        let pb = self.create_progress_bar("Loading title...");
        let details = self.enrichment().details(id).await;
        pb.finish_and_clear();

        let output = self
            .output_manager()
            .format_details(&details?, &self.output_format(output_format))?;
        write_output(&output, None)
    }

    pub fn list_providers(
        &self,
        detailed: bool,
        output_format: Option<OutputFormat>,
    ) -> Result<()> {
        let output = self.output_manager().format_providers(
            &self.config.providers,
            detailed,
            &self.output_format(output_format),
        )?;
        write_output(&output, None)
    }

    pub async fn clear_cache(&self) -> Result<()> {
        let cache = CacheManager::new(self.config.cache.clone()).await?;
        cache.clear().await?;

        #[cfg(feature = "colored-output")]
        {
            if self.config.colored_output {
                println!("{}", "✓ Cache cleared".green());
                return Ok(());
            }
        }
        println!("✓ Cache cleared");
        Ok(())
    }

    fn create_progress_bar(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .map(|style| style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "))
        {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platforms_parser::extractor::{ProviderConfig, ProviderKind};
    use strev_cache::{CacheConfig, StoreKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(server: &MockServer, cache_dir: &Path) -> CommandExecutor {
        let config = AppConfig {
            colored_output: false,
            default_timeout: 5,
            cache: CacheConfig {
                store: StoreKind::File,
                disk_cache_path: Some(cache_dir.to_path_buf()),
                ..CacheConfig::default()
            },
            providers: vec![ProviderConfig::new(
                "ap",
                "Alpha",
                ProviderKind::Page,
                server.uri(),
            )],
            ..AppConfig::default()
        };
        CommandExecutor::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_persists_to_file_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frieren-episode-5/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"file: "https://cdn.example/frieren/5-1080p.m3u8""#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("streams.json");
        let executor = executor(&server, &dir.path().join("cache"));
        let episodes = vec!["frieren-episode-5".to_string()];

        // The second run is answered by the on-disk store
        for _ in 0..2 {
            executor
                .resolve(&episodes, &[], None, Some(OutputFormat::Json), Some(&out), true)
                .await
                .unwrap();
        }

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["streams"][0]["url"], "https://cdn.example/frieren/5-1080p.m3u8");
    }

    #[tokio::test]
    async fn test_resolve_rejects_malformed_episode() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(&server, dir.path());
        let result = executor
            .resolve(&["not an id".to_string()], &[], None, None, None, false)
            .await;
        assert!(matches!(result, Err(CliError::Extractor(_))));
    }

    #[tokio::test]
    async fn test_batch_fetch_writes_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fetch.json");
        let executor = executor(&server, dir.path());
        let urls = format!("{0}/a,{0}/b,ftp://nope", server.uri());
        executor
            .fetch(None, Some(&urls), None, None, Some(OutputFormat::JsonCompact), Some(&out))
            .await
            .unwrap();

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|r| r["success"] == true));
    }
}
