use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::agents::{AnswerComposer, AzureChatModel, AzureOpenAiEmbedder, AzureSearchRetriever};
use crate::config::Config;
use crate::error::StartupError;
use crate::pipeline::RagPipeline;

#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn build(&self, config: &Config) -> Result<RagPipeline, StartupError>;
}

/// Builds the Azure OpenAI + Azure AI Search clients.
pub struct AzurePipelineFactory;

#[async_trait]
impl PipelineFactory for AzurePipelineFactory {
    async fn build(&self, config: &Config) -> Result<RagPipeline, StartupError> {
        let secrets = &config.secrets;
        let settings = &config.settings;

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| StartupError::ClientConstruction(format!("HTTP client: {}", e)))?;

        let embedder = Arc::new(AzureOpenAiEmbedder::new(
            http.clone(),
            &secrets.openai_endpoint,
            secrets.openai_api_key.clone(),
            &settings.embedding_deployment,
            &settings.openai_api_version,
        ));

        let retriever = AzureSearchRetriever::connect(
            http.clone(),
            &secrets.search_endpoint,
            secrets.search_key.clone(),
            &settings.search_index,
            &settings.search_api_version,
            settings.top_k,
            embedder,
        )
        .await?;

        let chat = AzureChatModel::new(
            http,
            &secrets.openai_endpoint,
            secrets.openai_api_key.clone(),
            &settings.chat_deployment,
            &settings.openai_api_version,
        );

        Ok(RagPipeline::new(
            Arc::new(retriever),
            AnswerComposer::new(Arc::new(chat)),
        ))
    }
}

/// Owns the validated config and builds the pipeline at most once.
pub struct Engine {
    config: Config,
    factory: Arc<dyn PipelineFactory>,
    pipeline: OnceCell<Arc<RagPipeline>>,
}

impl Engine {
    pub fn new(config: Config, factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            config,
            factory,
            pipeline: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn pipeline(&self) -> Result<Arc<RagPipeline>, StartupError> {
        self.pipeline
            .get_or_try_init(|| async {
                self.factory.build(&self.config).await.map(Arc::new)
            })
            .await
            .cloned()
    }
}

pub enum Startup {
    Ready {
        engine: Engine,
        pipeline: Arc<RagPipeline>,
    },
    Halted(StartupError),
}

/// Takes the loaded configuration, then builds the clients. No client is
/// built unless every secret is present.
pub async fn initialize(
    config: Result<Config, StartupError>,
    factory: Arc<dyn PipelineFactory>,
) -> Startup {
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(kind = ?err.kind(), "Startup halted: {}", err);
            return Startup::Halted(err);
        }
    };
    info!(
        index = %config.settings.search_index,
        chat = %config.settings.chat_deployment,
        "Configuration loaded"
    );

    let engine = Engine::new(config, factory);
    match engine.pipeline().await {
        Ok(pipeline) => {
            info!("Connected to Azure AI Services");
            Startup::Ready { engine, pipeline }
        }
        Err(err) => {
            error!(kind = ?err.kind(), "Connection Failed: {}", err);
            Startup::Halted(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{tests::full_env, REQUIRED_VARS};
    use crate::pipeline::tests::{pipeline, FixedRetriever, ScriptedModel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PipelineFactory for CountingFactory {
        async fn build(&self, _config: &Config) -> Result<RagPipeline, StartupError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StartupError::ClientConstruction("index not found".into()));
            }
            Ok(pipeline(
                Arc::new(FixedRetriever::returning(vec![])),
                Arc::new(ScriptedModel::echo()),
            ))
        }
    }

    #[tokio::test]
    async fn any_missing_secret_halts_before_building_clients() {
        for name in REQUIRED_VARS {
            let mut env = full_env();
            env.remove(name);
            let factory = Arc::new(CountingFactory::default());

            let startup = initialize(Config::from_lookup(|k| env.get(k).cloned()), factory.clone()).await;

            match startup {
                Startup::Halted(StartupError::MissingConfiguration { missing }) => {
                    assert_eq!(missing, vec![name])
                }
                _ => panic!("expected halt for missing {name}"),
            }
            assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn construction_failure_halts() {
        let env = full_env();
        let factory = Arc::new(CountingFactory {
            fail: true,
            ..Default::default()
        });

        let startup = initialize(Config::from_lookup(|k| env.get(k).cloned()), factory).await;

        assert!(matches!(
            startup,
            Startup::Halted(StartupError::ClientConstruction(_))
        ));
    }

    #[tokio::test]
    async fn pipeline_is_built_once_and_shared() {
        let env = full_env();
        let factory = Arc::new(CountingFactory::default());

        let Startup::Ready { engine, pipeline } =
            initialize(Config::from_lookup(|k| env.get(k).cloned()), factory.clone()).await
        else {
            panic!("expected ready");
        };
        let again = engine.pipeline().await.unwrap();
        let third = engine.pipeline().await.unwrap();

        assert!(Arc::ptr_eq(&pipeline, &again));
        assert!(Arc::ptr_eq(&again, &third));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(engine.config().settings.search_index, "finance-index");
    }
}
