//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands, TenantCommands, UserCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME_LOWER, ENV_LOG, ROLE_ADMIN, ROLE_MANAGER, ROLE_MEMBER, ROLE_VIEWER, TOPIC_LEAD_EVENTS,
};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::data::topics::TopicService;
use crate::domain::ingestion::consumer::LeadConsumer;
use crate::domain::ingestion::facebook::GraphClient;
use crate::domain::{
    AssignmentService, IngestionService, LeadEvent, PipelineService, TransitionGraph,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub topics: Arc<TopicService>,
    pub pipeline: Arc<PipelineService>,
    pub assignment: Arc<AssignmentService>,
    pub ingestion: Arc<IngestionService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System {
                command: system_cmd,
            }) => {
                return Self::handle_system_command(system_cmd);
            }
            Some(Commands::Tenant {
                command: tenant_cmd,
            }) => {
                return Self::handle_tenant_command(&cli_config, tenant_cmd).await;
            }
            Some(Commands::User { command: user_cmd }) => {
                return Self::handle_user_command(&cli_config, user_cmd).await;
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;

        let database = Arc::new(
            SqliteService::init(&storage)
                .await
                .context("Failed to initialize database")?,
        );
        let topics = Arc::new(TopicService::new());

        let graph =
            Arc::new(TransitionGraph::load(config.pipeline.transitions_file.as_deref())?);

        let graph_client = if config.facebook.is_configured() {
            // is_configured() guarantees both credentials are present
            let access_token = config.facebook.access_token.as_deref().unwrap_or_default();
            let app_secret = config.facebook.app_secret.as_deref().unwrap_or_default();
            Some(GraphClient::new(
                &config.facebook.graph_base,
                access_token,
                app_secret,
            )?)
        } else {
            None
        };

        let pipeline = Arc::new(PipelineService::new(database.clone(), graph));
        let assignment = Arc::new(AssignmentService::new(database.clone()));
        let ingestion = Arc::new(IngestionService::new(database.clone(), graph_client));

        let shutdown = ShutdownService::new(topics.clone(), database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            topics,
            pipeline,
            assignment,
            ingestion,
        })
    }

    /// Open the database for a one-shot provisioning command
    async fn open_database(cli: &CliConfig) -> Result<(AppConfig, Arc<SqliteService>)> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = Arc::new(
            SqliteService::init(&storage)
                .await
                .context("Failed to initialize database")?,
        );
        Ok((config, database))
    }

    async fn handle_tenant_command(cli: &CliConfig, cmd: TenantCommands) -> Result<()> {
        match cmd {
            TenantCommands::Create { name, fb_page_id } => {
                let (_config, database) = Self::open_database(cli).await?;
                let tenant = crate::data::sqlite::repositories::tenants::create_tenant(
                    database.pool(),
                    &name,
                    fb_page_id.as_deref(),
                )
                .await?;

                println!("Tenant created");
                println!("  id:          {}", tenant.id);
                println!("  name:        {}", tenant.name);
                if let Some(page) = &tenant.fb_page_id {
                    println!("  fb_page_id:  {page}");
                }
                println!("  webhook key: {}", tenant.webhook_key);
                println!();
                println!("Send website leads with the 'x-webhook-key' header set to this key.");

                database.close().await;
                Ok(())
            }
        }
    }

    async fn handle_user_command(cli: &CliConfig, cmd: UserCommands) -> Result<()> {
        match cmd {
            UserCommands::Create {
                tenant,
                email,
                first_name,
                last_name,
                role,
            } => {
                if ![ROLE_VIEWER, ROLE_MEMBER, ROLE_MANAGER, ROLE_ADMIN]
                    .contains(&role.as_str())
                {
                    anyhow::bail!(
                        "Invalid role '{role}'. Expected one of: viewer, member, manager, admin"
                    );
                }

                let (_config, database) = Self::open_database(cli).await?;

                crate::data::sqlite::repositories::tenants::get_tenant(database.pool(), &tenant)
                    .await?
                    .with_context(|| format!("Tenant not found: {tenant}"))?;

                let (user, token) = crate::data::sqlite::repositories::users::create_user(
                    database.pool(),
                    &tenant,
                    &email,
                    &first_name,
                    &last_name,
                    &role,
                )
                .await?;

                println!("User created");
                println!("  id:    {}", user.id);
                println!("  email: {}", user.email);
                println!("  role:  {}", user.role);
                println!();
                println!("API token (shown once, store it now):");
                println!("  {token}");

                database.close().await;
                Ok(())
            }
        }
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete the local data directory:");
        println!("  {}", data_dir.display());
        println!();
        println!(
            "Make sure the server is not running. \
             Deleting data while the server is running will cause data corruption."
        );

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await?;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            app.config.facebook.is_configured(),
            &app.storage.data_dir().display().to_string(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) -> Result<()> {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        // Lead event stream: at-least-once delivery with consumer groups
        let lead_topic = self.topics.stream_topic::<LeadEvent>(TOPIC_LEAD_EVENTS);
        let consumer = LeadConsumer::new(self.ingestion.clone());

        self.shutdown
            .register(consumer.start(lead_topic, self.shutdown.subscribe()))
            .await;

        tracing::debug!("Background tasks started");
        Ok(())
    }
}
