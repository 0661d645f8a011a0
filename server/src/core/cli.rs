use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_FB_ACCESS_TOKEN, ENV_FB_APP_SECRET, ENV_FB_VERIFY_TOKEN, ENV_HOST,
    ENV_PORT, ENV_TRANSITIONS_FILE,
};

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(version, about = "Multi-tenant CRM lead backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose webhook logging)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Facebook app secret (webhook signature verification)
    #[arg(long, global = true, env = ENV_FB_APP_SECRET, hide_env_values = true)]
    pub fb_app_secret: Option<String>,

    /// Facebook webhook verify token (GET handshake)
    #[arg(long, global = true, env = ENV_FB_VERIFY_TOKEN, hide_env_values = true)]
    pub fb_verify_token: Option<String>,

    /// Facebook page access token (Graph API lead fetch)
    #[arg(long, global = true, env = ENV_FB_ACCESS_TOKEN, hide_env_values = true)]
    pub fb_access_token: Option<String>,

    /// Path to a JSON file overriding the pipeline transition graph
    #[arg(long, global = true, env = ENV_TRANSITIONS_FILE)]
    pub transitions_file: Option<PathBuf>,

    /// Per-user cap for bulk lead assignment
    #[arg(long, global = true)]
    pub max_leads_per_user: Option<u32>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Tenant provisioning commands
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// User provisioning commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum TenantCommands {
    /// Create a tenant and print its webhook key
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Facebook page id mapped to this tenant
        #[arg(long)]
        fb_page_id: Option<String>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum UserCommands {
    /// Create a user and print their API token (shown once)
    Create {
        /// Tenant id the user belongs to
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// One of: viewer, member, manager, admin
        #[arg(long, default_value = "member")]
        role: String,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (database, caches). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub fb_app_secret: Option<String>,
    pub fb_verify_token: Option<String>,
    pub fb_access_token: Option<String>,
    pub transitions_file: Option<PathBuf>,
    pub max_leads_per_user: Option<u32>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        fb_app_secret: cli.fb_app_secret,
        fb_verify_token: cli.fb_verify_token,
        fb_access_token: cli.fb_access_token,
        transitions_file: cli.transitions_file,
        max_leads_per_user: cli.max_leads_per_user,
    };
    (config, cli.command)
}
