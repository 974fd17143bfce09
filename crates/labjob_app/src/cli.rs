use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use labjob_app::{ClientConfig, NormaliseQuery, QueryError};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "labjob",
    version,
    about = "Submit a lab job, follow its progress and cancel it"
)]
pub struct Cli {
    /// RON config file (default: ./labjob.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend root URL, overrides the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Wait this long for a terminal event after a cancel is acknowledged
    #[arg(long, global = true)]
    pub cancel_grace_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Submit a job and follow it until it completes. Ctrl-C cancels.
    Run(RunArgs),
    /// Ask the backend to cancel a job by id
    Cancel { job_id: String },
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "Normalise")]
    pub app: String,

    #[arg(long, default_value_t = 50.0)]
    pub target_mass: f64,

    #[arg(long, default_value = "Temperature Module")]
    pub temp_deck: String,

    #[arg(long, default_value_t = 0.5)]
    pub vol_scale: f64,

    /// Extra payload field as key=value; repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

impl RunArgs {
    pub fn to_query(&self) -> Result<NormaliseQuery, QueryError> {
        let query = NormaliseQuery {
            app: self.app.clone(),
            target_mass: self.target_mass,
            temp_deck: self.temp_deck.clone(),
            vol_scale: self.vol_scale,
            ..NormaliseQuery::default()
        };
        self.params
            .iter()
            .try_fold(query, |query, raw| query.with_param(raw))
    }
}

impl Cli {
    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(grace) = self.cancel_grace_ms {
            config.cancel_grace_ms = grace;
        }
    }
}
