//! Demo configuration and CLI argument parsing
//!
//! Settings come from command-line arguments or environment variables with
//! the THROTTLEPOOL_ prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # 2 workers, 10 tasks per minute, 100 tasks
//! throttlepool -n 2 -x 10 -t 100
//!
//! # Using environment variables
//! export THROTTLEPOOL_WORKERS=4
//! export THROTTLEPOOL_INTERVAL_SECS=30
//! throttlepool
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use std::time::Duration;
use throttlepool::PoolConfig;

/// Configuration of one demo run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Pool settings
    pub pool: PoolSettings,
    /// Example task generation settings
    pub tasks: TaskSettings,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Print the final statistics as JSON
    pub json_summary: bool,
}

/// Rate-limited pool settings
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    /// Worker thread count
    pub workers: usize,
    /// Submissions admitted per interval
    pub max_per_interval: usize,
    /// Quota window length in seconds
    pub interval_secs: u64,
}

/// Example task settings
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSettings {
    /// Number of tasks to submit
    pub count: usize,
    /// Upper bound of each task's random sleep, in seconds
    pub max_sleep_secs: u64,
}

/// Command-line arguments for the demo
///
/// All arguments can also be set via environment variables with the
/// THROTTLEPOOL_ prefix. CLI arguments take precedence.
///
/// # Examples
///
/// ```bash
/// throttlepool --workers 4 --max-per-interval 20 --interval-secs 30
/// throttlepool -t 10 --max-task-secs 2 --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "throttlepool",
    about = "Rate-limited worker pool demo",
    long_about = "Submits randomly sleeping example tasks to a worker pool that admits at most a fixed number of tasks per interval.\n\nPress Ctrl-C to stop submitting; already dispatched tasks finish before exit.\n\nEnvironment variables with THROTTLEPOOL_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    #[arg(
        short = 'n',
        long,
        value_name = "N",
        help = "Worker thread count",
        default_value_t = 2,
        env = "THROTTLEPOOL_WORKERS"
    )]
    pub workers: usize,
    #[arg(
        short = 'x',
        long,
        visible_alias = "max-per-minute",
        value_name = "N",
        help = "Tasks admitted per interval",
        default_value_t = 10,
        env = "THROTTLEPOOL_MAX_PER_INTERVAL"
    )]
    pub max_per_interval: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Quota interval length (seconds)",
        default_value_t = 60,
        env = "THROTTLEPOOL_INTERVAL_SECS"
    )]
    pub interval_secs: u64,

    #[arg(
        short = 't',
        long,
        value_name = "N",
        help = "Number of example tasks to submit",
        default_value_t = 100,
        env = "THROTTLEPOOL_NUMBER_OF_TASKS"
    )]
    pub number_of_tasks: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Maximum sleep of an example task (seconds)",
        default_value_t = 10,
        env = "THROTTLEPOOL_MAX_TASK_SECS"
    )]
    pub max_task_secs: u64,

    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "THROTTLEPOOL_LOG_LEVEL"
    )]
    pub log_level: String,
    #[arg(
        long,
        help = "Print final statistics as JSON",
        env = "THROTTLEPOOL_JSON_SUMMARY"
    )]
    pub json_summary: bool,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Config::from(args);
        config.validate()?;
        Ok(config)
    }

    /// Pool configuration for the library
    pub fn pool_config(&self) -> Result<PoolConfig> {
        PoolConfig::builder()
            .max_workers(self.pool.workers)
            .max_per_interval(self.pool.max_per_interval)
            .interval(Duration::from_secs(self.pool.interval_secs))
            .thread_name_prefix("demo")
            .build()
            .map_err(|e| anyhow!("Invalid pool configuration: {}", e))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the pool settings are zero or the task sleep
    /// bound is zero.
    fn validate(&self) -> Result<()> {
        if self.pool.workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        if self.pool.max_per_interval == 0 {
            return Err(anyhow!("--max-per-interval must be at least 1"));
        }
        if self.pool.interval_secs == 0 {
            return Err(anyhow!("--interval-secs must be at least 1"));
        }
        if self.tasks.max_sleep_secs == 0 {
            return Err(anyhow!("--max-task-secs must be at least 1"));
        }
        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("ThrottlePool Environment Variables");
        println!("==================================");
        println!();
        println!("All environment variables use the THROTTLEPOOL_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Pool Configuration:");
        println!("  THROTTLEPOOL_WORKERS=<n>              Worker thread count [default: 2]");
        println!(
            "  THROTTLEPOOL_MAX_PER_INTERVAL=<n>     Tasks admitted per interval [default: 10]"
        );
        println!("  THROTTLEPOOL_INTERVAL_SECS=<secs>     Quota interval length [default: 60]");
        println!();

        println!("Task Configuration:");
        println!("  THROTTLEPOOL_NUMBER_OF_TASKS=<n>      Example tasks to submit [default: 100]");
        println!("  THROTTLEPOOL_MAX_TASK_SECS=<secs>     Maximum task sleep [default: 10]");
        println!();

        println!("General Configuration:");
        println!(
            "  THROTTLEPOOL_LOG_LEVEL=<level>        Log level: error, warn, info, debug, trace [default: info]"
        );
        println!("  THROTTLEPOOL_JSON_SUMMARY=true|false  Print final statistics as JSON");
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            pool: PoolSettings {
                workers: args.workers,
                max_per_interval: args.max_per_interval,
                interval_secs: args.interval_secs,
            },
            tasks: TaskSettings {
                count: args.number_of_tasks,
                max_sleep_secs: args.max_task_secs,
            },
            log_level: args.log_level,
            json_summary: args.json_summary,
        }
    }
}
