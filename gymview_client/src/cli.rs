//! Command-line interface definitions using clap derive API.

use clap::{Parser, Subcommand};

use crate::protocol::{AlgorithmKind, EnvironmentKind};

/// gymview terminal client
#[derive(Parser)]
#[command(name = "gymview-cli")]
#[command(about = "Terminal client for a reinforcement-learning training backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a training session and stream live updates until completion or Ctrl-C
    Watch {
        /// Environment to train in (e.g. gridworld, cartpole)
        #[arg(long)]
        environment: EnvironmentKind,
        /// Algorithm to train with (e.g. q_learning, sarsa)
        #[arg(long)]
        algorithm: AlgorithmKind,
        /// Number of episodes to run
        #[arg(long, default_value_t = 1000)]
        n_episodes: u32,
        /// Maximum steps per episode
        #[arg(long, default_value_t = 500)]
        max_steps: u32,
        /// Exploration rate
        #[arg(long, default_value_t = 0.1)]
        epsilon: f64,
        /// Learning rate
        #[arg(long, default_value_t = 0.1)]
        learning_rate: f64,
        /// Discount factor
        #[arg(long, default_value_t = 0.99)]
        discount_factor: f64,
        /// Lookahead for n-step TD methods
        #[arg(long, default_value_t = 1)]
        n_step: u32,
        /// Producer-side delay between steps, in milliseconds
        #[arg(long, default_value_t = 200)]
        step_delay_ms: u32,
    },
    /// Show the backend's status for a session
    Status {
        session_id: String,
    },
    /// Stop a running session
    Stop {
        session_id: String,
    },
    /// Delete a session on the backend
    Delete {
        session_id: String,
    },
    /// List available environments, or show one by id
    Environments {
        id: Option<String>,
    },
    /// List available algorithms, or show one by id
    Algorithms {
        id: Option<String>,
    },
}
