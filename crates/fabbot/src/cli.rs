use clap::{Parser, Subcommand};

/// Fabrika: multi-tenant Telegram bot platform
#[derive(Parser)]
#[command(name = "fabrika", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the platform: admin bot + worker webhook server
    Run,

    /// Block a provisioned bot (idempotent, writes an audit entry)
    BlockBot {
        /// Bot id from the bots table
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = "manual block")]
        reason: String,
    },

    /// Block a user for a specific bot (poison record in the session store)
    BlockUser {
        /// Bot id the user is blocked for
        #[arg(long)]
        bot: i64,
        /// Telegram user id
        #[arg(long)]
        user: i64,
        #[arg(long, default_value = "manual block")]
        reason: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
