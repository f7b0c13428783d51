//! DeFi Agent Plugin Kit CLI
//!
//! Command-line interface for exercising the plugins, the intent parser,
//! and the vault workflows without a host runtime.

use clap::{Parser, Subcommand};
use defi_agent_plugins::{Result, TaskCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "defi-plugins")]
#[command(about = "DeFi wallet plugins and workflow orchestration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the intent parser over a message and show what it extracts
    Parse {
        /// Message text, e.g. "swap 100 USDC for WETH on arbitrum"
        text: String,
    },

    /// Check token balances for an address
    Balance {
        /// Address to inspect (defaults to the configured wallet)
        #[arg(long)]
        address: Option<String>,

        /// Network (ethereum, arbitrum, optimism, base)
        #[arg(short, long, default_value = "ethereum")]
        network: String,
    },

    /// Get a swap quote from Odos
    Quote {
        /// Input token symbol
        #[arg(long)]
        input: String,

        /// Output token symbol
        #[arg(long)]
        output: String,

        /// Amount in whole tokens
        #[arg(long)]
        amount: f64,

        /// Network (ethereum, arbitrum, optimism, base)
        #[arg(short, long, default_value = "ethereum")]
        network: String,
    },

    /// List the plugins, actions, and providers in the default kit
    Plugins,

    /// Show pending tasks addressed to an agent
    Tasks {
        /// Agent name, e.g. lending-agent
        agent: String,

        /// Path to a JSON state file (in-memory when omitted)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Run a vault workflow
    #[command(subcommand)]
    Workflow(WorkflowCommands),
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Run the deposit workflow for a user
    Deposit {
        /// User id the deposit belongs to
        #[arg(long)]
        user: String,

        /// Amount in USDC
        #[arg(long)]
        amount: f64,

        /// Chain the funds arrive from
        #[arg(long, default_value = "ethereum")]
        source: String,

        /// Path to a JSON state file (in-memory when omitted)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Run the risk-gated withdrawal workflow for a user
    Withdraw {
        /// User id the withdrawal belongs to
        #[arg(long)]
        user: String,

        /// Amount in USDC
        #[arg(long)]
        amount: f64,

        /// Chain the funds should land on
        #[arg(long, default_value = "ethereum")]
        destination: String,

        /// Path to a JSON state file (in-memory when omitted)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Seed the portfolio total before running (useful without prior state)
        #[arg(long)]
        portfolio_total: Option<f64>,

        /// Seed the portfolio health factor before running
        #[arg(long)]
        portfolio_health: Option<f64>,

        /// Seed the portfolio leverage ratio before running
        #[arg(long)]
        portfolio_leverage: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Parse { text } => run_parse(&text),
        Commands::Balance { address, network } => run_balance(address, network).await?,
        Commands::Quote {
            input,
            output,
            amount,
            network,
        } => run_quote(input, output, amount, network).await?,
        Commands::Plugins => run_plugins()?,
        Commands::Tasks { agent, state } => run_tasks(agent, state).await?,
        Commands::Workflow(command) => run_workflow(command).await?,
    }

    Ok(())
}

fn run_parse(text: &str) {
    use defi_agent_plugins::intent;

    let parsed = serde_json::json!({
        "amount": intent::extract_amount(text),
        "symbol": intent::extract_symbol(text),
        "symbol_pair": intent::extract_symbol_pair(text),
        "address": intent::extract_address(text).map(|a| a.to_string()),
        "network": intent::extract_network(text).map(|n| n.name()),
        "source": intent::extract_source(text).map(|n| n.name()),
        "destination": intent::extract_destination(text).map(|n| n.name()),
    });
    println!("{}", serde_json::to_string_pretty(&parsed).unwrap());
}

/// Route a synthesized message through the plugin kit, exactly as a host
/// runtime would hand one to an action.
async fn dispatch(action_name: &str, message: String) -> Result<()> {
    use defi_agent_plugins::{default_kit, ActionContext, Error};

    let kit = default_kit(Arc::new(TaskCoordinator::in_memory()))?;
    let action = kit
        .iter()
        .find_map(|plugin| plugin.action(action_name))
        .ok_or_else(|| Error::InvalidArgument(format!("No action named {}", action_name)))?;

    tracing::info!(action = action_name, message = %message, "Dispatching");

    let ctx = ActionContext::new("cli", message);
    let response = action.handle(&ctx).await?;
    println!("{}", response.text);
    if let Some(data) = response.data {
        println!("{}", serde_json::to_string_pretty(&data).unwrap());
    }
    Ok(())
}

async fn run_balance(address: Option<String>, network: String) -> Result<()> {
    let message = match address {
        Some(address) => format!("check balance of {} on {}", address, network),
        None => format!("what's my balance on {}", network),
    };
    dispatch("CHECK_BALANCE", message).await
}

async fn run_quote(input: String, output: String, amount: f64, network: String) -> Result<()> {
    let message = format!("quote {} {} to {} on {}", amount, input, output, network);
    dispatch("GET_SWAP_QUOTE", message).await
}

fn run_plugins() -> Result<()> {
    use defi_agent_plugins::default_kit;

    let kit = default_kit(Arc::new(TaskCoordinator::in_memory()))?;
    for plugin in &kit {
        println!("{} - {}", plugin.name, plugin.description);
        for action in &plugin.actions {
            println!("  action {} {:?}", action.name(), action.similes());
            println!("    {}", action.description());
        }
        for provider in &plugin.providers {
            println!("  provider {}", provider.name());
            println!("    {}", provider.description());
        }
    }
    Ok(())
}

async fn open_coordinator(state: Option<PathBuf>) -> Result<Arc<TaskCoordinator>> {
    use defi_agent_plugins::coordination::{CoordinationError, FileKvStore, InMemoryBus};

    let coordinator = match state {
        Some(path) => {
            let store = FileKvStore::load_or_create(path.display().to_string())
                .await
                .map_err(CoordinationError::from)?;
            TaskCoordinator::new(Arc::new(store), Arc::new(InMemoryBus::new()))
        }
        None => TaskCoordinator::in_memory(),
    };
    Ok(Arc::new(coordinator))
}

async fn run_tasks(agent: String, state: Option<PathBuf>) -> Result<()> {
    let coordinator = open_coordinator(state).await?;
    let tasks = coordinator.pending_tasks(&agent).await?;
    println!("{}", serde_json::to_string_pretty(&tasks).unwrap());
    Ok(())
}

async fn run_workflow(command: WorkflowCommands) -> Result<()> {
    use defi_agent_plugins::coordination::PortfolioUpdate;
    use defi_agent_plugins::workflow::{
        DepositRequest, DepositWorkflow, WithdrawalRequest, WithdrawalWorkflow,
    };

    let report = match command {
        WorkflowCommands::Deposit {
            user,
            amount,
            source,
            state,
        } => {
            let coordinator = open_coordinator(state).await?;
            let request = DepositRequest {
                user_id: user,
                amount_usdc: amount,
                source,
            };
            let mut workflow = DepositWorkflow::new(Arc::clone(&coordinator), request);
            let report = workflow.execute().await;
            print_alerts(&coordinator).await?;
            report
        }
        WorkflowCommands::Withdraw {
            user,
            amount,
            destination,
            state,
            portfolio_total,
            portfolio_health,
            portfolio_leverage,
        } => {
            let coordinator = open_coordinator(state).await?;
            if portfolio_total.is_some()
                || portfolio_health.is_some()
                || portfolio_leverage.is_some()
            {
                coordinator
                    .update_portfolio_state(
                        &user,
                        PortfolioUpdate {
                            total_usdc_value: portfolio_total,
                            health_factor: portfolio_health,
                            leverage_ratio: portfolio_leverage,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            let request = WithdrawalRequest {
                user_id: user,
                amount_usdc: amount,
                destination,
            };
            let mut workflow = WithdrawalWorkflow::new(Arc::clone(&coordinator), request);
            let report = workflow.execute().await;
            print_alerts(&coordinator).await?;
            report
        }
    };

    println!("{}", serde_json::to_string_pretty(&report).unwrap());
    Ok(())
}

async fn print_alerts(coordinator: &TaskCoordinator) -> Result<()> {
    use defi_agent_plugins::coordination::ALERTS_CHANNEL;

    let alerts = coordinator.coordination_messages(ALERTS_CHANNEL, 10).await?;
    for alert in alerts {
        println!("alert: {}", alert.body);
    }
    Ok(())
}
