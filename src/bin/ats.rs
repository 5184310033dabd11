//! ats CLI: operator interface to an automation server workqueue.

use ats_client::model::{ClearFilter, WorkItemId, WorkItemStatus, WorkqueueId};
use ats_client::{AutomationServer, Client};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ats", about = "Automation server worker client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved session, process and workqueue
    Info,
    /// Workqueue operations on the resolved queue
    Queue {
        /// Use this queue instead of the resolved one
        #[arg(long)]
        workqueue: Option<i64>,
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Work item operations
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },
    /// Show a credential (password is never printed)
    Credential {
        name: String,
    },
    /// Show an asset
    Asset {
        name: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Add a work item
    Add {
        /// Caller-chosen reference
        reference: String,
        /// JSON payload
        #[arg(long)]
        data: Option<String>,
    },
    /// Remove work items
    Clear {
        /// Only items in this status
        #[arg(long)]
        status: Option<String>,
        /// Only items older than this many days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Find work items by reference
    Find {
        reference: String,
        /// Only items in this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Claim the next item and print it (it stays in progress)
    Next,
}

#[derive(Subcommand)]
enum ItemAction {
    /// Set a work item's status
    Status {
        id: i64,
        /// new, in progress, completed, failed, pending user action
        status: String,
        #[arg(long, default_value = "")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (server, telemetry) = AutomationServer::init_from_env("ats").await?;
    let result = run(cli.command, &server).await;
    telemetry.flush_audit_log().await;
    result
}

async fn run(command: Command, server: &AutomationServer) -> anyhow::Result<()> {
    let client = server.client();
    match command {
        Command::Info => {
            println!("{server}");
            if let Some(session) = server.session() {
                println!("Session:    {} ({})", session.id, session.status);
            }
            if let Some(process) = server.process() {
                println!("Process:    {} {}", process.id, process.name);
            }
            match server.workqueue().await {
                Ok(queue) => println!(
                    "Workqueue:  {} {} (enabled: {})",
                    queue.id, queue.name, queue.enabled
                ),
                Err(ats_client::Error::NoWorkqueue) => println!("Workqueue:  -"),
                Err(e) => return Err(e.into()),
            }
            Ok(())
        }
        Command::Queue { workqueue, action } => {
            let workqueue_id = match workqueue {
                Some(id) => WorkqueueId(id),
                None => server
                    .workqueue_id()
                    .ok_or(ats_client::Error::NoWorkqueue)?,
            };
            cmd_queue(client, workqueue_id, action).await
        }
        Command::Item {
            action:
                ItemAction::Status {
                    id,
                    status,
                    message,
                },
        } => {
            let status = WorkItemStatus::from(status.as_str());
            client
                .set_item_status(WorkItemId(id), &status, &message)
                .await?;
            println!("Work item {id}: {status}");
            Ok(())
        }
        Command::Credential { name } => {
            let credential = client.get_credential(&name).await?;
            println!("ID:         {}", credential.id);
            println!("Name:       {}", credential.name);
            println!("Username:   {}", credential.username);
            println!(
                "Data:       {}",
                serde_json::to_string_pretty(&credential.data)?
            );
            println!("Updated:    {}", credential.updated_at);
            Ok(())
        }
        Command::Asset { name } => {
            let asset = client.get_asset(&name).await?;
            println!("{}", serde_json::to_string_pretty(&asset)?);
            Ok(())
        }
    }
}

async fn cmd_queue(
    client: &Client,
    workqueue_id: WorkqueueId,
    action: QueueAction,
) -> anyhow::Result<()> {
    match action {
        QueueAction::Add { reference, data } => {
            let data: serde_json::Value = match data {
                Some(json) => serde_json::from_str(&json)?,
                None => serde_json::json!({}),
            };
            let item = client.add_item(workqueue_id, data, &reference).await?;
            println!("Added: {} (status: {})", item.id, item.status);
        }
        QueueAction::Clear { status, days } => {
            let filter = ClearFilter {
                workitem_status: status.as_deref().map(WorkItemStatus::from),
                days_older_than: days,
            };
            client.clear_workqueue(workqueue_id, &filter).await?;
            println!("Cleared workqueue {workqueue_id}");
        }
        QueueAction::Find { reference, status } => {
            let status = status.as_deref().map(WorkItemStatus::from);
            let items = client
                .get_items_by_reference(workqueue_id, &reference, status.as_ref())
                .await?;

            if items.is_empty() {
                println!("No work items found.");
                return Ok(());
            }

            println!("{:<8}  {:<20}  {:<30}  UPDATED", "ID", "STATUS", "MESSAGE");
            println!("{}", "-".repeat(80));
            for item in &items {
                let message: String = item.message.chars().take(30).collect();
                println!(
                    "{:<8}  {:<20}  {:<30}  {}",
                    item.id,
                    item.status,
                    message,
                    item.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\n{} item(s)", items.len());
        }
        QueueAction::Next => match client.items(workqueue_id).next().await? {
            Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
            None => println!("Workqueue {workqueue_id} is empty."),
        },
    }
    Ok(())
}
