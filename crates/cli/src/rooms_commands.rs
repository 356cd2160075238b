use std::sync::Arc;

use {
    clap::Subcommand,
    crossover_common::Endpoint,
    crossover_config::CrossoverConfig,
    crossover_relay::{MembershipCache, RoomManager},
};

#[derive(Subcommand)]
pub enum RoomsAction {
    /// List the rooms a channel is linked through.
    List {
        guild_id: u64,
        channel_id: u64,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_rooms(action: RoomsAction, config: &CrossoverConfig) -> anyhow::Result<()> {
    match action {
        RoomsAction::List {
            guild_id,
            channel_id,
            json,
        } => {
            let store = crate::open_store(config).await?;
            let manager = RoomManager::new(Arc::new(store.clone()), Arc::new(MembershipCache::new()));
            let links = manager
                .list_connections(Endpoint::new(guild_id, channel_id))
                .await?;
            store.close().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&links)?);
            } else if links.is_empty() {
                println!("No connected rooms.");
            } else {
                for link in &links {
                    println!("  {}  ->  {}", link.room_id, link.target);
                }
            }
            Ok(())
        },
    }
}
