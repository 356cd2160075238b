//! `crossover` command verbs.
//!
//! Parsing is pure; [`CommandSurface::execute`] applies the permission guard,
//! calls into the [`RoomManager`], notifies the remote side of link changes,
//! and turns topology errors into reply text.

use std::{fmt, sync::Arc};

use {
    crossover_channels::{Permissions, RelayPlatform, is_permitted},
    crossover_common::Endpoint,
    tracing::{info, warn},
};

use crate::{error::Result, manager::RoomManager, model::RoomLink};

pub const USAGE: &str = "Usage: `crossover` | `crossover connect <code>` | \
                         `crossover disconnect <code>` | `crossover list`";
pub const PERMISSION_DENIED: &str = "You need the Manage Server permission to use this command.";
pub const GUILD_ONLY: &str = "This command only works inside a server channel.";
pub const LINKED: &str = "Linking success!";
pub const UNLINKED: &str = "Disconnection success!";
pub const NO_ROOMS: &str = "No connected rooms.";
pub const LIST_HEADING: &str = "All connected rooms";
pub const COMMAND_FAILED: &str = "Something went wrong running that command, please try again later.";

/// Permission every crossover verb requires.
pub const REQUIRED: Permissions = Permissions::MANAGE_GUILD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossoverCommand {
    OpenRoom,
    Connect { code: String },
    Disconnect { code: String },
    List,
}

/// Malformed `crossover` invocation; displays as the usage line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage;

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(USAGE)
    }
}

/// Parse `content` as a `crossover` invocation.
///
/// `None` when the message is not addressed to this command at all.
pub fn parse_command(
    content: &str,
    prefixes: &[String],
) -> Option<std::result::Result<CrossoverCommand, Usage>> {
    let content = content.trim_start();
    let rest = prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| content.strip_prefix(p.as_str()))?;

    let mut words = rest.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("crossover") {
        return None;
    }

    let verb = words.next().map(str::to_ascii_lowercase);
    let parsed = match verb.as_deref() {
        None | Some("code") => Ok(CrossoverCommand::OpenRoom),
        Some("list") => Ok(CrossoverCommand::List),
        Some("connect") => words
            .next()
            .map(|code| CrossoverCommand::Connect { code: code.into() })
            .ok_or(Usage),
        Some("disconnect") => words
            .next()
            .map(|code| CrossoverCommand::Disconnect { code: code.into() })
            .ok_or(Usage),
        Some(_) => Err(Usage),
    };
    Some(parsed)
}

/// Who is asking and from where.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    /// `None` outside a guild channel (DMs).
    pub endpoint: Option<Endpoint>,
    pub permissions: Permissions,
}

/// One rendered `list` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedLink {
    pub room_id: String,
    pub target: Endpoint,
    pub guild_name: Option<String>,
    pub channel_name: Option<String>,
}

impl fmt::Display for ListedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = self
            .channel_name
            .clone()
            .unwrap_or_else(|| self.target.channel_id.to_string());
        let guild = self
            .guild_name
            .clone()
            .unwrap_or_else(|| self.target.guild_id.to_string());
        write!(f, "`{}` : `#{channel}` @ `{guild}`", self.room_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Text(String),
    Connections(Vec<ListedLink>),
}

impl CommandReply {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Plain-text rendering for platforms without rich replies.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Connections(links) if links.is_empty() => NO_ROOMS.to_string(),
            Self::Connections(links) => {
                let mut out = String::from(LIST_HEADING);
                for link in links {
                    out.push('\n');
                    out.push_str(&link.to_string());
                }
                out
            },
        }
    }
}

/// Text to send back for a command outcome. Failures that are not the
/// caller's fault get a generic line; the error itself belongs in the logs.
pub fn reply_text(result: &Result<CommandReply>) -> String {
    match result {
        Ok(reply) => reply.render(),
        Err(_) => COMMAND_FAILED.to_string(),
    }
}

pub struct CommandSurface {
    manager: Arc<RoomManager>,
    platform: Arc<dyn RelayPlatform>,
    prefixes: Vec<String>,
}

impl CommandSurface {
    pub fn new(
        manager: Arc<RoomManager>,
        platform: Arc<dyn RelayPlatform>,
        prefixes: Vec<String>,
    ) -> Self {
        Self {
            manager,
            platform,
            prefixes,
        }
    }

    /// Parse and run a chat message. `None` when it is not a crossover
    /// command.
    pub async fn handle_message(
        &self,
        ctx: CommandContext,
        content: &str,
    ) -> Option<Result<CommandReply>> {
        match parse_command(content, &self.prefixes)? {
            Ok(cmd) => Some(self.execute(ctx, cmd).await),
            Err(usage) => Some(Ok(CommandReply::text(usage.to_string()))),
        }
    }

    pub async fn execute(&self, ctx: CommandContext, cmd: CrossoverCommand) -> Result<CommandReply> {
        let Some(endpoint) = ctx.endpoint else {
            return Ok(CommandReply::text(GUILD_ONLY));
        };
        if !is_permitted(ctx.permissions, REQUIRED) {
            info!(endpoint = %endpoint, command = ?cmd, "crossover command denied");
            return Ok(CommandReply::text(PERMISSION_DENIED));
        }

        let result = match cmd {
            CrossoverCommand::OpenRoom => self.open_room(endpoint).await,
            CrossoverCommand::Connect { code } => self.connect(&code, endpoint).await,
            CrossoverCommand::Disconnect { code } => self.disconnect(&code, endpoint).await,
            CrossoverCommand::List => self.list(endpoint).await,
        };
        match result {
            Err(e) if e.is_topology() => {
                info!(endpoint = %endpoint, error = %e, "crossover command rejected");
                Ok(CommandReply::text(e.user_message().unwrap_or_default()))
            },
            other => other,
        }
    }

    async fn open_room(&self, endpoint: Endpoint) -> Result<CommandReply> {
        let room = self.manager.open_room(endpoint).await?;
        Ok(CommandReply::Text(format!(
            "Your cross-chat room code is: `{}`",
            room.id
        )))
    }

    async fn connect(&self, code: &str, endpoint: Endpoint) -> Result<CommandReply> {
        let linked = self.manager.connect(code, endpoint).await?;
        let (channel, guild) = self.label(linked.this).await;
        self.notify(
            linked.that,
            &format!("New connection comes from `#{channel}` at `{guild}`!"),
        )
        .await;
        Ok(CommandReply::text(LINKED))
    }

    async fn disconnect(&self, code: &str, endpoint: Endpoint) -> Result<CommandReply> {
        let unlinked = self.manager.disconnect(code, endpoint).await?;
        let (channel, guild) = self.label(unlinked.this).await;
        self.notify(
            unlinked.that,
            &format!("Disconnected from `#{channel}` at `{guild}`!"),
        )
        .await;
        Ok(CommandReply::text(UNLINKED))
    }

    async fn list(&self, endpoint: Endpoint) -> Result<CommandReply> {
        let links = self.manager.list_connections(endpoint).await?;
        let mut listed = Vec::with_capacity(links.len());
        for RoomLink { room_id, target } in links {
            let info = self.platform.resolve_endpoint(target).await;
            listed.push(ListedLink {
                room_id,
                target,
                guild_name: info.as_ref().map(|i| i.guild_name.clone()),
                channel_name: info.map(|i| i.channel_name),
            });
        }
        Ok(CommandReply::Connections(listed))
    }

    /// `(channel, guild)` display names, ids when the endpoint is not visible.
    async fn label(&self, endpoint: Endpoint) -> (String, String) {
        match self.platform.resolve_endpoint(endpoint).await {
            Some(info) => (info.channel_name, info.guild_name),
            None => (
                endpoint.channel_id.to_string(),
                endpoint.guild_id.to_string(),
            ),
        }
    }

    async fn notify(&self, endpoint: Endpoint, text: &str) {
        if let Err(e) = self.platform.send_notice(endpoint, text).await {
            warn!(endpoint = %endpoint, error = %e, "link notice not delivered");
        }
    }
}
