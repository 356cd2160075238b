//! Conversions between serenity models and relay types.

use {
    crossover_channels::{
        Attachment, Attribution, Author, CreatedMessage, EditedMessage, Permissions, RelayPayload,
        Sticker,
    },
    crossover_common::Endpoint,
    serenity::{
        all::{
            ChannelId, Colour, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Embed,
            GuildChannel, GuildId, Message, MessageUpdateEvent,
        },
        http::HttpError,
    },
};

pub fn endpoint(guild_id: Option<GuildId>, channel_id: ChannelId) -> Option<Endpoint> {
    guild_id.map(|g| Endpoint::new(g.get(), channel_id.get()))
}

/// Serenity ids reject zero; endpoints typed by hand may carry one.
pub fn discord_ids(endpoint: Endpoint) -> Option<(GuildId, ChannelId)> {
    if endpoint.guild_id == 0 || endpoint.channel_id == 0 {
        return None;
    }
    Some((
        GuildId::new(endpoint.guild_id),
        ChannelId::new(endpoint.channel_id),
    ))
}

/// A guild's regular channel, else one of its active threads. Threads are
/// cached apart from `Guild::channels`.
pub fn guild_channel<'a>(
    listed: Option<&'a GuildChannel>,
    threads: &'a [GuildChannel],
    channel_id: ChannelId,
) -> Option<&'a GuildChannel> {
    listed.or_else(|| threads.iter().find(|t| t.id == channel_id))
}

/// Server nickname, then global display name, then username.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.or(global_name).unwrap_or(username).to_string()
}

pub fn created(msg: &Message) -> Option<CreatedMessage> {
    let endpoint = endpoint(msg.guild_id, msg.channel_id)?;
    let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
    Some(CreatedMessage {
        endpoint,
        message_id: msg.id.get(),
        author: Author {
            id: msg.author.id.get(),
            display_name: display_name(nick, msg.author.global_name.as_deref(), &msg.author.name),
            avatar_url: Some(msg.author.face()),
        },
        content: msg.content.clone(),
        attachments: attachments(msg),
        stickers: stickers(msg),
    })
}

/// `None` for updates without new text (embed unfurls, pins).
pub fn edited(event: &MessageUpdateEvent) -> Option<EditedMessage> {
    let endpoint = endpoint(event.guild_id, event.channel_id)?;
    Some(EditedMessage {
        endpoint,
        message_id: event.id.get(),
        editor_id: event.author.as_ref().map(|u| u.id.get()),
        content: event.content.clone()?,
    })
}

fn attachments(msg: &Message) -> Vec<Attachment> {
    msg.attachments
        .iter()
        .map(|a| Attachment {
            filename: a.filename.clone(),
            url: a.url.clone(),
            size: u64::from(a.size),
        })
        .collect()
}

fn stickers(msg: &Message) -> Vec<Sticker> {
    msg.sticker_items
        .iter()
        .map(|s| Sticker {
            id: s.id.get(),
            name: s.name.clone(),
        })
        .collect()
}

/// The relayed copy's embed: header, body, footer.
pub fn embed(payload: &RelayPayload) -> CreateEmbed {
    let attribution = &payload.attribution;

    let mut author = CreateEmbedAuthor::new(&attribution.author_line);
    if let Some(url) = &attribution.author_icon_url {
        author = author.icon_url(url);
    }
    let mut footer = CreateEmbedFooter::new(&attribution.footer);
    if let Some(url) = &attribution.footer_icon_url {
        footer = footer.icon_url(url);
    }

    CreateEmbed::new()
        .author(author)
        .description(&payload.content)
        .footer(footer)
        .colour(Colour::new(attribution.colour))
}

/// Read a relayed copy back into a payload.
pub fn payload_from_message(msg: &Message) -> RelayPayload {
    payload_from_embed(msg.embeds.first(), &msg.content, attachments(msg), stickers(msg))
}

pub fn payload_from_embed(
    embed: Option<&Embed>,
    fallback_content: &str,
    attachments: Vec<Attachment>,
    stickers: Vec<Sticker>,
) -> RelayPayload {
    let attribution = Attribution {
        author_line: embed
            .and_then(|e| e.author.as_ref())
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        author_icon_url: embed
            .and_then(|e| e.author.as_ref())
            .and_then(|a| a.icon_url.clone()),
        footer: embed
            .and_then(|e| e.footer.as_ref())
            .map(|f| f.text.clone())
            .unwrap_or_default(),
        footer_icon_url: embed
            .and_then(|e| e.footer.as_ref())
            .and_then(|f| f.icon_url.clone()),
        colour: embed.and_then(|e| e.colour).map_or(0, |c| c.0),
    };
    RelayPayload {
        attribution,
        content: embed
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| fallback_content.to_string()),
        attachments,
        stickers,
    }
}

pub fn permissions(p: serenity::all::Permissions) -> Permissions {
    Permissions::from_bits(p.bits())
}

/// Discord answered 404 (unknown message or channel).
pub fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp))
            if resp.status_code.as_u16() == 404
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn display_name_precedence() {
        assert_eq!(display_name(Some("nick"), Some("Global"), "user"), "nick");
        assert_eq!(display_name(None, Some("Global"), "user"), "Global");
        assert_eq!(display_name(None, None, "user"), "user");
    }

    #[test]
    fn zero_ids_are_rejected() {
        assert!(discord_ids(Endpoint::new(0, 5)).is_none());
        let (g, c) = discord_ids(Endpoint::new(7, 8)).unwrap();
        assert_eq!((g.get(), c.get()), (7, 8));
    }

    #[test]
    fn endpoint_requires_guild() {
        assert!(endpoint(None, ChannelId::new(3)).is_none());
        assert_eq!(
            endpoint(Some(GuildId::new(2)), ChannelId::new(3)),
            Some(Endpoint::new(2, 3))
        );
    }

    /// 0 is a text channel, 11 a public thread under channel 10.
    fn channel(id: u64, kind: u8, name: &str) -> GuildChannel {
        let thread = kind == 11;
        let parent_id = thread.then_some("10");
        let metadata = thread.then(|| {
            serde_json::json!({
                "archived": false,
                "auto_archive_duration": 1440,
                "archive_timestamp": "2024-01-01T00:00:00.000000+00:00",
                "locked": false
            })
        });
        serde_json::from_value(serde_json::json!({
            "id": id.to_string(),
            "guild_id": "1",
            "parent_id": parent_id,
            "type": kind,
            "name": name,
            "position": 0,
            "nsfw": false,
            "permission_overwrites": [],
            "rate_limit_per_user": 0,
            "flags": 0,
            "thread_metadata": metadata
        }))
        .unwrap()
    }

    #[test]
    fn threads_resolve_when_not_listed() {
        let text = channel(10, 0, "general");
        let threads = vec![channel(30, 11, "side-quest"), channel(31, 11, "other")];

        let found = guild_channel(Some(&text), &threads, ChannelId::new(10)).unwrap();
        assert_eq!(found.name, "general");

        let thread = guild_channel(None, &threads, ChannelId::new(30)).unwrap();
        assert_eq!(thread.name, "side-quest");

        assert!(guild_channel(None, &threads, ChannelId::new(99)).is_none());
    }

    #[test]
    fn payload_read_back_from_embed() {
        let embed: Embed = serde_json::from_value(serde_json::json!({
            "type": "rich",
            "description": "hello",
            "color": 0x00E6_7E22,
            "author": { "name": "@user wrote:", "icon_url": "https://cdn.example/a.png" },
            "footer": { "text": "G1 at #C1" }
        }))
        .unwrap();

        let payload = payload_from_embed(Some(&embed), "", Vec::new(), Vec::new());
        assert_eq!(payload.content, "hello");
        assert_eq!(payload.attribution.author_line, "@user wrote:");
        assert_eq!(
            payload.attribution.author_icon_url.as_deref(),
            Some("https://cdn.example/a.png")
        );
        assert_eq!(payload.attribution.footer, "G1 at #C1");
        assert_eq!(payload.attribution.colour, 0x00E6_7E22);
    }

    #[test]
    fn payload_without_embed_uses_content() {
        let payload = payload_from_embed(None, "plain", Vec::new(), Vec::new());
        assert_eq!(payload.content, "plain");
        assert!(payload.attribution.footer.is_empty());
    }

    #[test]
    fn permission_bits_pass_through() {
        let p = permissions(serenity::all::Permissions::MANAGE_GUILD);
        assert!(p.contains(Permissions::MANAGE_GUILD));
        assert!(!p.contains(Permissions::ADMINISTRATOR));
    }
}
