//! The archive feature: save URL-shaped resources with tags and a note,
//! list them in a paginated view, and modify or remove them by the relative
//! id of the last query.

mod record;
mod stages;

pub use record::{SiteRecord, SITE_COLLECTION};
pub use stages::{ListStage, SaveStage, LIST_BUTTON_NEXT, LIST_BUTTON_PREV};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use courier_command::{calling_bot, parse, CommandFlag, CommandMatcher, FlagSet};
use courier_core::{
    BotConfig, ChannelRef, ChatMessage, DataStore, Embed, Filter, Interaction, InteractionData,
    NavButtons, OptionValue, Outbound, ResponseBody,
};
use courier_runtime::{
    BotContext, CommandHelp, Plugin, PluginHelp, Trigger, TriggerEvent, TriggerKind,
};
use courier_stages::{CombinedKey, PagerTarget, Stage, StageEvent, StageHandle, StageStore};
use courier_stages::Pager;
use tracing::{debug, warn};

use stages::{ArchiveLoader, ListSession, SaveSession};

const EMBED_COLOR_NORMAL: u32 = 0x3498db;

/// Whether a whole message body is a URL worth offering to archive.
fn is_saveable_url(text: &str) -> bool {
    match url::Url::parse(text) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

/// The archive plugin. Save sessions are keyed by `(channel, user)`; list
/// sessions by the id of the message the pager renders into.
pub struct ArchivePlugin {
    config: Arc<BotConfig>,
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn DataStore>,
    matcher: CommandMatcher,
    flags: FlagSet,
    saves: Arc<StageStore<SaveStage>>,
    lists: Arc<StageStore<ListStage>>,
}

impl ArchivePlugin {
    pub fn new(
        config: Arc<BotConfig>,
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn DataStore>,
    ) -> Self {
        let mut flags = FlagSet::new();
        flags
            .register(CommandFlag::new("tag").alias("t").multi())
            .register(CommandFlag::new("note").alias("n").with_arg())
            .register(CommandFlag::new("debug"));
        Self {
            config,
            outbound,
            store,
            matcher: CommandMatcher::new(["save-site", "list-site"]),
            flags,
            saves: Arc::new(StageStore::new()),
            lists: Arc::new(StageStore::new()),
        }
    }

    /// Live session counts `(save, list)`. Exposed for diagnostics.
    pub fn active_sessions(&self) -> (usize, usize) {
        (self.saves.len(), self.lists.len())
    }

    fn save_key(message: &ChatMessage) -> CombinedKey {
        CombinedKey::join([message.channel_id.as_str(), message.author_id.as_str()])
    }

    async fn say(&self, channel: &ChannelRef, text: &str) {
        if let Err(e) = self.outbound.send_text(channel, text).await {
            warn!(error = %e, "archive: outbound send failed");
        }
    }

    async fn respond_text(&self, interaction: &Interaction, text: &str) {
        if let Err(e) = self
            .outbound
            .respond(interaction, ResponseBody::Text(text.into()))
            .await
        {
            warn!(error = %e, "archive: interaction response failed");
        }
    }

    async fn respond_record_embed(&self, interaction: &Interaction, title: &str, record: &SiteRecord) {
        let embed = Embed::new()
            .title(title)
            .color(EMBED_COLOR_NORMAL)
            .timestamp(Utc::now())
            .field(record.url.clone(), record.essential_info(), false);
        if let Err(e) = self
            .outbound
            .respond(interaction, ResponseBody::Embed { embed, nav: None })
            .await
        {
            warn!(error = %e, "archive: interaction response failed");
        }
    }

    // -- explicit text commands -------------------------------------------

    /// An explicit command out-prioritizes a running save session of the
    /// same user in the same channel: the old session is force-aborted,
    /// never silently dropped.
    async fn abort_active_save(&self, message: &ChatMessage) {
        let key = Self::save_key(message);
        if self.saves.dispose(&key) {
            self.say(
                &message.channel(),
                "Your active save session was aborted by the new command.",
            )
            .await;
        }
    }

    async fn handle_save_command(&self, message: &ChatMessage) {
        let channel = message.channel();
        let parsed = match parse(&message.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.say(&channel, &e.to_string()).await;
                return;
            }
        };
        // raw dump happens before validation, so it works even for commands
        // validation is about to reject
        if parsed.has("debug") {
            self.say(&channel, &format!("Parsed flags: {parsed:?}")).await;
        }
        let values = match self.flags.validate(&parsed) {
            Ok(values) => values,
            Err(e) => {
                self.say(&channel, &e.to_string()).await;
                return;
            }
        };

        let Ok(tokens) = shell_words::split(&message.content) else {
            return;
        };
        let url_arg = tokens.get(1).filter(|token| !token.starts_with('-'));
        let Some(url_arg) = url_arg else {
            self.say(&channel, "You need a url as the second argument!").await;
            return;
        };
        if !is_saveable_url(url_arg) {
            self.say(&channel, "The second argument must be a VALID url!").await;
            return;
        }

        let mut record = SiteRecord::new(
            url_arg.as_str(),
            message.guild_id.clone(),
            &message.channel_id,
            &message.author_id,
        );
        record.tags = values.args("tag").to_vec();
        if let Some(note) = values.first("note") {
            record.note = note.to_string();
        }
        self.persist_new(&channel, record).await;
    }

    async fn persist_new(&self, channel: &ChannelRef, record: SiteRecord) {
        let doc = match record.to_document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "archive: record serialization failed");
                self.say(channel, "Something went wrong while saving. Please try again.")
                    .await;
                return;
            }
        };
        match self.store.insert(SITE_COLLECTION, doc).await {
            Ok(_) => {
                let embed = Embed::new()
                    .title("Site saved")
                    .description("The following site has been saved")
                    .color(EMBED_COLOR_NORMAL)
                    .timestamp(Utc::now())
                    .field(record.url.clone(), record.essential_info(), false);
                if let Err(e) = self.outbound.send_embed(channel, embed, None).await {
                    warn!(error = %e, "archive: confirmation send failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "archive: insert failed");
                self.say(channel, "Something went wrong while saving. Please try again.")
                    .await;
            }
        }
    }

    async fn handle_list_command(&self, message: &ChatMessage) {
        let channel = message.channel();
        let parsed = match parse(&message.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.say(&channel, &e.to_string()).await;
                return;
            }
        };
        let values = match self.flags.validate(&parsed) {
            Ok(values) => values,
            Err(e) => {
                self.say(&channel, &e.to_string()).await;
                return;
            }
        };

        let mut filter = Filter::new().eq("user_id", message.author_id.as_str());
        if !values.args("tag").is_empty() {
            filter = filter.contains_all("tags", values.args("tag").iter().cloned());
        }
        self.start_list_session(filter, PagerTarget::Message(message), &channel)
            .await;
    }

    // -- list sessions ----------------------------------------------------

    async fn start_list_session(
        &self,
        filter: Filter,
        target: PagerTarget<'_>,
        channel: &ChannelRef,
    ) {
        let loader = Arc::new(ArchiveLoader::new(Arc::clone(&self.store), filter));
        let frame = Embed::new()
            .title("ls-site result")
            .color(EMBED_COLOR_NORMAL)
            .timestamp(Utc::now());
        let mut pager = Pager::new(
            Arc::clone(&loader) as Arc<dyn courier_stages::PagerLoader>,
            Arc::clone(&self.outbound),
            frame,
            NavButtons::new(LIST_BUTTON_PREV, LIST_BUTTON_NEXT),
            self.config.sessions.page_size,
            self.config.sessions.pager_overtime(),
        );
        if let Err(e) = pager.setup(target).await {
            warn!(error = %e, "archive: pager setup failed");
            self.say(channel, "Something went wrong loading your query. Please try again.")
                .await;
            return;
        }

        let Some(attached) = pager.attached_message().cloned() else {
            return;
        };
        let key = CombinedKey::join([attached.message_id.as_str()]);
        let owner = pager.owner_id().to_string();
        let overtime = pager.overtime();

        let mut inbox = None;
        let created = self.lists.try_create(key.clone(), || {
            let (handle, rx) =
                StageHandle::channel(key.clone(), &owner, attached.channel.as_str(), overtime);
            inbox = Some(rx);
            ListStage {
                handle,
                items: loader.snapshot(),
            }
        });
        match created {
            Err(e) => warn!(error = %e, "archive: list stage key collision"),
            Ok(_) => {
                if let Some(inbox) = inbox {
                    let session = ListSession {
                        stages: Arc::clone(&self.lists),
                        key,
                        pager,
                    };
                    tokio::spawn(session.run(inbox));
                }
            }
        }
    }

    /// The most recent list session owned by this user in this channel,
    /// i.e. the query that relative ids resolve against.
    fn find_latest_list(&self, user_id: &str, channel_id: &str) -> Option<Arc<ListStage>> {
        let mut best: Option<Arc<ListStage>> = None;
        self.lists.for_each(|_key, stage| {
            let handle = stage.handle();
            if handle.owner_id() == user_id && handle.channel_id() == channel_id {
                let newer = best
                    .as_ref()
                    .map_or(true, |b| handle.created_at() > b.handle().created_at());
                if newer {
                    best = Some(Arc::clone(stage));
                }
            }
            false
        });
        best
    }

    // -- save sessions ----------------------------------------------------

    async fn open_save_session(&self, message: &ChatMessage) {
        let key = Self::save_key(message);
        let overtime = self.config.sessions.save_overtime();
        let mut inbox = None;
        let created = self.saves.try_create(key.clone(), || {
            let (handle, rx) = StageHandle::channel(
                key.clone(),
                &message.author_id,
                &message.channel_id,
                overtime,
            );
            inbox = Some(rx);
            SaveStage { handle }
        });
        match created {
            Err(e) => {
                // the existing session stays untouched
                self.say(&message.channel(), &format!("{e}. Finish it first!")).await;
            }
            Ok(stage) => {
                if let Some(inbox) = inbox {
                    let session = SaveSession {
                        config: Arc::clone(&self.config),
                        outbound: Arc::clone(&self.outbound),
                        store: Arc::clone(&self.store),
                        stages: Arc::clone(&self.saves),
                        stage,
                        key,
                        channel: message.channel(),
                        record: SiteRecord::new(
                            message.content.trim(),
                            message.guild_id.clone(),
                            &message.channel_id,
                            &message.author_id,
                        ),
                    };
                    tokio::spawn(session.run(inbox));
                }
            }
        }
    }

    async fn forward_continuation(&self, message: &ChatMessage) {
        let key = Self::save_key(message);
        if let Some(stage) = self.saves.get(&key) {
            if let Err(e) = stage
                .handle()
                .forward(StageEvent::Message(message.clone()))
                .await
            {
                debug!(error = %e, "archive: continuation arrived after disposal");
            }
        }
    }

    // -- interactions -----------------------------------------------------

    async fn handle_interaction(&self, interaction: &Interaction) {
        match &interaction.data {
            InteractionData::Command { name, options } => match name.as_str() {
                "archive-save" => self.interaction_save(interaction, options).await,
                "archive-list" => self.interaction_list(interaction, options).await,
                "archive-modify" => self.interaction_modify(interaction, options).await,
                "archive-remove" => self.interaction_remove(interaction, options).await,
                _ => {}
            },
            InteractionData::Component { custom_id, message_id } => {
                if custom_id == LIST_BUTTON_PREV || custom_id == LIST_BUTTON_NEXT {
                    let key = CombinedKey::join([message_id.as_str()]);
                    if let Some(stage) = self.lists.get(&key) {
                        if let Err(e) = stage
                            .handle()
                            .forward(StageEvent::Component(interaction.clone()))
                            .await
                        {
                            debug!(error = %e, "archive: navigation after disposal");
                        }
                    }
                }
            }
        }
    }

    async fn interaction_save(
        &self,
        interaction: &Interaction,
        options: &HashMap<String, OptionValue>,
    ) {
        let Some(url_arg) = options.get("url").and_then(OptionValue::as_str) else {
            self.respond_text(interaction, "You must provide a *valid* url!").await;
            return;
        };
        if !is_saveable_url(url_arg) {
            self.respond_text(interaction, "You must provide a *valid* url!").await;
            return;
        }
        let mut record = SiteRecord::new(
            url_arg,
            interaction.guild_id.clone(),
            &interaction.channel_id,
            &interaction.user_id,
        );
        if let Some(tags) = options.get("tags").and_then(OptionValue::as_str) {
            record.tags = courier_command::separate_args(tags, &self.config.messenger.separator);
        }
        if let Some(note) = options.get("note").and_then(OptionValue::as_str) {
            record.note = note.to_string();
        }

        let doc = match record.to_document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "archive: record serialization failed");
                self.respond_text(interaction, "Internal error inserting! Please contact admin for help.")
                    .await;
                return;
            }
        };
        match self.store.insert(SITE_COLLECTION, doc).await {
            Ok(_) => {
                self.respond_record_embed(interaction, "Site saved", &record).await;
            }
            Err(e) => {
                warn!(error = %e, "archive: insert failed");
                self.respond_text(interaction, "Internal error inserting! Please contact admin for help.")
                    .await;
            }
        }
    }

    async fn interaction_list(
        &self,
        interaction: &Interaction,
        options: &HashMap<String, OptionValue>,
    ) {
        let mut filter = Filter::new().eq("user_id", interaction.user_id.as_str());
        if let Some(tags) = options.get("tags").and_then(OptionValue::as_str) {
            let tags = courier_command::separate_args(tags, &self.config.messenger.separator);
            if !tags.is_empty() {
                filter = filter.contains_all("tags", tags);
            }
        }
        let channel = interaction.channel();
        self.start_list_session(filter, PagerTarget::Interaction(interaction), &channel)
            .await;
    }

    /// Resolve a relative id against the caller's most recent list session.
    async fn resolve_relative(
        &self,
        interaction: &Interaction,
        options: &HashMap<String, OptionValue>,
    ) -> Option<(Arc<ListStage>, usize)> {
        let Some(relative_id) = options.get("relative-id").and_then(OptionValue::as_int) else {
            self.respond_text(interaction, "no relative-id provided!").await;
            return None;
        };
        let Some(stage) = self.find_latest_list(&interaction.user_id, &interaction.channel_id)
        else {
            self.respond_text(interaction, "No active query for you! Run a new query first?")
                .await;
            return None;
        };
        if relative_id <= 0 || relative_id as usize > stage.item_count() {
            self.respond_text(interaction, "Malformed relative-id. Check your last query?")
                .await;
            return None;
        }
        Some((stage, relative_id as usize))
    }

    async fn interaction_modify(
        &self,
        interaction: &Interaction,
        options: &HashMap<String, OptionValue>,
    ) {
        let Some((stage, relative_id)) = self.resolve_relative(interaction, options).await else {
            return;
        };
        let Some((doc_id, record)) = stage.relative(relative_id) else {
            return;
        };
        let mut record = record.clone();

        if let Some(tags) = options.get("tags").and_then(OptionValue::as_str) {
            if tags == "-" {
                record.tags.clear();
            } else {
                record.tags =
                    courier_command::separate_args(tags, &self.config.messenger.separator);
            }
        }
        if let Some(note) = options.get("note").and_then(OptionValue::as_str) {
            if note == "-" {
                record.note.clear();
            } else {
                record.note = note.to_string();
            }
        }
        record.touch();

        let doc = match record.to_document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "archive: record serialization failed");
                self.respond_text(interaction, "Internal error updating! Please contact admin for help.")
                    .await;
                return;
            }
        };
        match self.store.update(SITE_COLLECTION, doc_id, doc).await {
            Ok(()) => {
                self.respond_record_embed(interaction, "Site record updated", &record).await;
            }
            Err(e) => {
                warn!(error = %e, "archive: update failed");
                self.respond_text(interaction, "Internal error updating! Please contact admin for help.")
                    .await;
            }
        }
    }

    async fn interaction_remove(
        &self,
        interaction: &Interaction,
        options: &HashMap<String, OptionValue>,
    ) {
        let Some((stage, relative_id)) = self.resolve_relative(interaction, options).await else {
            return;
        };
        let Some((doc_id, record)) = stage.relative(relative_id) else {
            return;
        };
        match self.store.remove(SITE_COLLECTION, doc_id).await {
            Ok(()) => {
                self.respond_record_embed(interaction, "Site record deleted", record).await;
            }
            Err(e) => {
                warn!(error = %e, "archive: delete failed");
                self.respond_text(interaction, "Internal error deleting! Please contact admin for help.")
                    .await;
            }
        }
    }
}

#[async_trait]
impl Plugin for ArchivePlugin {
    fn name(&self) -> &str {
        "archive"
    }

    fn accepted(&self) -> &[TriggerKind] {
        &[TriggerKind::Chat]
    }

    fn help(&self) -> Option<PluginHelp> {
        let prefix = &self.config.messenger.prefix;
        Some(PluginHelp {
            summary: "Archive online resources.".into(),
            commands: vec![
                CommandHelp {
                    name: "save-site".into(),
                    text: format!(
                        "*Call*: {prefix}save-site <url> [-tag <tag>]... [-note <note>]\n\
                         Saves the given site. Posting a bare URL also opens a guided save session."
                    ),
                },
                CommandHelp {
                    name: "list-site".into(),
                    text: format!(
                        "*Call*: {prefix}list-site [-tag <tag>]...\n\
                         Lists your archived sites in a paginated view."
                    ),
                },
                CommandHelp {
                    name: "archive-modify".into(),
                    text: "*Call*: archive-modify interaction with relative-id\n\
                           Modifies a site from your most recent list query."
                        .into(),
                },
                CommandHelp {
                    name: "archive-remove".into(),
                    text: "*Call*: archive-remove interaction with relative-id\n\
                           Removes a site from your most recent list query."
                        .into(),
                },
            ],
        })
    }

    async fn handle(&self, _cx: Arc<BotContext>, trigger: Trigger) {
        if !self.accepts(trigger.kind) {
            return;
        }
        match trigger.event {
            TriggerEvent::Message(message) => {
                if message.author_is_bot {
                    return;
                }
                // precedence: explicit command > continuation > implicit
                match self
                    .matcher
                    .match_text(&message.content, &self.config.messenger)
                {
                    Some("save-site") => {
                        self.abort_active_save(&message).await;
                        self.handle_save_command(&message).await;
                        return;
                    }
                    Some("list-site") => {
                        self.abort_active_save(&message).await;
                        self.handle_list_command(&message).await;
                        return;
                    }
                    _ => {}
                }
                if calling_bot(&message.content, &self.config.messenger).is_some() {
                    self.forward_continuation(&message).await;
                    return;
                }
                if is_saveable_url(message.content.trim()) {
                    self.open_save_session(&message).await;
                }
            }
            TriggerEvent::Interaction(interaction) => {
                self.handle_interaction(&interaction).await;
            }
            TriggerEvent::Webhook(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection_requires_scheme_and_host() {
        assert!(is_saveable_url("https://example.com"));
        assert!(is_saveable_url("http://example.com/path?q=1"));
        assert!(!is_saveable_url("example.com"));
        assert!(!is_saveable_url("ftp://example.com"));
        assert!(!is_saveable_url("just some text"));
        assert!(!is_saveable_url("mailto:a@b.c"));
    }
}
