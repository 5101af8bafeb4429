use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    ChatMessage, CoreError, Embed, EmbedField, Interaction, MessageRef, NavButtons, Outbound,
    ResponseBody,
};
use tracing::debug;

/// Navigation direction requested through the pager's two buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerAction {
    PrevPage,
    NextPage,
}

/// One renderable row of a paginated result set.
pub trait PagerItem: Send + Sync {
    /// Render the row, labelled with its 1-based position in the *complete*
    /// result set (stable across page turns, usable as a relative id).
    fn to_embed_field(&self, display_id: usize) -> EmbedField;
}

/// Materializes the complete result set for a pager, exactly once.
#[async_trait]
pub trait PagerLoader: Send + Sync {
    async fn load_all(&self) -> courier_core::Result<Vec<Box<dyn PagerItem>>>;
}

/// What triggered the pager. This decides only how the initial message is
/// addressed; both paths converge on the same rendering.
pub enum PagerTarget<'a> {
    Message(&'a ChatMessage),
    Interaction(&'a Interaction),
}

/// A page-at-a-time interactive view over a loaded item collection.
///
/// `load_all` runs once during [`setup`](Pager::setup); every page turn
/// afterwards renders from memory and edits the attached message in place.
/// All state here is mutated only by the task owning the enclosing list
/// session, which is why none of it is locked.
pub struct Pager {
    loader: Arc<dyn PagerLoader>,
    outbound: Arc<dyn Outbound>,
    frame: Embed,
    nav: NavButtons,
    page_size: usize,
    overtime: Duration,
    items: Vec<Box<dyn PagerItem>>,
    page_now: usize,
    page_max: usize,
    attached: Option<MessageRef>,
    owner_id: String,
}

impl Pager {
    pub fn new(
        loader: Arc<dyn PagerLoader>,
        outbound: Arc<dyn Outbound>,
        frame: Embed,
        nav: NavButtons,
        page_size: usize,
        overtime: Duration,
    ) -> Self {
        debug_assert!(page_size > 0, "page_size must be positive");
        Self {
            loader,
            outbound,
            frame,
            nav,
            page_size,
            overtime,
            items: Vec::new(),
            page_now: 0,
            page_max: 0,
            attached: None,
            owner_id: String::new(),
        }
    }

    /// Load the full result set, render page 1 and emit the initial message.
    ///
    /// Runs inline in the invoking task; no further backing-store access
    /// happens after this returns. Navigation buttons are attached only when
    /// there is more than one page.
    pub async fn setup(&mut self, target: PagerTarget<'_>) -> courier_core::Result<()> {
        self.items = self.loader.load_all().await?;
        self.page_max = if self.items.is_empty() {
            0
        } else {
            self.items.len().div_ceil(self.page_size)
        };
        debug!(count = self.items.len(), page_max = self.page_max, "pager loaded");

        let embed = self.render_page(1);
        let nav = self.current_nav(false);
        let attached = match target {
            PagerTarget::Message(message) => {
                self.owner_id = message.author_id.clone();
                self.outbound
                    .send_embed(&message.channel(), embed, nav)
                    .await?
            }
            PagerTarget::Interaction(interaction) => {
                self.owner_id = interaction.user_id.clone();
                self.outbound
                    .respond(interaction, ResponseBody::Embed { embed, nav })
                    .await?
            }
        };
        self.attached = Some(attached);
        Ok(())
    }

    /// Render the requested page, clamping out-of-range requests by
    /// wrapping: past the last page lands on 1, before the first lands on
    /// the last. Navigation never dead-ends.
    pub fn render_page(&mut self, to_page: usize) -> Embed {
        let mut embed = self.frame.clone();
        if self.page_max == 0 {
            self.page_now = 0;
            embed.description = Some("Your query returned 0 results. Nothing to show.".into());
            return embed;
        }

        let to_page = if to_page > self.page_max {
            1
        } else if to_page < 1 {
            self.page_max
        } else {
            to_page
        };

        let lower = (to_page - 1) * self.page_size;
        let upper = (to_page * self.page_size).min(self.items.len());
        embed.fields = self.items[lower..upper]
            .iter()
            .enumerate()
            .map(|(offset, item)| item.to_embed_field(lower + offset + 1))
            .collect();
        embed.footer = Some(format!("page: {}/{}", to_page, self.page_max));
        self.page_now = to_page;
        embed
    }

    /// Turn one page in the given direction and edit the attached message in
    /// place. Never sends a new message.
    pub async fn switch_page(&mut self, action: PagerAction) -> courier_core::Result<()> {
        let to_page = match action {
            // page_now == 1 yields a request for page 0, which wraps to max
            PagerAction::PrevPage => self.page_now.saturating_sub(1),
            PagerAction::NextPage => self.page_now + 1,
        };
        let embed = self.render_page(to_page);
        let nav = self.current_nav(false);
        let attached = self.attached()?.clone();
        self.outbound.edit_embed(&attached, embed, nav).await
    }

    /// Disable both navigation controls with one final edit.
    ///
    /// Called exactly once, by the owning session on its own disposal, so a
    /// finished pager cannot receive navigation after the session is gone.
    pub async fn lock_buttons(&mut self) -> courier_core::Result<()> {
        let embed = self.render_page(self.page_now);
        let nav = self.current_nav(true);
        let attached = self.attached()?.clone();
        self.outbound.edit_embed(&attached, embed, nav).await
    }

    pub fn page_now(&self) -> usize {
        self.page_now
    }

    pub fn page_max(&self) -> usize {
        self.page_max
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn overtime(&self) -> Duration {
        self.overtime
    }

    /// The message the pager renders into, once `setup` has sent it.
    pub fn attached_message(&self) -> Option<&MessageRef> {
        self.attached.as_ref()
    }

    fn attached(&self) -> courier_core::Result<&MessageRef> {
        self.attached
            .as_ref()
            .ok_or_else(|| CoreError::Outbound("pager has no attached message".into()))
    }

    fn current_nav(&self, locked: bool) -> Option<NavButtons> {
        if self.page_max > 1 {
            let nav = self.nav.clone();
            Some(if locked { nav.locked() } else { nav })
        } else {
            None
        }
    }
}
