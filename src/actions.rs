//! Applying moderator decisions.
//!
//! Approve and reject resolve an item exactly once: the key is claimed in
//! [`ModerationState`] before the Site is called. A concurrent second attempt
//! waits for the first; it gets `Conflict` if the first succeeded and goes
//! ahead if it failed. Sign only corrects song metadata and may be repeated
//! on any item state.
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::auth::Moderator;
use crate::error::ModerationError;
use crate::model::{
    Action, ActionRequest, Annotated, HistoryAction, ItemKey, ItemKind, PendingView,
};
use crate::site::SiteApi;
use crate::state::ModerationState;
use crate::texts;

pub struct ActionProcessor {
    site: Arc<dyn SiteApi>,
    state: Arc<ModerationState>,
}

impl ActionProcessor {
    pub fn new(site: Arc<dyn SiteApi>, state: Arc<ModerationState>) -> Self {
        Self { site, state }
    }

    #[instrument(skip_all, fields(moderator = moderator.id, kind = %request.kind, id = request.id))]
    pub async fn apply(
        &self,
        moderator: &Moderator,
        request: ActionRequest,
    ) -> Result<(), ModerationError> {
        let (key, action) = request.into_action()?;
        match action {
            Action::Approve => self.approve(moderator, key).await,
            Action::Reject { reason_code } => self.reject(moderator, key, &reason_code).await,
            Action::Sign { artist, title } => self.sign(key, &artist, &title).await,
        }
    }

    async fn approve(&self, moderator: &Moderator, key: ItemKey) -> Result<(), ModerationError> {
        let claim = self.state.claim(key, &moderator.name).await?;
        self.site.approve(key).await.map_err(|err| {
            error!(?err, %key, "approve failed upstream");
            ModerationError::upstream(err)
        })?;
        claim.commit(HistoryAction::Approve, "");
        info!(%key, moderator = %moderator.name, "approved");
        Ok(())
    }

    async fn reject(
        &self,
        moderator: &Moderator,
        key: ItemKey,
        reason_code: &str,
    ) -> Result<(), ModerationError> {
        let claim = self.state.claim(key, &moderator.name).await?;
        let reason = texts::reason_text(reason_code);

        let res = match key.kind {
            ItemKind::Song => self.site.reject_song(key.id, &reason).await,
            ItemKind::Name => match self.site.playlist_creator(key.id).await {
                Ok(creator) => {
                    let new_name = texts::fallback_playlist_name(creator.as_deref());
                    self.site.reject_name(key.id, &new_name, &reason).await
                }
                Err(err) => Err(err),
            },
            ItemKind::Cover => self.site.reject_cover(key.id, &reason).await,
        };
        res.map_err(|err| {
            error!(?err, %key, "reject failed upstream");
            ModerationError::upstream(err)
        })?;

        claim.commit(HistoryAction::Reject, reason.clone());
        info!(%key, moderator = %moderator.name, %reason, "rejected");
        Ok(())
    }

    async fn sign(&self, key: ItemKey, artist: &str, title: &str) -> Result<(), ModerationError> {
        self.site
            .sign_song(key.id, artist, title)
            .await
            .map_err(|err| {
                error!(?err, %key, "sign failed upstream");
                ModerationError::upstream(err)
            })?;
        info!(%key, "signed");
        Ok(())
    }

    /// Current Site queue with each item's resolver attached.
    pub async fn pending_view(&self) -> Result<PendingView, ModerationError> {
        let (songs, names, covers) = tokio::try_join!(
            self.site.pending_songs(),
            self.site.pending_names(),
            self.site.pending_covers(),
        )
        .map_err(ModerationError::upstream)?;

        let annotate = |kind: ItemKind, id: i64| self.state.handled_by(ItemKey::new(kind, id));
        Ok(PendingView {
            songs: songs
                .into_iter()
                .map(|item| Annotated {
                    handled_by: annotate(ItemKind::Song, item.id),
                    item,
                })
                .collect(),
            names: names
                .into_iter()
                .map(|item| Annotated {
                    handled_by: annotate(ItemKind::Name, item.id),
                    item,
                })
                .collect(),
            covers: covers
                .into_iter()
                .map(|item| Annotated {
                    handled_by: annotate(ItemKind::Cover, item.id),
                    item,
                })
                .collect(),
        })
    }
}
