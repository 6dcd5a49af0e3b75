//! Poll Service
//!
//! The operation surface offered to a chat transport: drafting, publishing,
//! voting and management. Core state changes happen synchronously under the
//! registry's locks; the transport is called afterwards and its failures are
//! logged without touching core state. The one exception is publishing,
//! where a failed delivery means the poll is never registered.

use super::draft::{DraftStore, DraftSummary, DraftToggle};
use super::engine::{PollEngine, PollEngineStats};
use super::poll::{ChatId, Poll, PollError, PollId, UserId};
use super::render::{self, RenderedMessage};
use super::vote::{self, VoteOutcome};
use crate::channels::DynTransport;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a vote as reported back to the voter
#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    /// The poll message as the voter now sees it
    pub message: RenderedMessage,
}

/// Poll operations bound to a transport
pub struct PollService {
    engine: Arc<PollEngine>,
    drafts: DraftStore,
    transport: DynTransport,
}

impl PollService {
    pub fn new(engine: Arc<PollEngine>, drafts: DraftStore, transport: DynTransport) -> Self {
        Self {
            engine,
            drafts,
            transport,
        }
    }

    pub fn engine(&self) -> &Arc<PollEngine> {
        &self.engine
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    /// Open a draft session and return the prompt to show the creator.
    pub fn start_draft(
        &self,
        creator: &UserId,
        chat: &ChatId,
        is_quiz: bool,
    ) -> Result<RenderedMessage, PollError> {
        self.drafts.start(creator, chat, is_quiz)?;
        Ok(render::render_draft_prompt(is_quiz))
    }

    pub fn submit_draft_text(&self, creator: &UserId, raw: &str) -> Result<DraftSummary, PollError> {
        self.drafts.submit_text(creator, raw)
    }

    pub fn toggle_draft_option(
        &self,
        creator: &UserId,
        toggle: DraftToggle,
    ) -> Result<DraftSummary, PollError> {
        self.drafts.toggle(creator, toggle)
    }

    /// Drop the creator's draft. Returns `false` when nothing was staged.
    pub fn cancel_draft(&self, creator: &UserId) -> bool {
        self.drafts.cancel(creator)
    }

    /// Publish the creator's draft into its chat.
    ///
    /// The draft session ends whether or not delivery succeeds.
    pub async fn publish_draft(
        &self,
        creator: &UserId,
    ) -> Result<(PollId, RenderedMessage), PollError> {
        let mut session = self.drafts.take_for_publish(creator)?;
        let mut poll = session.publish()?;
        let message = render::render_message(&poll, Some(creator));

        let message_ref = match self.transport.send_message(poll.chat_id(), &message).await {
            Ok(message_ref) => message_ref,
            Err(e) => {
                session.fail(e.to_string());
                warn!(poll_id = %poll.id(), creator = %creator, error = %e, "publish failed, draft discarded");
                return Err(PollError::PublishFailed(e.to_string()));
            }
        };

        poll.set_message_ref(message_ref);
        let id = self.engine.insert(poll)?;
        info!(poll_id = %id, creator = %creator, "poll published");
        Ok((id, message))
    }

    /// Apply a vote and refresh the poll message.
    ///
    /// `callback_id` identifies the pressed control, when there is one, so
    /// the transport can acknowledge it.
    pub async fn vote(
        &self,
        poll_id: &PollId,
        voter: &UserId,
        option: usize,
        callback_id: Option<&str>,
    ) -> Result<VoteReceipt, PollError> {
        let (outcome, snapshot) = match self.engine.vote(poll_id, voter, option) {
            Ok(applied) => applied,
            Err(e) => {
                self.answer(callback_id, &e.to_string()).await;
                return Err(e);
            }
        };

        let message = render::render_message(&snapshot, Some(voter));
        self.answer(callback_id, outcome.notice()).await;
        if outcome.is_changed() {
            self.refresh_live(&snapshot, &message).await;
        }
        Ok(VoteReceipt { outcome, message })
    }

    /// Refresh the poll message after a multi-choice voter is done.
    pub async fn vote_done(
        &self,
        poll_id: &PollId,
        voter: &UserId,
        callback_id: Option<&str>,
    ) -> Result<RenderedMessage, PollError> {
        let snapshot = self.engine.get(poll_id)?;
        if let Err(e) = vote::set_multi_choice_done(&snapshot, voter) {
            self.answer(callback_id, &e.to_string()).await;
            return Err(e);
        }

        let message = render::render_message(&snapshot, Some(voter));
        self.answer(callback_id, "Results updated.").await;
        self.refresh_live(&snapshot, &message).await;
        Ok(message)
    }

    pub async fn close_poll(&self, poll_id: &PollId, actor: &UserId) -> Result<Poll, PollError> {
        self.set_closed(poll_id, actor, true).await
    }

    pub async fn reopen_poll(&self, poll_id: &PollId, actor: &UserId) -> Result<Poll, PollError> {
        self.set_closed(poll_id, actor, false).await
    }

    async fn set_closed(
        &self,
        poll_id: &PollId,
        actor: &UserId,
        closed: bool,
    ) -> Result<Poll, PollError> {
        let snapshot = self.engine.set_closed(poll_id, actor, closed)?;
        info!(poll_id = %poll_id, closed, "poll status changed");
        let message = render::render_message(&snapshot, Some(actor));
        self.refresh_live(&snapshot, &message).await;
        Ok(snapshot)
    }

    /// Management view of one poll, for the creator only
    pub fn manage_view(&self, poll_id: &PollId, actor: &UserId) -> Result<RenderedMessage, PollError> {
        let snapshot = self.engine.get_as_creator(poll_id, actor)?;
        Ok(render::render_manage_view(&snapshot))
    }

    /// Results as CSV bytes, for the creator only
    pub fn export_poll(&self, poll_id: &PollId, actor: &UserId) -> Result<Vec<u8>, PollError> {
        let snapshot = self.engine.get_as_creator(poll_id, actor)?;
        debug!(poll_id = %poll_id, "exporting results");
        Ok(render::export_csv(&snapshot).into_bytes())
    }

    /// Delete a poll and replace its message with a removal notice
    pub async fn delete_poll(&self, poll_id: &PollId, actor: &UserId) -> Result<(), PollError> {
        let last = self.engine.remove(poll_id, actor)?;
        self.refresh(&last, &render::render_deleted_notice()).await;
        Ok(())
    }

    /// The actor's polls in creation order
    pub fn list_polls(&self, actor: &UserId) -> Vec<Poll> {
        self.engine.list_by_creator(actor)
    }

    pub fn stats(&self) -> PollEngineStats {
        self.engine.stats()
    }

    /// Refresh unless the poll was deleted while the caller was awaiting
    /// the transport; the deletion notice must stay in place.
    async fn refresh_live(&self, poll: &Poll, message: &RenderedMessage) {
        if !self.engine.contains(poll.id()) {
            debug!(poll_id = %poll.id(), "poll deleted, skipping refresh");
            return;
        }
        self.refresh(poll, message).await;
    }

    async fn refresh(&self, poll: &Poll, message: &RenderedMessage) {
        let Some(target) = poll.message_ref() else {
            return;
        };
        if let Err(e) = self.transport.edit_message(target, message).await {
            warn!(poll_id = %poll.id(), error = %e, "could not edit poll message");
        }
    }

    async fn answer(&self, callback_id: Option<&str>, text: &str) {
        let Some(callback_id) = callback_id else {
            return;
        };
        if let Err(e) = self.transport.answer_callback(callback_id, text).await {
            debug!(callback_id, error = %e, "could not answer callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{RecordedCall, RecordingTransport, Transport, TransportResult};
    use crate::polls::MessageRef;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Parks `answer_callback` until released, so a vote can be caught
    /// between applying and refreshing.
    #[derive(Default)]
    struct GatedTransport {
        inner: RecordingTransport,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send_message(
            &self,
            chat_id: &ChatId,
            message: &RenderedMessage,
        ) -> TransportResult<MessageRef> {
            self.inner.send_message(chat_id, message).await
        }

        async fn edit_message(
            &self,
            target: &MessageRef,
            message: &RenderedMessage,
        ) -> TransportResult<()> {
            self.inner.edit_message(target, message).await
        }

        async fn answer_callback(&self, callback_id: &str, text: &str) -> TransportResult<()> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.answer_callback(callback_id, text).await
        }
    }

    fn service() -> (PollService, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let service = PollService::new(
            Arc::new(PollEngine::new()),
            DraftStore::default(),
            transport.clone(),
        );
        (service, transport)
    }

    async fn publish(service: &PollService, creator: &UserId, text: &str, is_quiz: bool) -> PollId {
        service
            .start_draft(creator, &ChatId::from("chat"), is_quiz)
            .unwrap();
        service.submit_draft_text(creator, text).unwrap();
        service.publish_draft(creator).await.unwrap().0
    }

    #[tokio::test]
    async fn test_publish_sends_and_registers() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        let poll = service.engine().get(&id).unwrap();
        assert!(poll.message_ref().is_some());
        assert!(service.drafts().is_empty());
        assert!(matches!(&transport.calls()[0], RecordedCall::Send { chat_id, .. } if chat_id.as_str() == "chat"));
    }

    #[tokio::test]
    async fn test_publish_failure_discards_draft() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        transport.fail_sends(true);

        service
            .start_draft(&creator, &ChatId::from("chat"), false)
            .unwrap();
        service.submit_draft_text(&creator, "Q\nA\nB").unwrap();
        let err = service.publish_draft(&creator).await.unwrap_err();

        assert!(matches!(err, PollError::PublishFailed(_)));
        assert!(service.engine().is_empty());
        assert!(service.drafts().is_empty());
        // The creator may start over straight away
        assert!(service
            .start_draft(&creator, &ChatId::from("chat"), false)
            .is_ok());
    }

    #[tokio::test]
    async fn test_vote_edits_message_and_answers() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;
        transport.clear();

        let voter = UserId::from("voter");
        let receipt = service.vote(&id, &voter, 1, Some("cb1")).await.unwrap();
        assert_eq!(receipt.outcome, VoteOutcome::Selected);

        let calls = transport.calls();
        assert_eq!(
            calls[0],
            RecordedCall::Answer {
                callback_id: "cb1".to_string(),
                text: "Vote saved!".to_string()
            }
        );
        assert!(matches!(calls[1], RecordedCall::Edit { .. }));
    }

    #[tokio::test]
    async fn test_unchanged_vote_skips_edit() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;
        let voter = UserId::from("voter");

        service.vote(&id, &voter, 0, None).await.unwrap();
        transport.clear();
        let receipt = service.vote(&id, &voter, 0, None).await.unwrap();

        assert_eq!(receipt.outcome, VoteOutcome::Unchanged);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_edit_keeps_vote() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;
        transport.fail_edits(true);
        transport.fail_answers(true);

        service
            .vote(&id, &UserId::from("voter"), 1, Some("cb"))
            .await
            .unwrap();
        assert_eq!(service.engine().get(&id).unwrap().votes(), &[0, 1]);
    }

    #[tokio::test]
    async fn test_vote_done_only_for_multi_choice() {
        let (service, _transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        let err = service
            .vote_done(&id, &UserId::from("voter"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_export_requires_creator() {
        let (service, _transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        assert_eq!(
            service.export_poll(&id, &UserId::from("other")).unwrap_err(),
            PollError::NotAuthorized
        );
        let csv = String::from_utf8(service.export_poll(&id, &creator).unwrap()).unwrap();
        assert!(csv.starts_with("Option,Votes,Percentage\r\n"));
    }

    #[tokio::test]
    async fn test_manage_view_tracks_status() {
        let (service, _transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        assert_eq!(
            service
                .manage_view(&id, &UserId::from("other"))
                .unwrap_err(),
            PollError::NotAuthorized
        );
        assert!(service
            .manage_view(&id, &creator)
            .unwrap()
            .text
            .ends_with("Status: OPEN"));

        service.close_poll(&id, &creator).await.unwrap();
        let view = service.manage_view(&id, &creator).unwrap();
        assert!(view.text.ends_with("Status: CLOSED"));
        assert_eq!(
            view.controls.unwrap()[0].action,
            render::ControlAction::ReopenPoll { poll_id: id }
        );
    }

    #[tokio::test]
    async fn test_delete_replaces_message() {
        let (service, transport) = service();
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        service.delete_poll(&id, &creator).await.unwrap();
        let (_, message) = transport.last_edit().unwrap();
        assert_eq!(message, render::render_deleted_notice());
        assert_eq!(
            service.delete_poll(&id, &creator).await.unwrap_err(),
            PollError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_vote_racing_delete_keeps_deleted_notice() {
        let transport = Arc::new(GatedTransport::default());
        let service = PollService::new(
            Arc::new(PollEngine::new()),
            DraftStore::default(),
            transport.clone(),
        );
        let creator = UserId::from("creator");
        let id = publish(&service, &creator, "Q\nA\nB", false).await;

        let voter = UserId::from("voter");
        let vote = service.vote(&id, &voter, 0, Some("cb"));
        let delete = async {
            transport.entered.notified().await;
            service.delete_poll(&id, &creator).await.unwrap();
            transport.release.notify_one();
        };
        let (receipt, ()) = tokio::join!(vote, delete);

        assert_eq!(receipt.unwrap().outcome, VoteOutcome::Selected);
        let (_, message) = transport.inner.last_edit().unwrap();
        assert_eq!(message, render::render_deleted_notice());
        assert!(service.engine().is_empty());
        assert_eq!(
            service.vote(&id, &voter, 1, None).await.unwrap_err(),
            PollError::NotFound(id)
        );
    }
}
