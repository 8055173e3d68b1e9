use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::broadcast::ReportEvent;
use super::domain::{
    Actor, Claim, ClaimId, ClaimStatus, ItemId, ItemType, LostFoundDetail, NewClaim, UserId,
};
use super::effects::{SideEffect, SideEffects};
use super::error::WorkflowError;
use super::outcome::WorkflowOutcome;
use super::repository::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSubmission {
    pub item_id: ItemId,
    pub claimer_id: UserId,
    pub holder_id: UserId,
    pub description: String,
}

/// Result of an accepted claim: the item under its new owner and the closed claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimAcceptance {
    pub item: LostFoundDetail,
    pub claim: Claim,
}

/// Claim submission, acceptance, and rejection for found items.
pub struct ClaimWorkflow<S, E> {
    store: Arc<S>,
    effects: Arc<E>,
}

impl<S, E> ClaimWorkflow<S, E>
where
    S: RecordStore + 'static,
    E: SideEffects + 'static,
{
    pub fn new(store: Arc<S>, effects: Arc<E>) -> Self {
        Self { store, effects }
    }

    fn held_item(
        &self,
        item_id: ItemId,
        holder_id: UserId,
    ) -> Result<LostFoundDetail, WorkflowError> {
        match self.store.item(item_id)? {
            Some(item) if item.owner_user_id == holder_id => Ok(item),
            Some(_) => Err(WorkflowError::not_found(format!(
                "item {item_id} is not held by user {holder_id}"
            ))),
            None => Err(WorkflowError::not_found(format!("item {item_id} not found"))),
        }
    }

    /// Opens a claim against a found item currently held by `holder_id`.
    pub fn submit_claim(
        &self,
        submission: ClaimSubmission,
    ) -> Result<WorkflowOutcome<Claim>, WorkflowError> {
        let description = submission.description.trim();
        if description.is_empty() {
            return Err(WorkflowError::validation("Claim description is required"));
        }
        if submission.claimer_id == submission.holder_id {
            return Err(WorkflowError::validation(
                "Holder cannot claim an item they already hold",
            ));
        }

        let item = self.held_item(submission.item_id, submission.holder_id)?;
        if item.item_type != ItemType::Found {
            return Err(WorkflowError::validation(format!(
                "item {} is reported {}, only found items can be claimed",
                item.id,
                item.item_type.label()
            )));
        }

        let claim = self.store.insert_claim(NewClaim {
            item_id: item.id,
            claimer_id: submission.claimer_id,
            holder_id: submission.holder_id,
            description: description.to_string(),
        })?;
        info!(
            claim_id = %claim.id,
            item_id = %claim.item_id,
            claimer_id = %claim.claimer_id,
            "claim submitted"
        );

        let warnings = self
            .effects
            .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]);
        Ok(WorkflowOutcome::new("Claim submitted successfully", claim).with_warnings(warnings))
    }

    fn acceptance_events(item_id: ItemId, claimer_id: UserId) -> Vec<SideEffect> {
        vec![
            SideEffect::broadcast(ReportEvent::ClaimAccepted {
                item_id,
                claimer_id,
            }),
            SideEffect::broadcast(ReportEvent::Update),
        ]
    }

    /// Transfers the item to `claimer_id` and closes their open claim.
    ///
    /// The item stays claimable afterwards; its next claim names the new owner as holder. If the
    /// claim cannot be closed after the transfer commits, the caller gets
    /// [`WorkflowError::PartialFailure`] and the new owner stands.
    pub fn accept_claim(
        &self,
        item_id: ItemId,
        holder_id: UserId,
        claimer_id: UserId,
    ) -> Result<WorkflowOutcome<ClaimAcceptance>, WorkflowError> {
        self.held_item(item_id, holder_id)?;
        let mut claim = self
            .store
            .claims_for_item(item_id)?
            .into_iter()
            .find(|claim| claim.claimer_id == claimer_id && claim.status == ClaimStatus::Open)
            .ok_or_else(|| {
                WorkflowError::not_found(format!(
                    "no open claim by user {claimer_id} on item {item_id}"
                ))
            })?;

        if self.store.transfer_item(item_id, holder_id, claimer_id)? == 0 {
            return Err(WorkflowError::not_found(format!(
                "item {item_id} is not held by user {holder_id}"
            )));
        }
        if let Err(source) = self.store.set_claim_status(claim.id, ClaimStatus::Accepted) {
            error!(
                claim_id = %claim.id,
                %item_id,
                to = %claimer_id,
                error = %source,
                "ownership transferred but claim left open"
            );
            self.effects.dispatch(Self::acceptance_events(item_id, claimer_id));
            return Err(WorkflowError::PartialFailure {
                completed: "ownership transfer",
                source,
            });
        }
        info!(
            claim_id = %claim.id,
            %item_id,
            from = %holder_id,
            to = %claimer_id,
            "claim accepted; ownership transferred"
        );

        claim = self.store.claim(claim.id)?.unwrap_or(Claim {
            status: ClaimStatus::Accepted,
            ..claim
        });
        let item = self
            .store
            .item(item_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("item {item_id} not found")))?;

        let warnings = self
            .effects
            .dispatch(Self::acceptance_events(item_id, claimer_id));

        Ok(
            WorkflowOutcome::new("Claim accepted successfully", ClaimAcceptance { item, claim })
                .with_warnings(warnings),
        )
    }

    /// Closes an open claim without transferring ownership. Repeating a rejection is a no-op.
    pub fn reject_claim(
        &self,
        claim_id: ClaimId,
        actor: Actor,
    ) -> Result<WorkflowOutcome<Claim>, WorkflowError> {
        let claim = self
            .store
            .claim(claim_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("claim {claim_id} not found")))?;

        if !actor.is_admin() && actor.user_id != claim.holder_id {
            return Err(WorkflowError::unauthorized(
                "Unauthorized: only the item holder can reject this claim",
            ));
        }

        match claim.status {
            ClaimStatus::Rejected => Ok(WorkflowOutcome::new("Claim already rejected", claim)),
            ClaimStatus::Accepted => Err(WorkflowError::validation(format!(
                "Claim was already {} and cannot be rejected",
                claim.status.label()
            ))),
            ClaimStatus::Open => {
                self.store.set_claim_status(claim_id, ClaimStatus::Rejected)?;
                info!(%claim_id, item_id = %claim.item_id, "claim rejected");
                let claim = self.store.claim(claim_id)?.unwrap_or(Claim {
                    status: ClaimStatus::Rejected,
                    ..claim
                });
                let warnings = self
                    .effects
                    .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]);
                Ok(WorkflowOutcome::new("Claim rejected", claim).with_warnings(warnings))
            }
        }
    }

    pub fn claims_for_item(&self, item_id: ItemId) -> Result<Vec<Claim>, WorkflowError> {
        if self.store.item(item_id)?.is_none() {
            return Err(WorkflowError::not_found(format!("item {item_id} not found")));
        }
        Ok(self.store.claims_for_item(item_id)?)
    }
}
