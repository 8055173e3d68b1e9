use super::common::*;
use crate::workflows::reports::broadcast::ReportEvent;
use crate::workflows::reports::claims::ClaimSubmission;
use crate::workflows::reports::domain::{
    Actor, ClaimId, ClaimStatus, ItemId, ItemType, LostFoundDetail, UserId,
};
use crate::workflows::reports::error::WorkflowError;
use crate::workflows::reports::repository::RecordStore;

fn submission(item: &LostFoundDetail, claimer: u64, holder: u64) -> ClaimSubmission {
    ClaimSubmission {
        item_id: item.id,
        claimer_id: UserId(claimer),
        holder_id: UserId(holder),
        description: "black strap with my initials".to_string(),
    }
}

#[test]
fn accepted_claim_transfers_ownership_and_item_stays_claimable() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "backpack", "Gym");

    let claim = h
        .service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created")
        .data;
    assert_eq!(claim.status, ClaimStatus::Open);
    h.events.clear();

    let accepted = h
        .service
        .accept_claim(item.id, UserId(3), UserId(9))
        .expect("accepted");
    assert_eq!(accepted.data.item.owner_user_id, UserId(9));
    assert_eq!(accepted.data.claim.status, ClaimStatus::Accepted);
    assert!(accepted.data.claim.resolved_at.is_some());
    assert_eq!(
        h.events.events(),
        vec![
            ReportEvent::ClaimAccepted {
                item_id: item.id,
                claimer_id: UserId(9),
            },
            ReportEvent::Update,
        ]
    );

    let listed = h.service.lost_found_items().expect("items");
    assert_eq!(listed[0].owner_user_id, UserId(9));

    let follow_up = h
        .service
        .submit_claim(submission(&item, 11, 9))
        .expect("item remains claimable");
    assert_eq!(follow_up.data.holder_id, UserId(9));
    assert!(matches!(
        h.service.submit_claim(submission(&item, 11, 3)),
        Err(WorkflowError::NotFound(_))
    ));
}

#[test]
fn retriage_after_transfer_keeps_the_new_owner() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "backpack", "Gym");
    h.service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created");
    h.service
        .accept_claim(item.id, UserId(3), UserId(9))
        .expect("accepted");

    h.service
        .set_report_type(lost_found_triage(item.report_id, 3, ItemType::Found, "grey backpack"))
        .expect("re-triaged");

    let stored = h.store.item(item.id).expect("reachable").expect("row");
    assert_eq!(stored.owner_user_id, UserId(9));
    assert_eq!(stored.item_name, "grey backpack");
}

#[test]
fn submit_claim_validates_before_writing() {
    let h = harness();
    let found = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");
    let lost = seed_item(&h, 4, ItemType::Lost, "keys", "Lobby");

    let mut blank = submission(&found, 9, 3);
    blank.description = "   ".to_string();
    assert!(matches!(
        h.service.submit_claim(blank),
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        h.service.submit_claim(submission(&found, 3, 3)),
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        h.service.submit_claim(submission(&found, 9, 5)),
        Err(WorkflowError::NotFound(_))
    ));
    assert!(matches!(
        h.service.submit_claim(submission(&lost, 9, 4)),
        Err(WorkflowError::Validation(_))
    ));
    assert!(matches!(
        h.service.submit_claim(ClaimSubmission {
            item_id: ItemId(999),
            ..submission(&found, 9, 3)
        }),
        Err(WorkflowError::NotFound(_))
    ));

    assert!(h
        .service
        .claims_for_item(found.id)
        .expect("claims")
        .is_empty());
}

#[test]
fn accept_requires_an_open_claim_and_the_current_holder() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");

    assert!(matches!(
        h.service.accept_claim(item.id, UserId(3), UserId(9)),
        Err(WorkflowError::NotFound(_))
    ));

    h.service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created");
    assert!(matches!(
        h.service.accept_claim(item.id, UserId(4), UserId(9)),
        Err(WorkflowError::NotFound(_))
    ));
    assert_eq!(
        h.store.item(item.id).expect("reachable").expect("row").owner_user_id,
        UserId(3)
    );
}

#[test]
fn reject_is_limited_to_holder_or_admin_and_is_idempotent() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");
    let claim = h
        .service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created")
        .data;

    assert!(matches!(
        h.service.reject_claim(claim.id, Actor::user(UserId(9))),
        Err(WorkflowError::Unauthorized(_))
    ));

    let rejected = h
        .service
        .reject_claim(claim.id, Actor::user(UserId(3)))
        .expect("rejected");
    assert_eq!(rejected.data.status, ClaimStatus::Rejected);

    let again = h
        .service
        .reject_claim(claim.id, Actor::admin(UserId(1)))
        .expect("idempotent");
    assert!(again.success);
    assert_eq!(again.data.status, ClaimStatus::Rejected);

    assert!(matches!(
        h.service.accept_claim(item.id, UserId(3), UserId(9)),
        Err(WorkflowError::NotFound(_))
    ));
    assert!(matches!(
        h.service.reject_claim(ClaimId(404), Actor::admin(UserId(1))),
        Err(WorkflowError::NotFound(_))
    ));
}

#[test]
fn accepted_claims_cannot_be_rejected() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");
    let claim = h
        .service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created")
        .data;
    h.service
        .accept_claim(item.id, UserId(3), UserId(9))
        .expect("accepted");

    match h.service.reject_claim(claim.id, Actor::admin(UserId(1))) {
        Err(WorkflowError::Validation(message)) => assert_eq!(
            message,
            "Claim was already accepted and cannot be rejected"
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn publish_failure_does_not_undo_the_transfer() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");
    h.service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created");
    h.events.fail_publishing();

    let accepted = h
        .service
        .accept_claim(item.id, UserId(3), UserId(9))
        .expect("accepted");

    assert_eq!(accepted.warnings.len(), 2);
    assert_eq!(
        h.store.item(item.id).expect("reachable").expect("row").owner_user_id,
        UserId(9)
    );
}

#[test]
fn failed_claim_close_reports_the_committed_transfer() {
    let h = harness();
    let item = seed_item(&h, 3, ItemType::Found, "umbrella", "Lobby");
    let claim = h
        .service
        .submit_claim(submission(&item, 9, 3))
        .expect("claim created")
        .data;
    h.events.clear();
    h.store.fail_claim_updates();

    match h.service.accept_claim(item.id, UserId(3), UserId(9)) {
        Err(WorkflowError::PartialFailure { completed, .. }) => {
            assert_eq!(completed, "ownership transfer")
        }
        other => panic!("expected partial failure, got {other:?}"),
    }

    assert_eq!(
        h.store.item(item.id).expect("reachable").expect("row").owner_user_id,
        UserId(9)
    );
    assert_eq!(
        h.store.claim(claim.id).expect("reachable").expect("row").status,
        ClaimStatus::Open
    );
    assert_eq!(
        h.events.events(),
        vec![
            ReportEvent::ClaimAccepted {
                item_id: item.id,
                claimer_id: UserId(9),
            },
            ReportEvent::Update,
        ]
    );
}
