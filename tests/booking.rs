mod common;

use chrono::Duration;
use common::{at, harness, shared_harness, MENTOR, OTHER_MENTOR};
use trial_sessions_seaorm::{
    BulkSessionUpdate, ErrorCode, ErrorKind, MenteeContact, NewSlot, SchedulingConfig,
    SessionStatus, SessionUpdate, SlotPolicy,
};

#[tokio::test]
async fn second_booking_is_rejected_and_first_is_kept() {
    let h = harness().await;
    let slot = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)).with_duration(30))
        .await
        .unwrap();
    assert_eq!(slot.status, SessionStatus::Available);
    assert_eq!(slot.mentee_email, None);

    let booked = h
        .engine
        .book(slot.id, &MenteeContact::email("a@x.com").with_name("Ada"))
        .await
        .unwrap();
    assert_eq!(booked.status, SessionStatus::Booked);
    assert_eq!(booked.mentee_email.as_deref(), Some("a@x.com"));

    let err = h
        .engine
        .book(slot.id, &MenteeContact::email("b@y.com"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SessionNotAvailable));
    assert_eq!(err.kind(), Some(ErrorKind::InvalidStateTransition));

    let stored = h.engine.get(slot.id).await.unwrap();
    assert_eq!(stored.mentee_email.as_deref(), Some("a@x.com"));
    assert_eq!(stored.mentee_name.as_deref(), Some("Ada"));
    assert_eq!(stored.status, SessionStatus::Booked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_have_exactly_one_winner() {
    let h = shared_harness().await;
    let slot = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();

    let id = slot.id;
    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .book(id, &MenteeContact::email(format!("mentee{n}@x.com")))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert_eq!(err.code(), Some(ErrorCode::SessionNotAvailable)),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_slots_have_exactly_one_winner() {
    let h = shared_harness().await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 5 * n)))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert_eq!(err.code(), Some(ErrorCode::TimeSlotConflict)),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(h.engine.list_by_mentor(MENTOR).await.unwrap().len(), 1);
}

#[tokio::test]
async fn long_sessions_block_engines_with_tighter_limits() {
    let h = harness().await;
    let long = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)).with_duration(480))
        .await
        .unwrap();

    // 09:00 + 480 minutes + 5 buffer reaches 17:05
    let tight = h.engine_with(SchedulingConfig::default().with_duration_bounds(15, 60));
    assert!(tight
        .has_conflict(MENTOR, at(2025, 9, 1, 16, 0), 30, 5)
        .await
        .unwrap());
    let conflicts = tight
        .list_conflicts(MENTOR, at(2025, 9, 1, 16, 0), 30, 5)
        .await
        .unwrap();
    assert_eq!(conflicts.into_iter().collect::<Vec<_>>(), vec![long.id]);

    let err = tight
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 16, 0)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TimeSlotConflict));

    tight
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 17, 10)))
        .await
        .unwrap();
}

#[tokio::test]
async fn booking_a_missing_session_is_not_found() {
    let h = harness().await;
    let err = h
        .engine
        .book(999, &MenteeContact::email("a@x.com"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TrialSessionNotFound));
}

#[tokio::test]
async fn overlapping_single_slot_is_a_conflict() {
    let h = harness().await;
    h.engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)).with_duration(30))
        .await
        .unwrap();

    // 09:00 + 30 + 5 buffer ends at 09:35; a 09:35 start pads back to 09:30
    let err = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 35)).with_duration(30))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TimeSlotConflict));

    // Padded edges touching at 09:35 do not conflict
    h.engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 40)).with_duration(30))
        .await
        .unwrap();

    // Another mentor is unaffected
    h.engine
        .create_slot(OTHER_MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_mentor_cannot_create_slots() {
    let h = harness().await;
    let err = h
        .engine
        .create_slot(99, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MentorNotFound));
    assert!(h.engine.list_by_mentor(99).await.unwrap().is_empty());
}

#[tokio::test]
async fn booked_sessions_cannot_be_deleted() {
    let h = harness().await;
    let slot = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();

    let err = h.engine.delete(slot.id, OTHER_MENTOR).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnauthorizedAccess));

    h.engine
        .book(slot.id, &MenteeContact::email("a@x.com"))
        .await
        .unwrap();
    let err = h.engine.delete(slot.id, MENTOR).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotDeleteBookedSession));

    let open = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 2, 9, 0)))
        .await
        .unwrap();
    h.engine.delete(open.id, MENTOR).await.unwrap();
    let err = h.engine.get(open.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TrialSessionNotFound));
}

#[tokio::test]
async fn closing_transitions_require_a_booking() {
    let h = harness().await;
    let first = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();

    let err = h.engine.complete(first.id, None).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidSessionStatus));

    h.engine
        .book(first.id, &MenteeContact::email("a@x.com"))
        .await
        .unwrap();
    let done = h
        .engine
        .complete(first.id, Some("Covered ownership and lifetimes".into()))
        .await
        .unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert!(done.status.is_terminal());
    assert_eq!(done.completed_at, Some(at(2025, 8, 25, 9, 0)));
    assert_eq!(done.notes.as_deref(), Some("Covered ownership and lifetimes"));

    let err = h.engine.cancel(first.id).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidSessionStatus));

    let second = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 2, 9, 0)))
        .await
        .unwrap();
    h.engine
        .book(second.id, &MenteeContact::email("b@y.com"))
        .await
        .unwrap();
    let missed = h.engine.mark_no_show(second.id).await.unwrap();
    assert_eq!(missed.status, SessionStatus::NoShow);
}

#[tokio::test]
async fn cancelled_sessions_free_their_slot() {
    let h = harness().await;
    let slot = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();
    h.engine
        .book(slot.id, &MenteeContact::email("a@x.com"))
        .await
        .unwrap();
    let cancelled = h.engine.cancel(slot.id).await.unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);

    assert!(!h
        .engine
        .has_conflict(MENTOR, at(2025, 9, 1, 9, 0), 30, 5)
        .await
        .unwrap());
    h.engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();
}

#[tokio::test]
async fn reschedule_honours_the_lead_time() {
    let h = harness().await;
    // Clock is 2025-08-25 09:00
    let soon = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 8, 26, 5, 0)))
        .await
        .unwrap();
    let later = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 8, 26, 15, 0)))
        .await
        .unwrap();
    for id in [soon.id, later.id] {
        h.engine
            .book(id, &MenteeContact::email("a@x.com"))
            .await
            .unwrap();
    }

    let err = h
        .engine
        .reschedule(soon.id, at(2025, 8, 28, 10, 0), Some("travel"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ReschedulingTooLate));

    let moved = h
        .engine
        .reschedule(later.id, at(2025, 8, 27, 10, 0), Some("travel"))
        .await
        .unwrap();
    assert_eq!(moved.scheduled_date_time, at(2025, 8, 27, 10, 0));
    assert_eq!(moved.status, SessionStatus::Booked);
    assert_eq!(moved.notes.as_deref(), Some("Rescheduled: travel"));

    // Time passes and the same session is now inside its window
    h.clock.advance(Duration::hours(30));
    let err = h
        .engine
        .reschedule(later.id, at(2025, 8, 29, 10, 0), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ReschedulingTooLate));
    assert_eq!(err.kind(), Some(ErrorKind::PolicyViolation));
}

#[tokio::test]
async fn reschedule_checks_status_policy_and_target() {
    let h = harness().await;
    let open = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 2, 10, 0)))
        .await
        .unwrap();
    let err = h
        .engine
        .reschedule(open.id, at(2025, 9, 4, 10, 0), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidSessionStatus));

    let fixed_policy = SlotPolicy {
        allow_rescheduling: false,
        ..SlotPolicy::default()
    };
    let fixed = h
        .engine
        .create_slot(
            MENTOR,
            NewSlot::at(at(2025, 9, 5, 10, 0)).with_policy(fixed_policy),
        )
        .await
        .unwrap();
    h.engine
        .book(fixed.id, &MenteeContact::email("a@x.com"))
        .await
        .unwrap();
    let err = h
        .engine
        .reschedule(fixed.id, at(2025, 9, 6, 10, 0), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ReschedulingNotAllowed));

    let booked = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 3, 10, 0)))
        .await
        .unwrap();
    h.engine
        .book(booked.id, &MenteeContact::email("b@y.com"))
        .await
        .unwrap();

    // Lands on the open 09-02 10:00 slot
    let err = h
        .engine
        .reschedule(booked.id, at(2025, 9, 2, 10, 20), Some("clash"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TimeSlotConflict));
    assert_eq!(
        h.engine.get(booked.id).await.unwrap().scheduled_date_time,
        at(2025, 9, 3, 10, 0)
    );

    // Overlapping only its own old slot is fine
    let nudged = h
        .engine
        .reschedule(booked.id, at(2025, 9, 3, 10, 15), Some("later start"))
        .await
        .unwrap();
    assert_eq!(nudged.scheduled_date_time, at(2025, 9, 3, 10, 15));
}

#[tokio::test]
async fn owner_updates_never_touch_ownership() {
    let h = harness().await;
    let slot = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();
    h.engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 11, 0)))
        .await
        .unwrap();

    let patch = SessionUpdate {
        meeting_link: Some("https://meet.example/abc".into()),
        ..SessionUpdate::default()
    };
    let err = h
        .engine
        .update(slot.id, OTHER_MENTOR, patch.clone())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnauthorizedAccess));
    assert_eq!(err.kind(), Some(ErrorKind::OwnershipViolation));

    let updated = h.engine.update(slot.id, MENTOR, patch).await.unwrap();
    assert_eq!(updated.meeting_link.as_deref(), Some("https://meet.example/abc"));
    assert_eq!(updated.mentor_id, MENTOR);

    let clash = SessionUpdate {
        scheduled_date_time: Some(at(2025, 9, 1, 10, 50)),
        ..SessionUpdate::default()
    };
    let err = h.engine.update(slot.id, MENTOR, clash).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TimeSlotConflict));
}

#[tokio::test]
async fn bulk_changes_require_ownership_of_every_id() {
    let h = harness().await;
    let mine_a = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();
    let mine_b = h
        .engine
        .create_slot(MENTOR, NewSlot::at(at(2025, 9, 2, 9, 0)))
        .await
        .unwrap();
    let theirs = h
        .engine
        .create_slot(OTHER_MENTOR, NewSlot::at(at(2025, 9, 1, 9, 0)))
        .await
        .unwrap();

    let patch = BulkSessionUpdate {
        require_confirmation: Some(true),
        session_type: Some("Phone Call".into()),
        ..BulkSessionUpdate::default()
    };
    let err = h
        .engine
        .update_multiple(&[mine_a.id, theirs.id], &patch, MENTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnauthorizedAccess));
    assert!(!h.engine.get(mine_a.id).await.unwrap().require_confirmation);

    let updated = h
        .engine
        .update_multiple(&[mine_a.id, mine_b.id], &patch, MENTOR)
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated
        .iter()
        .all(|s| s.require_confirmation && s.session_type == "Phone Call"));

    let err = h
        .engine
        .delete_multiple(&[mine_a.id, theirs.id], MENTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UnauthorizedAccess));
    assert!(h.engine.get(mine_a.id).await.is_ok());

    h.engine
        .book(mine_b.id, &MenteeContact::email("a@x.com"))
        .await
        .unwrap();
    let err = h
        .engine
        .delete_multiple(&[mine_a.id, mine_b.id], MENTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::CannotDeleteBookedSession));
    assert!(h.engine.get(mine_a.id).await.is_ok());

    assert_eq!(h.engine.delete_multiple(&[mine_a.id], MENTOR).await.unwrap(), 1);
    assert!(h.engine.get(theirs.id).await.is_ok());
}
