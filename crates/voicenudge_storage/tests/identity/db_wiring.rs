#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::{
    EmailAddress, PasswordHash, SecurityAnswerHash, SecurityQuestion, SessionToken, UserId,
    VoiceEmbedding,
};
use voicenudge_kernel_contracts::UtcTimestamp;
use voicenudge_storage::{NudgeStore, SessionRecord, StorageError, UserRecord};

fn t(secs: i64) -> UtcTimestamp {
    UtcTimestamp::from_unix_seconds(secs).unwrap()
}

fn enrolled_user(store: &mut NudgeStore) -> UserId {
    let user_id = store.next_user_id();
    store
        .insert_user(
            UserRecord::v1(
                user_id.clone(),
                "DBW User".to_string(),
                EmailAddress::new("dbw@example.com").unwrap(),
                PasswordHash::new("v1$c2FsdA$aGFzaA").unwrap(),
                Some(VoiceEmbedding::new(vec![1.0, 0.0]).unwrap()),
                Some(SecurityQuestion::new("First pet?").unwrap()),
                Some(SecurityAnswerHash::new("v1$c2FsdA$YW5z").unwrap()),
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
    user_id
}

#[test]
fn at_identity_db_01_credential_view_reflects_lock_state() {
    let mut s = NudgeStore::new_in_memory();
    let user_id = enrolled_user(&mut s);

    let view = s.user(&user_id).unwrap().credential_view().unwrap();
    assert!(!view.voice_locked);

    s.set_voice_locked(&user_id, true).unwrap();
    let view = s.user(&user_id).unwrap().credential_view().unwrap();
    assert!(view.voice_locked);

    // Admin-style unlock restores the voice path.
    s.set_voice_locked(&user_id, false).unwrap();
    let view = s.user(&user_id).unwrap().credential_view().unwrap();
    assert!(!view.voice_locked);
}

#[test]
fn at_identity_db_02_email_lookup_is_case_normalized() {
    let mut s = NudgeStore::new_in_memory();
    let user_id = enrolled_user(&mut s);

    let probe = EmailAddress::new("  DBW@EXAMPLE.COM ").unwrap();
    let found = s.user_by_email(&probe).expect("lookup should hit");
    assert_eq!(found.user_id, user_id);
}

#[test]
fn at_identity_db_03_session_requires_existing_user() {
    let mut s = NudgeStore::new_in_memory();
    let ghost = UserId::new("user_999999").unwrap();
    let out = s.insert_session(SessionRecord::v1(
        SessionToken::new("tok_abc123").unwrap(),
        ghost,
        t(5),
    ));
    assert!(matches!(
        out,
        Err(StorageError::ForeignKeyViolation { table: "sessions.user_id", .. })
    ));
}

#[test]
fn at_identity_db_04_logout_deletes_session_once() {
    let mut s = NudgeStore::new_in_memory();
    let user_id = enrolled_user(&mut s);
    let token = SessionToken::new("tok_abc123").unwrap();
    s.insert_session(SessionRecord::v1(token.clone(), user_id, t(5)))
        .unwrap();

    assert!(s.session(&token).is_some());
    assert!(s.delete_session(&token));
    assert!(!s.delete_session(&token));
    assert!(s.session(&token).is_none());
}

#[test]
fn at_identity_db_05_late_enrollment_updates_embedding() {
    let mut s = NudgeStore::new_in_memory();
    let user_id = s.next_user_id();
    s.insert_user(
        UserRecord::v1(
            user_id.clone(),
            "Plain User".to_string(),
            EmailAddress::new("plain@example.com").unwrap(),
            PasswordHash::new("v1$c2FsdA$aGFzaA").unwrap(),
            None,
            None,
            None,
            t(1),
        )
        .unwrap(),
    )
    .unwrap();
    assert!(s.user(&user_id).unwrap().voice_embedding.is_none());

    s.set_voice_embedding(&user_id, VoiceEmbedding::new(vec![0.5, 0.5]).unwrap())
        .unwrap();
    assert_eq!(
        s.user(&user_id).unwrap().voice_embedding.as_ref().unwrap().dim(),
        2
    );
}
