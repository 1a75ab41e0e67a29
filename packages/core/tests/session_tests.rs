//! End-to-end tests for the secure session protocol
//!
//! Covers key exchange, content round trip, tamper detection, all-or-nothing
//! installation, epoch ordering, resets and dispatcher rejections.

mod common;

use std::sync::atomic::Ordering;

use common::{accepted, connected, rejected, Party};
use tandem_core::crypto::VerificationState;
use tandem_core::protocol::envelope::{SealedText, SealedTextSignatures};
use tandem_core::session::{
    Outbound, SessionEvent, TransportEvent, KEY_EXCHANGE_REJECTED_NOTICE, REJECTION_NOTICE,
};
use tandem_core::{Envelope, RejectReason, TandemError};

fn content_parts(envelope: &Envelope) -> (SealedText, SealedTextSignatures) {
    match envelope {
        Envelope::Content(c) => (c.text().clone(), c.signature().clone()),
        Envelope::KeyExchange(_) => panic!("expected content"),
    }
}

/// Flip one bit at `pos` (wrapped) of content blob number `field`
fn tamper(envelope: &Envelope, field: usize, pos: usize) -> Envelope {
    let (mut text, mut sig) = content_parts(envelope);
    let blob = match field {
        0 => &mut text.enc_ciphertext,
        1 => &mut text.enc_hash,
        2 => &mut sig.enc_sig_ciphertext,
        _ => &mut sig.enc_sig_hash,
    };
    let idx = pos % blob.len();
    blob[idx] ^= 0x01;
    Envelope::content(
        envelope.sender().clone(),
        envelope.recipient().clone(),
        envelope.epoch(),
        text,
        sig,
    )
}

/// Same envelope, different epoch label
fn relabel(envelope: &Envelope, epoch: u64) -> Envelope {
    let (sender, recipient) = (envelope.sender().clone(), envelope.recipient().clone());
    match envelope {
        Envelope::KeyExchange(kx) => Envelope::key_exchange(
            sender,
            recipient,
            epoch,
            kx.key().clone(),
            kx.signature().clone(),
        ),
        Envelope::Content(c) => Envelope::content(
            sender,
            recipient,
            epoch,
            c.text().clone(),
            c.signature().clone(),
        ),
    }
}

#[tokio::test]
async fn test_round_trip() {
    let (mut alice, mut bob) = connected().await;
    assert_eq!(bob.session.verification_state(), VerificationState::Verified);
    assert!(alice.session.can_send());

    let long = "x".repeat(4096);
    for text in ["hello", "ünïcødé ✓", long.as_str()] {
        let envelope = alice.seal(text).await;
        bob.deliver(&envelope).await.unwrap();
        assert_eq!(accepted(&bob.drain()), vec![text.to_string()]);
    }

    // И в обратную сторону
    let envelope = bob.seal("hi alice").await;
    alice.deliver(&envelope).await.unwrap();
    assert_eq!(accepted(&alice.drain()), vec!["hi alice".to_string()]);
}

#[tokio::test]
async fn test_alice_bob_scenario() {
    let mut alice = Party::new();
    let mut bob = Party::new();

    // Alice узнаёт Bpub и отправляет key exchange
    let kx = alice.learn(bob.key()).await;
    assert_eq!(kx.code(), 1);
    assert_eq!(kx.blobs().len(), 6);

    // Bob знает Apub, расшифровывает и проверяет 3/3
    bob.learn(alice.key()).await;
    bob.drain();
    bob.deliver(&kx).await.unwrap();
    let events = bob.drain();
    assert!(events.contains(&SessionEvent::SessionVerified {
        peer: alice.key(),
        epoch: kx.epoch(),
    }));

    // Content "hello"
    let content = alice.seal("hello").await;
    assert_eq!(content.code(), 2);
    assert_eq!(content.epoch(), kx.epoch());
    bob.deliver(&content).await.unwrap();
    let events = bob.drain();
    assert_eq!(accepted(&events), vec!["hello".to_string()]);
    match events.last() {
        Some(SessionEvent::MessageAccepted(message)) => {
            assert_eq!(message.sender, alice.key());
            assert_eq!(message.recipient, bob.key());
        }
        other => panic!("unexpected {:?}", other),
    }

    // Один байт encHash изменён по дороге
    let next = alice.seal("hello").await;
    let tampered = tamper(&next, 1, 50);
    assert!(bob.deliver(&tampered).await.is_err());
    let events = bob.drain();
    assert!(accepted(&events).is_empty());
    assert_eq!(rejected(&events).len(), 1);
}

#[tokio::test]
async fn test_tamper_detection_on_every_content_blob() {
    let (mut alice, mut bob) = connected().await;
    let envelope = alice.seal("attack at dawn").await;

    for field in 0..4 {
        for pos in [0, 17, 33, 45, 61, usize::MAX - 1] {
            let tampered = tamper(&envelope, field, pos);
            assert!(bob.deliver(&tampered).await.is_err());

            let events = bob.drain();
            assert!(accepted(&events).is_empty(), "field {} pos {}", field, pos);
            assert_eq!(rejected(&events), vec![RejectReason::Decryption]);
            assert!(events.contains(&SessionEvent::Notice(REJECTION_NOTICE.to_string())));
        }
    }

    // Ошибки не рвут сессию: оригинал всё ещё принимается
    bob.deliver(&envelope).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["attack at dawn".to_string()]);
}

#[tokio::test]
async fn test_hmac_mismatch_is_integrity_failure() {
    let (mut alice, mut bob) = connected().await;
    alice.faults.corrupt_hmac.store(true, Ordering::SeqCst);

    let envelope = alice.seal("hello").await;
    assert!(matches!(
        bob.deliver(&envelope).await,
        Err(TandemError::Integrity(_))
    ));
    let events = bob.drain();
    assert!(accepted(&events).is_empty());
    assert_eq!(rejected(&events), vec![RejectReason::Integrity]);
}

#[tokio::test]
async fn test_bad_content_signature_is_verification_failure() {
    let (mut alice, mut bob) = connected().await;
    alice.faults.corrupt_sign.store(true, Ordering::SeqCst);

    let envelope = alice.seal("hello").await;
    assert!(matches!(
        bob.deliver(&envelope).await,
        Err(TandemError::Verification(_))
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::Verification]);
}

#[tokio::test]
async fn test_partial_key_exchange_never_installs() {
    let scripts: [&[bool]; 6] = [
        &[true, false, false],
        &[false, true, false],
        &[false, false, true],
        &[true, true, false],
        &[false, true, true],
        &[true, false, true],
    ];

    for script in scripts {
        let mut alice = Party::new();
        let mut bob = Party::new();
        let kx = alice.learn(bob.key()).await;
        bob.learn(alice.key()).await;
        bob.drain();

        bob.faults.script_verify(script);
        assert!(matches!(
            bob.deliver(&kx).await,
            Err(TandemError::Verification(_))
        ));

        assert_eq!(bob.session.verification_state(), VerificationState::Unverified);
        assert_eq!(bob.session.installed_epoch(), None);
        let events = bob.drain();
        assert!(!events
            .iter()
            .any(|e| matches!(e, SessionEvent::SessionVerified { .. })));
        assert_eq!(rejected(&events), vec![RejectReason::Verification]);
        assert!(events.contains(&SessionEvent::Notice(
            KEY_EXCHANGE_REJECTED_NOTICE.to_string()
        )));

        // Content этого раунда не расшифровывается
        let content = alice.seal("secret").await;
        assert_eq!(
            bob.deliver(&content).await.unwrap_err(),
            TandemError::UnverifiedSession
        );
        assert!(accepted(&bob.drain()).is_empty());
    }
}

#[tokio::test]
async fn test_failed_rekey_discards_previous_material() {
    let (mut alice, mut bob) = connected().await;
    let old_content = alice.seal("old").await;

    let kx = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    bob.faults.script_verify(&[false, true, false]);
    assert!(bob.deliver(&kx).await.is_err());

    let events = bob.drain();
    assert!(events.contains(&SessionEvent::SessionReset));
    assert_eq!(bob.session.verification_state(), VerificationState::Unverified);

    // Старый материал не вернулся
    assert!(bob.deliver(&old_content).await.is_err());
    assert!(accepted(&bob.drain()).is_empty());
}

#[tokio::test]
async fn test_no_content_before_session() {
    let mut alice = Party::new();
    let mut bob = Party::new();

    // Отправка без собеседника
    assert_eq!(
        alice.session.send_content("hi").await.unwrap_err(),
        TandemError::UnverifiedSession
    );

    // Content без key exchange ждёт и не расшифровывается
    alice.learn(bob.key()).await;
    bob.learn(alice.key()).await;
    bob.drain();
    let content = alice.seal("too early").await;
    bob.deliver(&content).await.unwrap();
    assert!(accepted(&bob.drain()).is_empty());
    assert_eq!(bob.session.snapshot().pending_content, 1);

    // Disconnect выбрасывает ожидающий Content
    bob.session
        .handle_transport_event(TransportEvent::PeerDisconnected)
        .await
        .unwrap();
    assert_eq!(bob.session.snapshot().pending_content, 0);
    assert!(accepted(&bob.drain()).is_empty());
}

#[tokio::test]
async fn test_content_overtaking_its_key_exchange_is_replayed() {
    let (mut alice, mut bob) = connected().await;
    let stale = alice.seal("from epoch 1").await;

    let kx = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    let content = alice.seal("from epoch 2").await;
    assert_eq!(content.epoch(), kx.epoch());

    // Content пришёл раньше своего key exchange
    bob.deliver(&content).await.unwrap();
    assert!(accepted(&bob.drain()).is_empty());
    assert_eq!(bob.session.snapshot().pending_content, 1);

    bob.deliver(&kx).await.unwrap();
    let events = bob.drain();
    assert!(events.contains(&SessionEvent::SessionReset));
    assert!(events.contains(&SessionEvent::SessionVerified {
        peer: alice.key(),
        epoch: kx.epoch(),
    }));
    assert_eq!(accepted(&events), vec!["from epoch 2".to_string()]);

    // Content прошлой эпохи больше не принимается
    assert!(matches!(
        bob.deliver(&stale).await,
        Err(TandemError::EpochMismatch { .. })
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::EpochMismatch]);
}

#[tokio::test]
async fn test_rekey_every_message_in_any_order() {
    let mut alice = Party::rekeying();
    let mut bob = Party::new();

    alice.learn(bob.key()).await;
    bob.learn(alice.key()).await;
    bob.drain();

    let first = alice.session.send_content("one").await.unwrap();
    assert_eq!(first.envelopes.len(), 2);
    assert_eq!(first.echo.text, "one");
    for envelope in &first.envelopes {
        bob.deliver(envelope).await.unwrap();
    }

    let second = alice.session.send_content("two").await.unwrap();
    assert!(second.envelopes[1].epoch() > first.envelopes[1].epoch());
    for envelope in second.envelopes.iter().rev() {
        bob.deliver(envelope).await.unwrap();
    }

    assert_eq!(
        accepted(&bob.drain()),
        vec!["one".to_string(), "two".to_string()]
    );
}

#[tokio::test]
async fn test_disconnect_resets_and_new_peer_starts_clean() {
    let (mut alice, mut bob) = connected().await;
    let from_alice = alice.seal("before disconnect").await;

    bob.session
        .handle_transport_event(TransportEvent::PeerDisconnected)
        .await
        .unwrap();
    let events = bob.drain();
    assert!(events.contains(&SessionEvent::SessionReset));
    assert_eq!(bob.session.verification_state(), VerificationState::Unverified);
    assert!(bob.session.peer().is_none());
    assert!(!bob.session.can_send());

    // Новый собеседник
    let mut carol = Party::new();
    let kx_from_carol = carol.learn(bob.key()).await;
    bob.learn(carol.key()).await;
    bob.deliver(&kx_from_carol).await.unwrap();
    assert_eq!(bob.session.verification_state(), VerificationState::Verified);
    bob.drain();

    // Старый Content от Alice не проходит
    assert!(matches!(
        bob.deliver(&from_alice).await,
        Err(TandemError::UnknownSender(_))
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::UnknownSender]);

    let from_carol = carol.seal("hi bob").await;
    bob.deliver(&from_carol).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["hi bob".to_string()]);
}

#[tokio::test]
async fn test_room_change_resets_and_announces() {
    let (_alice, mut bob) = connected().await;
    let outs = bob
        .session
        .handle_transport_event(TransportEvent::RoomJoined(42))
        .await
        .unwrap();

    assert_eq!(outs, vec![Outbound::AnnouncePublicKey(bob.key())]);
    assert!(bob.session.peer().is_none());
    assert!(bob.drain().contains(&SessionEvent::SessionReset));
}

#[tokio::test]
async fn test_dispatcher_rejections() {
    let (mut alice, mut bob) = connected().await;
    let mut carol = Party::new();

    // Не нам
    let to_bob = alice.seal("for bob").await;
    assert!(matches!(
        carol.deliver(&to_bob).await,
        Err(TandemError::Misaddressed(_))
    ));
    assert_eq!(rejected(&carol.drain()), vec![RejectReason::Misaddressed]);

    // От третьего участника
    carol.session.initiate_key_exchange(bob.key()).await.unwrap();
    let from_carol = carol.seal("intruder").await;
    assert!(matches!(
        bob.deliver(&from_carol).await,
        Err(TandemError::UnknownSender(_))
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::UnknownSender]);

    // Битая структура
    let (mut text, sig) = content_parts(&to_bob);
    text.enc_hash.truncate(10);
    let malformed = Envelope::content(alice.key(), bob.key(), to_bob.epoch(), text, sig);
    assert!(matches!(
        bob.deliver(&malformed).await,
        Err(TandemError::Malformed(_))
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::Malformed]);

    // Сессия Bob не пострадала
    bob.deliver(&to_bob).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["for bob".to_string()]);
}

#[tokio::test]
async fn test_reannounced_key_starts_new_round() {
    let (mut alice, mut bob) = connected().await;
    let epoch = bob.session.installed_epoch().unwrap();

    let kx = alice.learn(bob.key()).await;
    assert!(kx.epoch() > epoch);
    bob.deliver(&kx).await.unwrap();
    assert_eq!(bob.session.installed_epoch(), Some(kx.epoch()));

    let content = alice.seal("after rekey").await;
    bob.deliver(&content).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["after rekey".to_string()]);
}

#[tokio::test]
async fn test_relabelled_key_exchange_is_rejected() {
    let (mut alice, mut bob) = connected().await;
    let kx = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    assert_eq!(kx.epoch(), 2);

    // Настоящий key exchange с эпохой u64::MAX
    let forged = relabel(&kx, u64::MAX);
    assert!(matches!(
        bob.deliver(&forged).await,
        Err(TandemError::Verification(_))
    ));
    let events = bob.drain();
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::SessionVerified { .. })));
    assert_eq!(rejected(&events), vec![RejectReason::Verification]);
    assert_eq!(bob.session.installed_epoch(), None);

    // Подделка не сдвинула счётчик: настоящий раунд ставится
    bob.deliver(&kx).await.unwrap();
    assert_eq!(bob.session.installed_epoch(), Some(2));
    let content = alice.seal("still here").await;
    bob.deliver(&content).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["still here".to_string()]);
}

#[tokio::test]
async fn test_replayed_round_under_new_epoch_is_rejected() {
    let mut alice = Party::new();
    let mut bob = Party::new();
    let first = alice.learn(bob.key()).await;
    bob.learn(alice.key()).await;
    bob.deliver(&first).await.unwrap();
    let old_content = alice.seal("epoch one").await;

    let second = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    bob.deliver(&second).await.unwrap();
    assert_eq!(bob.session.installed_epoch(), Some(2));
    bob.drain();

    // Раунд 1 повторён под эпохой 3
    assert!(matches!(
        bob.deliver(&relabel(&first, 3)).await,
        Err(TandemError::Verification(_))
    ));
    assert_eq!(rejected(&bob.drain()), vec![RejectReason::Verification]);
    assert_eq!(bob.session.installed_epoch(), None);

    // Старый материал не вернулся, Content эпохи 1 не читается
    assert!(bob.deliver(&relabel(&old_content, 3)).await.is_err());
    assert!(accepted(&bob.drain()).is_empty());

    let third = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    assert_eq!(third.epoch(), 3);
    bob.deliver(&third).await.unwrap();
    assert_eq!(bob.session.installed_epoch(), Some(3));
    let content = alice.seal("epoch three").await;
    bob.deliver(&content).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["epoch three".to_string()]);
}

#[tokio::test]
async fn test_relabelled_content_is_rejected() {
    let (mut alice, mut bob) = connected().await;
    let old = alice.seal("old").await;

    let kx = alice.session.initiate_key_exchange(bob.key()).await.unwrap();
    bob.deliver(&kx).await.unwrap();
    bob.drain();

    // Content эпохи 1 переписан на текущую эпоху
    assert!(matches!(
        bob.deliver(&relabel(&old, kx.epoch())).await,
        Err(TandemError::Verification(_))
    ));
    let events = bob.drain();
    assert!(accepted(&events).is_empty());
    assert_eq!(rejected(&events), vec![RejectReason::Verification]);
    assert!(events.contains(&SessionEvent::Notice(REJECTION_NOTICE.to_string())));

    // На будущую эпоху: ждёт, но не расшифровывается
    bob.deliver(&relabel(&old, kx.epoch() + 5)).await.unwrap();
    assert_eq!(bob.session.snapshot().pending_content, 1);
    assert!(accepted(&bob.drain()).is_empty());

    let genuine = alice.seal("new").await;
    bob.deliver(&genuine).await.unwrap();
    assert_eq!(accepted(&bob.drain()), vec!["new".to_string()]);
}
