use roster::{Identity, Policy, RosterRegistry};

use crate::error::ChatError;
use crate::tests::utils::{fake_group, fake_party, open_chat};
use crate::ChatLog;

#[tokio::test]
pub async fn outsider_cannot_open_chat_test() {
    let registry = RosterRegistry::default();
    let alice = fake_party(&registry).await;
    let eve = fake_party(&registry).await;
    let group = fake_group(&registry, &[&alice]).await;

    assert_eq!(
        ChatLog::new(&registry, &group, &eve.user, &eve.agent)
            .await
            .map(|_| ()),
        Err(ChatError::NotPermitted),
        "eve's roster is not in the group"
    );
    assert_eq!(
        ChatLog::new(&registry, &group, &alice.user, &eve.agent)
            .await
            .map(|_| ()),
        Err(ChatError::NotPermitted),
        "eve's agent is not in alice's roster"
    );
}

#[tokio::test]
pub async fn outsider_rekey_is_rejected_test() {
    let registry = RosterRegistry::default();
    let alice = fake_party(&registry).await;
    let bob = fake_party(&registry).await;
    let eve = fake_party(&registry).await;
    let group = fake_group(&registry, &[&alice, &bob, &eve]).await;

    let bob_chat = open_chat(&registry, &group, &bob).await;
    let eve_chat = open_chat(&registry, &group, &eve).await;

    group
        .change_roster(&alice.agent, &alice.user, &eve.user, Policy::NONE)
        .await
        .expect("alice removes eve");

    assert_eq!(
        eve_chat.rekey().await,
        Err(ChatError::NotPermitted),
        "eve can no longer rekey"
    );

    let alice_chat = open_chat(&registry, &group, &alice).await;
    let rekey = alice_chat.rekey().await.expect("alice may rekey");
    assert_eq!(
        eve_chat.receive(rekey.clone()).await,
        Ok(None),
        "eve simply gets no piece"
    );
    assert!(!eve_chat.has_key().await, "eve was left out");
    bob_chat
        .receive(rekey)
        .await
        .expect("bob takes alice's rekey");
    assert!(bob_chat.has_key().await, "bob is still a participant");
}

#[tokio::test]
pub async fn unknown_roster_rekey_is_rejected_test() {
    let registry = RosterRegistry::default();
    let alice = fake_party(&registry).await;
    let bob = fake_party(&registry).await;
    let group = fake_group(&registry, &[&alice, &bob]).await;

    // Mallory's roster lives in another registry, so bob cannot resolve it.
    let elsewhere = RosterRegistry::default();
    let mallory = fake_party(&elsewhere).await;
    let mallory_group = fake_group(&elsewhere, &[&mallory]).await;
    let mallory_chat = open_chat(&elsewhere, &mallory_group, &mallory).await;
    let rekey = mallory_chat.rekey().await.expect("mallory rekeys a chat of their own");

    let bob_chat = open_chat(&registry, &group, &bob).await;
    assert_eq!(
        bob_chat.receive(rekey).await,
        Err(ChatError::NotPermitted),
        "actor roster is unknown here"
    );
}

#[tokio::test]
pub async fn removed_member_loses_key_test() {
    let registry = RosterRegistry::default();
    let alice = fake_party(&registry).await;
    let bob = fake_party(&registry).await;
    let carol = fake_party(&registry).await;
    let group = fake_group(&registry, &[&alice, &bob, &carol]).await;

    let alice_chat = open_chat(&registry, &group, &alice).await;
    let bob_chat = open_chat(&registry, &group, &bob).await;
    let carol_chat = open_chat(&registry, &group, &carol).await;

    let rekey = alice_chat.rekey().await.expect("alice may rekey");
    bob_chat.receive(rekey.clone()).await.expect("valid rekey");
    carol_chat.receive(rekey).await.expect("valid rekey");
    assert!(carol_chat.has_key().await, "carol was a participant");

    group
        .change_roster(&alice.agent, &alice.user, &carol.user, Policy::NONE)
        .await
        .expect("alice removes carol");

    let rekey = alice_chat.rekey().await.expect("alice may rekey");
    bob_chat.receive(rekey.clone()).await.expect("valid rekey");
    carol_chat.receive(rekey).await.expect("a rekey without us is valid");
    assert!(!carol_chat.has_key().await, "carol's key was cleared");
    assert!(bob_chat.has_key().await, "bob got the new key");

    let secret = alice_chat.send("after carol left").await.expect("alice has a key");
    assert_eq!(
        carol_chat.receive(secret.clone()).await,
        Err(ChatError::NoKey),
        "carol cannot read new messages"
    );
    assert_eq!(
        carol_chat.send("still here?").await,
        Err(ChatError::NoKey),
        "carol cannot write either"
    );

    let received = bob_chat
        .receive(secret)
        .await
        .expect("bob reads the message")
        .expect("a message entry yields a message");
    assert_eq!(received.text, "after carol left", "bob's copy");
}

#[tokio::test]
pub async fn second_agent_of_a_user_test() {
    let registry = RosterRegistry::default();
    let alice = fake_party(&registry).await;
    let bob = fake_party(&registry).await;
    let group = fake_group(&registry, &[&alice, &bob]).await;

    let laptop = Identity::generate();
    bob.user
        .change(&bob.agent, &laptop, Policy::USER)
        .await
        .expect("bob's agent adds a laptop");

    let alice_chat = open_chat(&registry, &group, &alice).await;
    let laptop_chat = ChatLog::new(&registry, &group, &bob.user, &laptop)
        .await
        .expect("the laptop belongs to bob");

    let rekey = alice_chat.rekey().await.expect("alice may rekey");
    laptop_chat.receive(rekey).await.expect("valid rekey");
    assert!(
        !laptop_chat.has_key().await,
        "no share advertised, so no piece"
    );

    bob.user.share(&laptop).await.expect("the laptop advertises its share");
    let rekey = alice_chat.rekey().await.expect("alice may rekey");
    laptop_chat.receive(rekey).await.expect("valid rekey");
    assert!(laptop_chat.has_key().await, "the laptop is now a participant");
}
