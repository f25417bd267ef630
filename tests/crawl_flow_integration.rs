//! Crawl flows driven through the dispatcher with a scripted network

mod common;

use std::time::Duration;

use common::{
    FakeNetwork, create_harness, create_harness_with, quiet_crawler_config, quiet_scheduler_config,
    text_message,
};
use group_crawler::job_scheduling::{JobState, JobType, NewJob};
use group_crawler::network::{InviteLinkInfo, SupergroupInfo};

fn public_supergroup(member_count: i32) -> SupergroupInfo {
    SupergroupInfo {
        description: Some("a group".to_string()),
        member_count,
        can_get_members: true,
        is_all_history_available: true,
        can_get_statistics: false,
    }
}

#[tokio::test]
async fn test_group_info_fans_out_to_members_and_history() {
    let network = FakeNetwork::new().supergroup(42, 1042, "Rustaceans", public_supergroup(500));
    let harness = create_harness(network, quiet_scheduler_config()).await;
    let repositories = &harness.repositories;
    repositories
        .job_records
        .insert(&NewJob::new(JobType::GetGroupInfo, "seed").param1(42).depth(0))
        .await
        .unwrap();

    let outcomes = harness.dispatcher.execute_batch(JobType::GetGroupInfo).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].state, JobState::Finished);

    let group = repositories.group_chats.find_by_chat_id(42).await.unwrap().unwrap();
    assert_eq!(group.title, "Rustaceans");
    assert_eq!(group.member_count, 500);
    assert_eq!(group.supergroup_id, Some(1042));

    let members = repositories.job_records.find_by_type(JobType::GetMemberList).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].param1.as_deref(), Some("1042"));
    assert_eq!(members[0].param2.as_deref(), Some("42"));
    assert_eq!(members[0].depth, Some(0));
    assert_eq!(members[0].created_by, "GetGroupInfo");

    let history = repositories.job_records.find_by_type(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].param1.as_deref(), Some("42"));
    assert_eq!(history[0].depth, Some(0));
    assert_eq!(history[0].created_by, "GetGroupInfo");

    // A second discovery of the same chat is a duplicate
    let duplicate = repositories
        .job_records
        .insert(&NewJob::new(JobType::GetGroupInfo, "seed").param1(42).depth(0))
        .await;
    assert!(duplicate.unwrap_err().is_unique_violation());
}

#[tokio::test]
async fn test_history_pages_until_an_empty_page() {
    let network = FakeNetwork::new()
        .supergroup(42, 1042, "Rustaceans", public_supergroup(500))
        .history(
            42,
            0,
            vec![
                text_message(42, 30, "third"),
                text_message(42, 20, "second"),
                text_message(42, 10, "first"),
            ],
        );
    let harness = create_harness(network, quiet_scheduler_config()).await;
    let job_records = &harness.repositories.job_records;
    job_records
        .insert(&NewJob::new(JobType::GetMessageHistory, "seed").param1(42).depth(0))
        .await
        .unwrap();

    let first = harness.dispatcher.execute_batch(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(first[0].state, JobState::Finished);

    let pages = job_records.find_by_type(JobType::GetMessageHistory).await.unwrap();
    let next = pages
        .iter()
        .find(|r| r.state == JobState::New)
        .expect("next page should be queued");
    assert_eq!(next.param2.as_deref(), Some("2"));
    assert_eq!(next.param3.as_deref(), Some("10"));

    // The page older than message 10 is empty
    let second = harness.dispatcher.execute_batch(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].state, JobState::Finished);

    let pages = job_records.find_by_type(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|r| r.state == JobState::Finished));
    assert_eq!(
        harness.network.calls_to("get_chat_history"),
        2,
        "no third page should be requested"
    );
}

#[tokio::test]
async fn test_slow_history_fetch_times_out_and_is_retried_later() {
    let network = FakeNetwork::new()
        .supergroup(42, 1042, "Rustaceans", public_supergroup(500))
        .history(42, 0, vec![text_message(42, 10, "late")])
        .history_delay(Duration::from_millis(500));
    let mut crawler = quiet_crawler_config();
    crawler.history_fetch_timeout = Duration::from_millis(50);
    let harness = create_harness_with(network, quiet_scheduler_config(), crawler).await;
    let job_records = &harness.repositories.job_records;
    let record = job_records
        .insert(&NewJob::new(JobType::GetMessageHistory, "seed").param1(42).depth(0))
        .await
        .unwrap();

    let outcomes = harness.dispatcher.execute_batch(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].state, JobState::New);

    let pages = job_records.find_by_type(JobType::GetMessageHistory).await.unwrap();
    assert_eq!(pages.len(), 1, "no next page after a timeout");
    assert_eq!(pages[0].id, record.id);
    assert_eq!(pages[0].state, JobState::New);
    assert_eq!(pages[0].param2, record.param2);
}

#[tokio::test]
async fn test_invite_link_over_join_cap_is_cancelled_without_joining() {
    let network = FakeNetwork::new().joined_chat_count(201).invite_link(
        "https://t.me/+secret",
        InviteLinkInfo {
            chat_id: 0,
            title: "private".to_string(),
            is_public: false,
            creates_join_request: false,
        },
    );
    let harness = create_harness(network, quiet_scheduler_config()).await;
    let record = harness
        .repositories
        .job_records
        .insert(
            &NewJob::new(JobType::FollowInviteLink, "seed")
                .param1("https://t.me/+secret")
                .depth(1),
        )
        .await
        .unwrap();

    harness.dispatcher.execute_batch(JobType::FollowInviteLink).await.unwrap();

    let record = harness.repositories.job_records.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(record.state, JobState::Cancelled);
    assert_eq!(harness.network.calls_to("check_invite_link"), 0);
    assert_eq!(harness.network.calls_to("join_chat_by_invite_link"), 0);
}

#[tokio::test]
async fn test_joined_group_is_left_after_its_crawl() {
    let network = FakeNetwork::new()
        .supergroup(77, 1077, "Joined", public_supergroup(0))
        .invite_link(
            "https://t.me/+joinme",
            InviteLinkInfo {
                chat_id: 77,
                title: "Joined".to_string(),
                is_public: false,
                creates_join_request: false,
            },
        );
    let harness = create_harness(network, quiet_scheduler_config()).await;
    let repositories = &harness.repositories;
    repositories
        .job_records
        .insert(
            &NewJob::new(JobType::FollowInviteLink, "seed")
                .param1("https://t.me/+joinme")
                .depth(0),
        )
        .await
        .unwrap();

    let dispatcher = &harness.dispatcher;
    dispatcher.execute_batch(JobType::FollowInviteLink).await.unwrap();
    dispatcher.execute_batch(JobType::GetGroupInfo).await.unwrap();

    // History is still pending, so the group stays joined
    assert_eq!(dispatcher.run_recurring(JobType::LeaveGroups).await.unwrap(), Some(JobState::Finished));
    assert_eq!(harness.network.calls_to("leave_chat"), 0);

    dispatcher.execute_batch(JobType::GetMessageHistory).await.unwrap();
    dispatcher.run_recurring(JobType::LeaveGroups).await.unwrap();
    assert_eq!(harness.network.calls_to("leave_chat"), 1);
    assert!(repositories.left_chats.chat_ids().await.unwrap().contains(&77));

    // Already left
    dispatcher.run_recurring(JobType::LeaveGroups).await.unwrap();
    assert_eq!(harness.network.calls_to("leave_chat"), 1);
}
