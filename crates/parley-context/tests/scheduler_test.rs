use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use parley_context::{DefaultContextStrategy, SummaryOutcome, SummaryScheduler};
use parley_llm::{CompletionProvider, CompletionRequest};
use parley_persist::{Message, PersistClient, ThreadConfig};
use parley_types::SchedulerConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider that can be switched between failing and replying
#[derive(Default)]
struct ScriptedProvider {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _request: CompletionRequest) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("provider unavailable");
        }
        Ok(format!("summary #{}", n))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn setup(config: SchedulerConfig) -> (PersistClient, Arc<ScriptedProvider>, SummaryScheduler) {
    let persist = PersistClient::in_memory();
    let provider = Arc::new(ScriptedProvider::default());
    let scheduler = SummaryScheduler::new(persist.clone(), provider.clone(), config);
    (persist, provider, scheduler)
}

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + ChronoDuration::seconds(secs)
}

#[tokio::test]
async fn test_trigger_after_five_messages() {
    let (_, _, scheduler) = setup(SchedulerConfig::default());

    for _ in 0..4 {
        scheduler.record_message("t").await.unwrap();
        assert!(!scheduler.should_generate_or_retry("t").await.unwrap());
    }
    scheduler.record_message("t").await.unwrap();
    assert!(scheduler.should_generate_or_retry("t").await.unwrap());

    assert!(scheduler.run("t").await.unwrap().is_saved());
    assert!(!scheduler.should_generate_or_retry("t").await.unwrap());

    for _ in 0..4 {
        scheduler.record_message("t").await.unwrap();
    }
    assert!(!scheduler.should_generate_or_retry("t").await.unwrap());
    scheduler.record_message("t").await.unwrap();
    assert!(scheduler.should_generate_or_retry("t").await.unwrap());
}

#[tokio::test]
async fn test_failure_enters_retry_until_success() {
    let (persist, provider, scheduler) = setup(SchedulerConfig::default());
    persist
        .log()
        .append("t", Message::user("t", "I adopted a cat. She is grey"))
        .await
        .unwrap();
    for _ in 0..5 {
        scheduler.record_message("t").await.unwrap();
    }

    provider.set_failing(true);
    let generated = scheduler.generate_summary_strict("t").await.unwrap();
    assert!(generated.fallback);
    assert_eq!(generated.text, "I adopted a cat");

    assert!(matches!(scheduler.run("t").await.unwrap(), SummaryOutcome::Failed));
    let state = persist.summaries().state("t").await.unwrap();
    assert!(state.is_in_retry_mode());
    assert_eq!(state.last_summary_message_count, 0);
    assert!(persist.summaries().list("t").await.unwrap().is_empty());
    assert!(scheduler.should_generate_or_retry("t").await.unwrap());

    provider.set_failing(false);
    scheduler.record_message("t").await.unwrap();
    let outcome = scheduler.run_if_due("t").await;
    assert!(outcome.is_saved());

    let state = persist.summaries().state("t").await.unwrap();
    assert!(!state.is_in_retry_mode());
    assert_eq!(state.last_summary_message_count, 6);
    assert_eq!(state.message_count, 6);
}

#[tokio::test]
async fn test_retry_is_due_regardless_of_count() {
    let (persist, provider, scheduler) = setup(SchedulerConfig::default());
    for _ in 0..5 {
        scheduler.record_message("t").await.unwrap();
    }
    provider.set_failing(true);
    scheduler.run_if_due("t").await;

    // Caught-up count but still in retry mode
    let mut state = persist.summaries().state("t").await.unwrap();
    state.last_summary_message_count = state.message_count;
    persist.summaries().save_state(state).await.unwrap();
    assert!(scheduler.should_generate_or_retry("t").await.unwrap());
}

#[tokio::test]
async fn test_retention_keeps_five_most_recent() {
    let (persist, _, scheduler) = setup(SchedulerConfig::default().with_trigger(1));
    for _ in 0..7 {
        scheduler.record_message("t").await.unwrap();
        assert!(scheduler.run("t").await.unwrap().is_saved());
    }

    let sequences: Vec<_> = persist
        .summaries()
        .list("t")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.sequence)
        .collect();
    assert_eq!(sequences, vec![3, 4, 5, 6, 7]);
}

#[tokio::test]
async fn test_context_is_word_bounded() {
    let persist = PersistClient::in_memory();
    let rules = vec!["rule"; 900].join(" ");
    for i in 0..3 {
        persist
            .summaries()
            .save("t", vec![format!("s{}", i); 200].join(" "))
            .await
            .unwrap();
    }
    for i in 0..5 {
        persist
            .log()
            .append("t", Message::user("t", vec![format!("w{}", i); 100].join(" ")))
            .await
            .unwrap();
    }

    let context = DefaultContextStrategy::default()
        .generate_context(&persist, "t", &rules, "Bot")
        .await
        .unwrap();
    let words: Vec<_> = context.split_whitespace().collect();
    assert!(words.len() <= 1201);
    assert_eq!(words.last(), Some(&"..."));
}

#[tokio::test]
async fn test_both_sides_of_a_turn_count_toward_the_trigger() {
    let (persist, _, scheduler) = setup(SchedulerConfig::default());
    let thread = persist
        .threads()
        .create_thread("Chat", ThreadConfig::new("Bot", "R"))
        .await
        .unwrap();
    let id = thread.id.as_str();

    for turn in 0..6 {
        let base = turn * 120;
        persist
            .log()
            .append(id, Message::user(id, format!("question {}", turn)).with_timestamp(at(base)))
            .await
            .unwrap();
        scheduler.record_message(id).await.unwrap();
        persist
            .log()
            .append(id, Message::assistant(id, format!("answer {}", turn)).with_timestamp(at(base + 60)))
            .await
            .unwrap();
        scheduler.record_message(id).await.unwrap();
        scheduler.run_if_due(id).await;

        // Due at message 6; still one summary at message 10; the second at 12
        let summaries = persist.summaries().list(id).await.unwrap();
        let expected = match turn {
            0 | 1 => 0,
            2..=4 => 1,
            _ => 2,
        };
        assert_eq!(summaries.len(), expected, "after turn {}", turn + 1);
    }

    let state = persist.summaries().state(id).await.unwrap();
    assert_eq!(state.message_count, 12);
    assert_eq!(state.last_summary_message_count, 12);

    let all = persist.log().list_all(id).await.unwrap();
    assert_eq!(all.len(), 12);
    for (index, message) in all.iter().enumerate() {
        assert_eq!(message.sequence, Some(index as u64 + 1));
        assert_eq!(message.is_user(), index % 2 == 0);
    }

    let sequences: Vec<_> = persist
        .summaries()
        .list(id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2]);

    let page = persist.pagination().load_initial(id, 5).await.unwrap();
    let seqs: Vec<_> = page.messages.iter().filter_map(|m| m.sequence).collect();
    assert_eq!(seqs, vec![8, 9, 10, 11, 12]);

    let context = DefaultContextStrategy::default()
        .generate_context(&persist, id, "R", "Bot")
        .await
        .unwrap();
    assert!(context.starts_with("R\n\nSummary: summary #1\nSummary: summary #2"));
    assert!(context.ends_with("User: question 5\nBot: answer 5"));
}

#[tokio::test]
async fn test_concurrent_records_are_not_lost() {
    let (persist, _, scheduler) = setup(SchedulerConfig::default());
    let (a, b, c) = tokio::join!(
        scheduler.record_message("t"),
        scheduler.record_message("t"),
        scheduler.record_message("t"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    assert_eq!(persist.summaries().state("t").await.unwrap().message_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_replaces_pending_run() {
    let config = SchedulerConfig::default()
        .with_trigger(1)
        .with_delay(Duration::from_secs(30));
    let (persist, provider, scheduler) = setup(config);
    scheduler.record_message("t").await.unwrap();

    scheduler.schedule("t").await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    scheduler.schedule("t").await;
    assert!(scheduler.has_pending("t").await);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(provider.calls(), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(provider.calls(), 1);
    assert!(!scheduler.has_pending("t").await);
    assert_eq!(persist.summaries().list("t").await.unwrap().len(), 1);

    scheduler.schedule("t").await;
    assert!(scheduler.cancel("t").await);
    assert!(!scheduler.cancel("t").await);
}
