use anyhow::{bail, Result};
use parley::{
    parse_media_id, ChatEngine, LogEvent, Message, PaginationWindow, SummaryMode, SummaryOutcome,
    Thread, ThreadConfig, TurnOutcome, WindowUpdate,
};

use crate::commands::{Command, HELP};

/// REPL state: the engine plus which thread is in view
pub struct Session {
    engine: ChatEngine,
    thread: Thread,
    defaults: ThreadConfig,
    page_size: usize,
    window: Option<PaginationWindow>,
}

impl Session {
    /// Resume the most recently active thread, or start one
    pub async fn start(engine: ChatEngine, defaults: ThreadConfig, page_size: usize) -> Result<Self> {
        let threads = engine.persist().threads();
        let thread = match threads.list_threads().await?.into_iter().next() {
            Some(thread) => thread,
            None => threads.create_thread("New chat", defaults.clone()).await?,
        };
        tracing::info!("Session started on thread {}", thread.id);

        Ok(Self {
            engine,
            thread,
            defaults,
            page_size,
            window: None,
        })
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    pub fn window(&self) -> Option<&PaginationWindow> {
        self.window.as_ref()
    }

    /// Execute a command and return the lines to print
    pub async fn handle(&mut self, command: Command) -> Result<Vec<String>> {
        let lines = match command {
            Command::Say(text) => {
                self.engine.submit(&self.thread.id, text).await?;
                Vec::new()
            }
            Command::Flush => {
                if self.engine.flush(&self.thread.id).await {
                    vec!["(sent)".to_string()]
                } else {
                    vec!["(nothing pending)".to_string()]
                }
            }
            Command::History(size) => self.history(size.unwrap_or(self.page_size)).await?,
            Command::Older => self.older().await?,
            Command::Summary => self.summary().await?,
            Command::Summarize => {
                let line = match self.engine.scheduler().run_if_due(&self.thread.id).await {
                    SummaryOutcome::Skipped => "(no summary due)".to_string(),
                    SummaryOutcome::Saved(summary) => format!("saved summary #{}", summary.sequence),
                    SummaryOutcome::Failed => {
                        "summary failed; it will be retried after the next reply".to_string()
                    }
                };
                vec![line]
            }
            Command::Context => {
                let context = self.engine.preview_context(&self.thread.id).await?;
                if context.is_empty() {
                    vec!["(empty)".to_string()]
                } else {
                    vec![context]
                }
            }
            Command::Threads => self.threads().await?,
            Command::New(title) => {
                self.leave_current().await;
                let thread = self
                    .engine
                    .persist()
                    .threads()
                    .create_thread(title, self.defaults.clone())
                    .await?;
                let line = format!("started {} ({})", thread.title, thread.id);
                self.enter(thread);
                vec![line]
            }
            Command::Switch(thread_id) => {
                let thread = self.engine.persist().threads().require_thread(&thread_id).await?;
                self.leave_current().await;
                let mut lines = vec![format!("switched to {}", thread.title)];
                self.enter(thread);
                lines.extend(self.history(self.page_size).await?);
                lines
            }
            Command::Rename(title) => {
                self.thread = self
                    .engine
                    .persist()
                    .threads()
                    .rename_thread(&self.thread.id, title)
                    .await?;
                vec![format!("renamed to {}", self.thread.title)]
            }
            Command::Delete(thread_id) => {
                if thread_id == self.thread.id {
                    bail!("Cannot delete the thread in view; /switch away first");
                }
                let dropped = self.engine.delete_thread(&thread_id).await?;
                let mut lines = vec![format!("deleted {}", thread_id)];
                if dropped > 0 {
                    lines.push(format!("({} unsent messages discarded)", dropped));
                }
                lines
            }
            Command::Resend(message_id) => {
                self.engine.resend(&self.thread.id, &message_id).await?;
                vec![format!("queued {} again", message_id)]
            }
            Command::Help => vec![HELP.to_string()],
            Command::Quit => {
                self.leave_current().await;
                self.engine.shutdown();
                Vec::new()
            }
        };
        Ok(lines)
    }

    /// Lines for a finished turn
    pub fn on_turn(&self, outcome: &TurnOutcome) -> Vec<String> {
        if outcome.thread_id() != self.thread.id {
            return vec![format!("(new activity in thread {})", outcome.thread_id())];
        }
        match outcome {
            TurnOutcome::Replied { reply, media, .. } => {
                let mut lines = vec![self.render(reply)];
                if let Some(media) = media {
                    lines.push(self.render(media));
                }
                lines
            }
            TurnOutcome::Failed {
                fragment_ids,
                error,
                ..
            } => {
                let mut lines = vec![format!("turn failed: {}", error)];
                lines.extend(fragment_ids.iter().map(|id| format!("  /resend {}", id)));
                lines
            }
        }
    }

    /// Keep the loaded window in step with the log
    pub async fn on_event(&mut self, event: &LogEvent) -> Result<()> {
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };
        match window.apply(event) {
            WindowUpdate::ReloadRequired => {
                tracing::debug!("Reloading window for thread {} after repair", self.thread.id);
                let page = self
                    .engine
                    .persist()
                    .pagination()
                    .load_initial(&self.thread.id, self.page_size)
                    .await?;
                self.window = Some(PaginationWindow::new(&self.thread.id, page));
            }
            WindowUpdate::Closed => self.window = None,
            WindowUpdate::Updated | WindowUpdate::Unchanged => {}
        }
        Ok(())
    }

    async fn history(&mut self, page_size: usize) -> Result<Vec<String>> {
        let page = self
            .engine
            .persist()
            .pagination()
            .load_initial(&self.thread.id, page_size)
            .await?;

        let mut lines: Vec<String> = page.messages.iter().map(|m| self.render(m)).collect();
        if lines.is_empty() {
            lines.push("(no messages yet)".to_string());
        } else if page.has_more {
            lines.insert(0, "(/older for earlier messages)".to_string());
        }
        self.window = Some(PaginationWindow::new(&self.thread.id, page));
        Ok(lines)
    }

    async fn older(&mut self) -> Result<Vec<String>> {
        let Some(window) = self.window.as_ref() else {
            bail!("No history loaded; use /history first");
        };
        let cursor = window.cursor();
        let oldest = match cursor.oldest_loaded_sequence {
            Some(oldest) if cursor.has_more => oldest,
            _ => return Ok(vec!["(start of thread)".to_string()]),
        };

        let page = self
            .engine
            .persist()
            .pagination()
            .load_older(&self.thread.id, oldest, self.page_size)
            .await?;

        let mut lines: Vec<String> = page.messages.iter().map(|m| self.render(m)).collect();
        if !page.has_more {
            lines.insert(0, "(start of thread)".to_string());
        }
        if let Some(window) = self.window.as_mut() {
            window.prepend(page);
        }
        Ok(lines)
    }

    async fn summary(&self) -> Result<Vec<String>> {
        let summaries = self.engine.persist().summaries();
        let state = summaries.state(&self.thread.id).await?;
        let mode = match state.mode {
            SummaryMode::Normal => "normal",
            SummaryMode::Retry => "retry",
        };

        let mut lines = vec![format!(
            "mode {}, {} messages counted, {} since last summary",
            mode,
            state.message_count,
            state.pending()
        )];
        for summary in summaries.list(&self.thread.id).await? {
            lines.push(format!("#{} {}", summary.sequence, summary.summary));
        }
        Ok(lines)
    }

    async fn threads(&self) -> Result<Vec<String>> {
        let threads = self.engine.persist().threads().list_threads().await?;
        Ok(threads
            .iter()
            .map(|t| {
                let marker = if t.id == self.thread.id { "*" } else { " " };
                format!(
                    "{} {}  {}  (updated {})",
                    marker,
                    t.id,
                    t.title,
                    t.updated_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect())
    }

    async fn leave_current(&self) {
        self.engine.switch_thread(&self.thread.id).await;
    }

    fn enter(&mut self, thread: Thread) {
        tracing::info!("Switched to thread {}", thread.id);
        self.thread = thread;
        self.window = None;
    }

    fn render(&self, message: &Message) -> String {
        let config = &self.thread.config;
        let name = if message.is_user() {
            &config.user_name
        } else {
            &config.bot_name
        };
        let sequence = message
            .sequence
            .map_or_else(|| "-".to_string(), |s| s.to_string());

        if let Some(media_id) = parse_media_id(&message.content) {
            return format!("[{}] {} sent media {}", sequence, name, media_id);
        }
        let mut line = format!("[{}] {}: {}", sequence, name, message.content);
        if message.is_loading {
            line.push_str(" (typing)");
        }
        if message.error {
            if message.is_user() {
                line.push_str(&format!(" (undelivered, /resend {})", message.id));
            } else {
                line.push_str(" (failed)");
            }
        }
        line
    }
}
