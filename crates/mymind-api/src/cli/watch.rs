//! `mymind watch`: the chat page's expiry countdown, in a terminal.
//!
//! Polls a running server's `/activeChatSession` with the caller's token and
//! redraws a single status line until the session ends or Ctrl+C.

use std::time::Duration;

use anyhow::Result;
use console::{style, Term};

use mymind_core::expiry::{ExpiryMonitor, ExpiryView, MonitorState};
use mymind_infra::client::HttpSessionSource;

/// Renders monitor transitions on one redrawn terminal line.
pub struct TerminalView {
    term: Term,
    line: Option<String>,
}

impl TerminalView {
    pub fn new(term: Term) -> Self {
        Self { term, line: None }
    }

    /// Last line drawn, without styling.
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }

    fn draw(&mut self, plain: String, styled: String) {
        if self.line.as_deref() == Some(plain.as_str()) {
            return;
        }
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&styled);
        self.line = Some(plain);
    }
}

impl ExpiryView for TerminalView {
    fn hide_chat(&mut self) {
        let text = "No active session".to_string();
        let styled = format!("  {}", style(&text).dim());
        self.draw(text, styled);
    }

    fn show_remaining(&mut self, text: &str) {
        let plain = format!("Time left: {text}");
        let styled = format!("  {} {}", style("Time left:").bold(), style(text).cyan());
        self.draw(plain, styled);
    }

    fn lock_ended(&mut self) {
        let text = "Session ended. Chat is closed.".to_string();
        let styled = format!("  {}", style(&text).red().bold());
        self.draw(text, styled);
        let _ = self.term.write_line("");
    }
}

pub async fn watch(server: String, token: String, interval: Duration) -> Result<()> {
    let source = HttpSessionSource::new(server, token);
    let monitor = ExpiryMonitor::new(source, TerminalView::new(Term::stdout()), interval);

    let cancel = monitor.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (state, view) = monitor.run().await;
    if !matches!(state, MonitorState::Ended) && view.line().is_some() {
        println!();
    }
    tracing::debug!(?state, "watch finished");
    Ok(())
}
