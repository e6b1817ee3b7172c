//! Notificação best-effort via webhooks (ntfy e/ou Telegram).
//!
//! O corpo da notificação é um excerto do log: as últimas N linhas do
//! arquivo, mais recente primeiro. Entrega é fire-and-forget em relação ao
//! engine — falha vira `warn!` e nada mais; nunca há retry nem propagação.

use plugwatch_core::config::NotifierConfig;
use serde_json::json;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Notifier {
    cfg: NotifierConfig,
    log_path: PathBuf,
    client: reqwest::blocking::Client,
}

impl Notifier {
    pub fn new(cfg: NotifierConfig, log_path: PathBuf) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falha ao construir cliente HTTP do notifier: {e}");
                reqwest::blocking::Client::new()
            });
        Self {
            cfg,
            log_path,
            client,
        }
    }

    /// Entrega `subject` com excerto do log no corpo. Nunca falha para fora.
    pub fn notify(&self, subject: &str) {
        if !self.cfg.enabled {
            debug!("Notifier desabilitado, suprimindo: {subject}");
            return;
        }
        let body_lines = self.log_excerpt();
        self.send(subject, &body_lines);
    }

    /// Entrega com corpo explícito (best-effort).
    pub fn send(&self, subject: &str, body_lines: &[String]) {
        let body = body_lines.join("\n");

        if !self.cfg.ntfy_topic.is_empty() {
            if let Err(e) = self.send_ntfy(subject, &body) {
                warn!("Falha ao notificar via ntfy: {e}");
            } else {
                debug!("ntfy entregue: {subject}");
            }
        }

        if !self.cfg.telegram_bot_token.is_empty() && !self.cfg.telegram_chat_id.is_empty() {
            if let Err(e) = self.send_telegram(subject, &body) {
                warn!("Falha ao notificar via Telegram: {e}");
            } else {
                debug!("Telegram entregue: {subject}");
            }
        }
    }

    /// Últimas linhas do arquivo de log, mais recente primeiro.
    pub fn log_excerpt(&self) -> Vec<String> {
        match tail_lines(&self.log_path, self.cfg.log_tail_lines) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Falha ao ler excerto do log {}: {e}", self.log_path.display());
                Vec::new()
            }
        }
    }

    fn send_ntfy(&self, subject: &str, body: &str) -> Result<(), reqwest::Error> {
        let url = format!(
            "{}/{}",
            self.cfg.ntfy_server.trim_end_matches('/'),
            self.cfg.ntfy_topic
        );
        self.client
            .post(&url)
            .header("Title", subject)
            .body(body.to_string())
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn send_telegram(&self, subject: &str, body: &str) -> Result<(), reqwest::Error> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.cfg.telegram_bot_token
        );
        let text = if body.is_empty() {
            subject.to_string()
        } else {
            format!("{subject}\n\n{body}")
        };
        self.client
            .post(&url)
            .json(&json!({
                "chat_id": self.cfg.telegram_chat_id,
                "text": text,
            }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

/// Lê as últimas `n` linhas de um arquivo, na ordem inversa (mais recente
/// primeiro), como o corpo de alerta espera.
pub fn tail_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()?;
    let start = lines.len().saturating_sub(n);
    let mut tail: Vec<String> = lines.drain(start..).collect();
    tail.reverse();
    Ok(tail)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
