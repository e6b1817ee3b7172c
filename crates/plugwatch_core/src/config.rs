//! Configuração unificada via TOML.
//!
//! Substitui o `.env` do Node por um único `config.toml` ao lado do
//! executável. Todas as seções aceitam TOML parcial: campo ausente recebe
//! o valor padrão.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Dispositivo monitorado.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Alias do plugue (identifica qual dispositivo a telemetria reporta)
    pub alias: String,
    /// Fronteira entre "parado" e "em funcionamento" (W)
    pub power_threshold_watts: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            alias: "Lavadora".into(),
            power_threshold_watts: 5.0,
        }
    }
}

/// Parâmetros das duas regras de tempo (segundos).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRules {
    /// Inatividade aceitável antes do primeiro alerta
    pub max_idle_secs: f64,
    /// Cadência de repetição do alerta de inatividade
    pub repeat_idle_alert_secs: f64,
    /// Funcionamento aceitável antes do primeiro alerta
    pub max_run_secs: f64,
    /// Cadência de repetição do alerta de funcionamento
    pub repeat_run_alert_secs: f64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            max_idle_secs: 172_800.0,          // 2 dias
            repeat_idle_alert_secs: 21_600.0,  // 6 h
            max_run_secs: 10_800.0,            // 3 h
            repeat_run_alert_secs: 1_800.0,    // 30 min
        }
    }
}

/// Backend LAN: descoberta UDP na rede local (push).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanConfig {
    /// Endereço de broadcast da descoberta
    pub broadcast_addr: String,
    /// Porta do protocolo smart-home dos plugues
    pub port: u16,
    /// Intervalo entre beacons de descoberta (segundos)
    pub discovery_interval_secs: f64,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: "255.255.255.255".into(),
            port: 9999,
            discovery_interval_secs: 5.0,
        }
    }
}

/// Backend cloud: polling autenticado na conta do fabricante.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Endpoint da API cloud
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Espera entre leituras (segundos)
    pub poll_interval_secs: f64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://wap.tplinkcloud.com".into(),
            username: String::new(),
            password: String::new(),
            poll_interval_secs: 30.0,
        }
    }
}

/// Seleção e parâmetros da fonte de telemetria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Backend: "lan" (push local) ou "cloud" (poll na conta)
    pub backend: String,
    pub lan: LanConfig,
    pub cloud: CloudConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            backend: "lan".into(),
            lan: LanConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

/// Canais de notificação (best-effort, falha só vira log).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub ntfy_server: String,
    pub ntfy_topic: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    /// Quantas linhas do log entram no corpo da notificação
    pub log_tail_lines: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ntfy_server: "https://ntfy.sh".into(),
            ntfy_topic: String::new(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            log_tail_lines: 20,
        }
    }
}

/// Log em arquivo (o notifier lê o mesmo arquivo para o corpo dos alertas).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Nome-base do arquivo: `<file_name>.log` ao lado do executável
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_name: "plugwatch".into(),
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub rules: AlertRules,
    pub telemetry: TelemetryConfig,
    pub notifier: NotifierConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Caminho do arquivo de log derivado de `[log] file_name`.
    pub fn log_path(&self) -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join(format!("{}.log", self.log.file_name))
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.device.alias.trim().is_empty() {
            errors.push("Alias do dispositivo não pode ser vazio".into());
        }
        if !self.device.power_threshold_watts.is_finite()
            || self.device.power_threshold_watts < 0.0
        {
            errors.push(format!(
                "Limiar de potência inválido: {} W",
                self.device.power_threshold_watts
            ));
        }

        for (name, value) in [
            ("rules.max_idle_secs", self.rules.max_idle_secs),
            ("rules.repeat_idle_alert_secs", self.rules.repeat_idle_alert_secs),
            ("rules.max_run_secs", self.rules.max_run_secs),
            ("rules.repeat_run_alert_secs", self.rules.repeat_run_alert_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} inválido: {value}"));
            }
        }

        match self.telemetry.backend.as_str() {
            "lan" => {
                if self.telemetry.lan.port == 0 {
                    errors.push("Porta LAN não pode ser 0".into());
                }
                if self.telemetry.lan.discovery_interval_secs <= 0.0 {
                    errors.push(format!(
                        "Intervalo de descoberta inválido: {}",
                        self.telemetry.lan.discovery_interval_secs
                    ));
                }
            }
            "cloud" => {
                if self.telemetry.cloud.username.is_empty()
                    || self.telemetry.cloud.password.is_empty()
                {
                    errors.push("Backend cloud exige username e password".into());
                }
                if self.telemetry.cloud.poll_interval_secs <= 0.0 {
                    errors.push(format!(
                        "Intervalo de polling inválido: {}",
                        self.telemetry.cloud.poll_interval_secs
                    ));
                }
            }
            other => {
                errors.push(format!("Backend desconhecido: {other:?} (use \"lan\" ou \"cloud\")"));
            }
        }

        if self.notifier.enabled
            && self.notifier.ntfy_topic.is_empty()
            && (self.notifier.telegram_bot_token.is_empty()
                || self.notifier.telegram_chat_id.is_empty())
        {
            errors.push("Notifier habilitado sem canal configurado (ntfy ou telegram)".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.device.alias, parsed.device.alias);
        assert_eq!(config.rules.max_idle_secs, parsed.rules.max_idle_secs);
        assert_eq!(config.telemetry.backend, parsed.telemetry.backend);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[device]
alias = "Maquina de Lavar"

[telemetry.cloud]
username = "user@example.com"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.device.alias, "Maquina de Lavar");
        // Outros campos devem ter valor padrão
        assert_eq!(config.device.power_threshold_watts, 5.0);
        assert_eq!(config.telemetry.backend, "lan");
        assert_eq!(config.telemetry.cloud.poll_interval_secs, 30.0);
        assert_eq!(config.notifier.log_tail_lines, 20);
    }

    #[test]
    fn cloud_backend_requires_credentials() {
        let mut config = AppConfig::default();
        config.telemetry.backend = "cloud".into();
        assert!(!config.validate().is_empty());

        config.telemetry.cloud.username = "user@example.com".into();
        config.telemetry.cloud.password = "secret".into();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.telemetry.backend = "zigbee".into();
        assert!(config.validate().iter().any(|e| e.contains("Backend")));
    }

    #[test]
    fn enabled_notifier_needs_a_channel() {
        let mut config = AppConfig::default();
        config.notifier.enabled = true;
        assert!(!config.validate().is_empty());

        config.notifier.ntfy_topic = "plugwatch-alerts".into();
        assert!(config.validate().is_empty());
    }
}
