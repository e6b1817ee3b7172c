//! Fontes de telemetria.
//!
//! O engine é agnóstico ao backend: as duas fontes (push via LAN, poll via
//! cloud) ficam atrás da mesma interface de "produz a próxima amostra",
//! como chamada bloqueante. Quem chama processa uma amostra por completo
//! antes de pedir a próxima — o fluxo é estritamente sequencial.

pub mod cloud;
pub mod lan;
pub mod tplink;

use plugwatch_core::PowerSample;
use plugwatch_core::config::TelemetryConfig;

/// Falhas das fontes de telemetria.
///
/// Qualquer `Err` devolvido por [`SampleSource::next_sample`] encerra o
/// loop de monitoramento em definitivo — reconexão fica a cargo do
/// supervisor de processos.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("erro HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API cloud recusou a operação: {0}")]
    Cloud(String),

    #[error("dispositivo {0:?} não encontrado na conta")]
    DeviceNotFound(String),

    #[error("resposta inválida do dispositivo: {0}")]
    Protocol(#[from] tplink::TplinkError),

    #[error("fonte de telemetria desconectada")]
    Disconnected,

    #[error("backend desconhecido: {0:?}")]
    UnknownBackend(String),
}

/// Uma fonte de amostras de potência, push ou poll.
pub trait SampleSource {
    /// Bloqueia até a próxima amostra do dispositivo monitorado.
    fn next_sample(&mut self) -> Result<PowerSample, SourceError>;
}

/// Constrói o backend selecionado na configuração.
pub fn build_source(
    cfg: &TelemetryConfig,
    alias: &str,
) -> Result<Box<dyn SampleSource>, SourceError> {
    match cfg.backend.as_str() {
        "lan" => Ok(Box::new(lan::LanSource::spawn(&cfg.lan, alias))),
        "cloud" => Ok(Box::new(cloud::CloudSource::connect(&cfg.cloud, alias)?)),
        other => Err(SourceError::UnknownBackend(other.into())),
    }
}
