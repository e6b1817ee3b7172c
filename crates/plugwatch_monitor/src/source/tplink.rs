//! Protocolo smart-home dos plugues TP-Link (HS100/HS110).
//!
//! Na LAN os aparelhos falam JSON embaralhado com um XOR "autokey"
//! (chave inicial 171); na cloud o mesmo JSON viaja em claro dentro do
//! `responseData` do passthrough. Este módulo concentra o embaralhamento,
//! as queries e o parse das respostas.
//!
//! ```text
//! → {"system":{"get_sysinfo":{}},"emeter":{"get_realtime":{}}}
//! ← {"system":{"get_sysinfo":{"alias":"Lavadora",...}},
//!    "emeter":{"get_realtime":{"power":47.3,...,"err_code":0}}}
//! ```

use plugwatch_core::PowerSample;
use serde::Deserialize;

/// Chave inicial do XOR autokey do protocolo.
const INITIAL_KEY: u8 = 171;

/// Query de descoberta: identifica o aparelho e já pede a leitura do medidor.
pub const DISCOVERY_QUERY: &str =
    r#"{"system":{"get_sysinfo":{}},"emeter":{"get_realtime":{}}}"#;

/// Query usada no passthrough cloud: só a leitura do medidor.
pub const EMETER_QUERY: &str = r#"{"emeter":{"get_realtime":{}}}"#;

/// Erros de parse das respostas dos plugues.
#[derive(Debug, thiserror::Error)]
pub enum TplinkError {
    #[error("resposta não é UTF-8 válido: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON inválido na resposta: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resposta sem seção `system.get_sysinfo`")]
    MissingSysinfo,

    #[error("medidor retornou err_code {0}")]
    ErrCode(i64),

    #[error("resposta sem seção `emeter.get_realtime`")]
    MissingEmeter,
}

/// Embaralha um payload para envio na LAN (autokey: a chave vira o byte
/// cifrado anterior).
pub fn scramble(plain: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    plain
        .iter()
        .map(|b| {
            let c = key ^ b;
            key = c;
            c
        })
        .collect()
}

/// Desfaz o embaralhamento de um datagrama recebido.
pub fn unscramble(data: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    data.iter()
        .map(|c| {
            let b = key ^ c;
            key = *c;
            b
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct DeviceReply {
    #[serde(default)]
    system: Option<SystemSection>,
    #[serde(default)]
    emeter: Option<EmeterSection>,
}

#[derive(Debug, Deserialize)]
struct SystemSection {
    get_sysinfo: SysInfo,
}

#[derive(Debug, Deserialize)]
struct SysInfo {
    #[serde(default)]
    alias: String,
}

#[derive(Debug, Deserialize)]
struct EmeterSection {
    get_realtime: Realtime,
}

#[derive(Debug, Deserialize)]
struct Realtime {
    #[serde(default)]
    err_code: i64,
    #[serde(flatten)]
    sample: PowerSample,
}

/// Resposta de descoberta já decodificada.
#[derive(Debug)]
pub struct DiscoveryReply {
    /// Alias configurado no aparelho
    pub alias: String,
    /// Leitura do medidor, se o aparelho tem emeter e respondeu sem erro
    pub sample: Option<PowerSample>,
}

/// Decodifica um datagrama de descoberta vindo da LAN.
///
/// Aparelho sem medidor (ou com erro no emeter) ainda é uma resposta
/// válida de descoberta — volta com `sample = None`.
pub fn parse_discovery_datagram(data: &[u8]) -> Result<DiscoveryReply, TplinkError> {
    let text = String::from_utf8(unscramble(data))?;
    let reply: DeviceReply = serde_json::from_str(&text)?;

    let alias = reply
        .system
        .ok_or(TplinkError::MissingSysinfo)?
        .get_sysinfo
        .alias;

    let sample = reply
        .emeter
        .filter(|e| e.get_realtime.err_code == 0)
        .map(|e| e.get_realtime.sample);

    Ok(DiscoveryReply { alias, sample })
}

/// Decodifica a resposta (JSON em claro) de uma query de medidor,
/// como devolvida pelo passthrough cloud.
pub fn parse_emeter_reply(json: &str) -> Result<PowerSample, TplinkError> {
    let reply: DeviceReply = serde_json::from_str(json)?;
    let realtime = reply.emeter.ok_or(TplinkError::MissingEmeter)?.get_realtime;
    if realtime.err_code != 0 {
        return Err(TplinkError::ErrCode(realtime.err_code));
    }
    Ok(realtime.sample)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
